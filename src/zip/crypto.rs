//! Traditional PKWARE encryption ("ZipCrypto").
//!
//! A byte-wise stream cipher keyed from the password. Each encrypted entry
//! starts with a 12-byte header whose last plaintext byte is a check value
//! (high byte of the CRC-32, or of the DOS time when a data descriptor is
//! used). The check catches most wrong passwords at open time; the rest are
//! caught by the CRC-32 once the entry is fully decoded.

use crate::error::{Error, Result};

/// Size of the encryption header preceding the entry data
pub const HEADER_SIZE: usize = 12;

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// One raw CRC-32 step, without the pre/post inversion of the checksum.
fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

#[derive(Clone)]
pub struct ZipCryptoKeys {
    key0: u32,
    key1: u32,
    key2: u32,
}

impl ZipCryptoKeys {
    pub fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            key0: 0x1234_5678,
            key1: 0x2345_6789,
            key2: 0x3456_7890,
        };
        for &byte in password {
            keys.update(byte);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.key0 = crc32_step(self.key0, plain);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.key2 = crc32_step(self.key2, (self.key1 >> 24) as u8);
    }

    fn keystream(&self) -> u8 {
        let temp = (self.key2 | 2) & 0xFFFF;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for byte in buf {
            let plain = *byte ^ self.keystream();
            self.update(plain);
            *byte = plain;
        }
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) {
        for byte in buf {
            let plain = *byte;
            *byte = plain ^ self.keystream();
            self.update(plain);
        }
    }

    /// Build an encrypted header ending in `check`.
    pub fn encrypt_header(&mut self, check: u8) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        rand::Rng::fill(&mut rand::thread_rng(), &mut header[..HEADER_SIZE - 1]);
        header[HEADER_SIZE - 1] = check;
        self.encrypt_in_place(&mut header);
        header
    }

    /// Decrypt a header and report whether its check byte matches.
    pub fn verify_header(&mut self, mut header: [u8; HEADER_SIZE], check: u8) -> bool {
        self.decrypt_in_place(&mut header);
        header[HEADER_SIZE - 1] == check
    }
}

/// Keys for the entry `name`; the password must be ASCII.
pub fn keys_for(name: &str, password: &str) -> Result<ZipCryptoKeys> {
    if !password.is_ascii() {
        return Err(Error::Password {
            name: name.to_string(),
            reason: "password must be ASCII".into(),
        });
    }
    Ok(ZipCryptoKeys::new(password.as_bytes()))
}
