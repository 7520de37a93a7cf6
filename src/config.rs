//! Read-only configuration snapshots handed to the extractor and archiver.

use std::path::PathBuf;

/// Where to read an archive from and where to put its contents.
#[derive(Debug, Clone, Default)]
pub struct ExtractionTarget {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    /// ASCII password for encrypted entries; others are refused
    pub password: Option<String>,
}

impl ExtractionTarget {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Inputs and output of one archive-creation run.
#[derive(Debug, Clone, Default)]
pub struct CreationTarget {
    pub sources: Vec<PathBuf>,
    pub destination: Option<PathBuf>,
    /// Encrypt every entry with this ASCII password
    pub password: Option<String>,
    pub compression_level: CompressionLevel,
}

impl CreationTarget {
    pub fn new<I, P>(sources: I, destination: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            destination: Some(destination.into()),
            ..Self::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }
}

/// Deflate effort used for new entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CompressionLevel {
    NoCompression,
    BestSpeed,
    #[default]
    Default,
    Best,
}

impl CompressionLevel {
    pub fn to_flate2(self) -> flate2::Compression {
        match self {
            CompressionLevel::NoCompression => flate2::Compression::none(),
            CompressionLevel::BestSpeed => flate2::Compression::fast(),
            CompressionLevel::Default => flate2::Compression::default(),
            CompressionLevel::Best => flate2::Compression::best(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_levels_map_to_zlib_values() {
        assert_eq!(CompressionLevel::NoCompression.to_flate2().level(), 0);
        assert_eq!(CompressionLevel::BestSpeed.to_flate2().level(), 1);
        assert_eq!(CompressionLevel::Default.to_flate2().level(), 6);
        assert_eq!(CompressionLevel::Best.to_flate2().level(), 9);
    }
}
