//! Main entry point for the ziparc CLI application.
//!
//! This binary provides a command-line interface for listing, extracting
//! and creating ZIP archives on the local filesystem.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glob::Pattern;
use tracing_subscriber::EnvFilter;

use ziparc::cli::{Command, CreateArgs, ExtractArgs, ListArgs};
use ziparc::{
    Cli, CreationTarget, EntryMetadata, ExtractionTarget, ZipArchiver, ZipExtractor, depth_of,
    is_folder,
};

/// Application entry point.
///
/// Installs the log subscriber and dispatches to the subcommand handler.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::List(args) => list(&args),
        Command::Extract(args) => extract(&args),
        Command::Create(args) => create(&args),
    }
}

/// Log to stderr; `RUST_LOG` wins, otherwise `-v` raises the level.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// List entries in the archive.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Long format (`-l`): table with size, compression ratio and timestamps
fn list(args: &ListArgs) -> Result<()> {
    let target = ExtractionTarget::new(&args.archive);
    let mut entries = ZipExtractor::default()
        .entries(&target)
        .with_context(|| format!("cannot list '{}'", args.archive))?;
    if let Some(depth) = args.depth {
        entries.retain(|(name, _)| depth_of(name) == depth);
    }

    if !args.long {
        for (name, _) in &entries {
            println!("{name}");
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for (name, metadata) in &entries {
        let modified = metadata.modified;
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}{}",
            metadata.uncompressed_size,
            metadata.compressed_size,
            ratio(metadata),
            modified.year,
            modified.month,
            modified.day,
            modified.hour,
            modified.minute,
            name,
            if metadata.encrypted { " *" } else { "" }
        );

        // Directories are not counted in the totals
        if !is_folder(name) {
            total_uncompressed += metadata.uncompressed_size;
            total_compressed += metadata.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    let total_ratio = if total_uncompressed > 0 {
        format!(
            "{:>4}%",
            100u64.saturating_sub(total_compressed * 100 / total_uncompressed)
        )
    } else {
        "  0%".to_string()
    };
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed, total_compressed, total_ratio, "", file_count
    );

    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(metadata: &EntryMetadata) -> String {
    if metadata.uncompressed_size > 0 {
        format!(
            "{:>4}%",
            100u64.saturating_sub(metadata.compressed_size * 100 / metadata.uncompressed_size)
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract entries to a directory or, with `-p`, to stdout.
fn extract(args: &ExtractArgs) -> Result<()> {
    let mut target = ExtractionTarget::new(&args.archive).destination(&args.extract_dir);
    target.password = args.password.clone();
    let extractor = ZipExtractor::default();

    if !args.is_selective() && !args.pipe {
        extractor
            .extract_all(&target)
            .with_context(|| format!("cannot extract '{}'", args.archive))?;
        if !args.is_quiet() {
            println!("extracted '{}' into '{}'", args.archive, args.extract_dir);
        }
        return Ok(());
    }

    let names = select(&extractor.list_entries(&target)?, args)?;

    if args.pipe {
        let mut stdout = std::io::stdout().lock();
        let files: Vec<_> = names.iter().filter(|name| !is_folder(name)).collect();
        let show_name = files.len() > 1;
        for name in files {
            let data = extractor
                .extract_to_memory(&target, name)
                .with_context(|| format!("cannot extract '{name}'"))?;
            if show_name {
                writeln!(stdout, "--- {name} ---")?;
            }
            stdout.write_all(&data)?;
        }
        stdout.flush()?;
        return Ok(());
    }

    if !args.is_quiet() {
        for name in &names {
            println!("  extracting: {name}");
        }
    }
    extractor
        .extract_selected(&target, &names)
        .with_context(|| format!("cannot extract from '{}'", args.archive))?;

    Ok(())
}

/// Resolve name arguments and exclusions against the archive listing.
///
/// A plain name selects the entry of that exact name, even if it is not in
/// the listing, so a missing entry is reported by the extractor. A name
/// with wildcards selects every matching entry in stored order.
fn select(listing: &[String], args: &ExtractArgs) -> Result<Vec<String>> {
    let excluded = args
        .exclude
        .iter()
        .map(|x| Pattern::new(x).with_context(|| format!("invalid pattern '{x}'")))
        .collect::<Result<Vec<_>>>()?;
    let is_excluded = |name: &str| {
        excluded.iter().any(|p| p.matches(name)) || args.exclude.iter().any(|x| name.contains(x.as_str()))
    };

    let mut names = Vec::new();
    if args.names.is_empty() {
        names.extend(listing.iter().cloned());
    }
    for requested in &args.names {
        if has_glob_chars(requested) {
            let pattern = Pattern::new(requested)
                .with_context(|| format!("invalid pattern '{requested}'"))?;
            names.extend(listing.iter().filter(|name| pattern.matches(name)).cloned());
        } else {
            names.push(requested.clone());
        }
    }

    names.retain(|name| !is_excluded(name.as_str()));
    Ok(names)
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Create a new archive from the given sources.
fn create(args: &CreateArgs) -> Result<()> {
    let mut target = CreationTarget::new(args.sources.iter().map(PathBuf::from), &args.archive)
        .compression_level(args.level);
    target.password = args.password.clone();

    let report = ZipArchiver::default()
        .create(&target)
        .with_context(|| format!("cannot create '{}'", args.archive))?;

    if !args.quiet {
        println!(
            "created '{}': {} entries, {}",
            args.archive,
            report.entries,
            format_size(report.bytes_in)
        );
    }
    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
