use clap::{Args, Parser, Subcommand};

use crate::config::CompressionLevel;

#[derive(Parser, Debug)]
#[command(name = "ziparc")]
#[command(version)]
#[command(about = "List, extract and create ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  ziparc list -v data.zip                 list entries with sizes and dates\n  \
  ziparc list --depth 0 data.zip          list top-level entries only\n  \
  ziparc extract data.zip '*.txt' -d out  extract matching entries into out/\n  \
  ziparc extract -p foo.zip | more        send entry contents via pipe into more\n  \
  ziparc create -P secret backup.zip docs notes.txt")]
pub struct Cli {
    /// Verbose logging (-vv => trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive entries in stored order
    List(ListArgs),
    /// Extract all or selected entries
    Extract(ExtractArgs),
    /// Create a new archive from files and directories
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// ZIP file path
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Only show entries at this nesting depth (0 = top level)
    #[arg(long, value_name = "N")]
    pub depth: Option<usize>,

    /// Show sizes, compression ratio and timestamps
    #[arg(short = 'l', long = "long")]
    pub long: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// ZIP file path
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Entries to extract, by exact name or glob (default: all)
    #[arg(value_name = "NAMES")]
    pub names: Vec<String>,

    /// Extract entries into DIR
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub extract_dir: String,

    /// Password for encrypted entries
    #[arg(short = 'P', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Exclude entries matching the patterns that follow
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Extract entries to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Archive to create; must not exist
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Files and directories to add
    #[arg(value_name = "SOURCES", required = true)]
    pub sources: Vec<String>,

    /// Encrypt entries with this password
    #[arg(short = 'P', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Compression level
    #[arg(long, value_enum, default_value_t = CompressionLevel::Default)]
    pub level: CompressionLevel,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl ExtractArgs {
    /// Whether anything other than entry data may be printed.
    pub fn is_quiet(&self) -> bool {
        self.quiet || self.pipe
    }

    /// Whether entries were selected by name or pattern.
    pub fn is_selective(&self) -> bool {
        !self.names.is_empty() || !self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_extract_with_patterns_and_password() {
        let cli = Cli::try_parse_from([
            "ziparc", "extract", "a.zip", "*.txt", "docs/readme.md", "-d", "out", "-P", "pw",
        ])
        .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.names, ["*.txt", "docs/readme.md"]);
        assert_eq!(args.extract_dir, "out");
        assert_eq!(args.password.as_deref(), Some("pw"));
        assert!(args.is_selective());
    }

    #[test]
    fn parses_create_level() {
        let cli = Cli::try_parse_from(["ziparc", "create", "--level", "best", "out.zip", "src"])
            .unwrap();
        let Command::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.level, CompressionLevel::Best);
        assert_eq!(args.sources, ["src"]);
    }
}
