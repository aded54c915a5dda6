use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// `cbin PATHS...` without a subcommand recycles, so `alias rm=cbin` works.
#[derive(Debug, Parser)]
#[command(name = "cbin")]
#[command(about = "A centralized recycle bin for Linux servers", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub recycle: RecycleArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The subcommand to run; bare targets mean `recycle`.
    pub fn into_command(self) -> Option<Commands> {
        match self.command {
            Some(command) => Some(command),
            None if !self.recycle.targets().is_empty() => Some(Commands::Recycle(self.recycle)),
            None => None,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move files or directories into the recycle bin
    Recycle(RecycleArgs),
    /// Restore files from the recycle bin
    Restore(RestoreArgs),
    /// Show what is in the recycle bin
    List(ListArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct RecycleArgs {
    /// Comma-separated list of files to recycle (e.g. file1.txt,file2.log)
    #[arg(short = 'f', long = "files", value_delimiter = ',')]
    pub files: Vec<String>,

    /// Files or directories to recycle
    pub paths: Vec<String>,

    /// Number of concurrent workers (defaults to numWorkers from the config)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Accepted for `rm -r` compatibility; directories always move whole
    #[arg(short = 'r', short_alias = 'R', long, hide = true)]
    pub recursive: bool,
}

impl RecycleArgs {
    pub fn targets(&self) -> Vec<String> {
        self.files.iter().chain(self.paths.iter()).cloned().collect()
    }
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Date to restore files from (format: YYYY-MM-DD)
    #[arg(short = 'd', long)]
    pub date: Option<String>,

    /// Restore a single file with this original name
    #[arg(short = 's', long = "single-file")]
    pub single_file: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show one date (format: YYYY-MM-DD)
    #[arg(short = 'd', long)]
    pub date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycle_collects_comma_list_and_positionals() {
        let cli = Cli::parse_from(["cbin", "recycle", "-f", "a.txt, b.log", "c.pdf", "-w", "3"]);
        match cli.command {
            Some(Commands::Recycle(args)) => {
                assert_eq!(args.targets(), vec!["a.txt", " b.log", "c.pdf"]);
                assert_eq!(args.workers, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bare_paths_default_to_recycle() {
        let cli = Cli::parse_from(["cbin", "-rf", "build", "notes.txt"]);
        match cli.into_command() {
            Some(Commands::Recycle(args)) => {
                assert_eq!(args.targets(), vec!["build", "notes.txt"]);
                assert!(args.recursive);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["cbin", "old.log"]);
        assert!(matches!(cli.into_command(), Some(Commands::Recycle(_))));
    }

    #[test]
    fn test_no_arguments_has_no_command() {
        assert!(Cli::parse_from(["cbin"]).into_command().is_none());
    }

    #[test]
    fn test_restore_flags() {
        let cli = Cli::parse_from(["cbin", "restore", "-d", "2024-11-02", "-s", "file1.txt"]);
        match cli.command {
            Some(Commands::Restore(args)) => {
                assert_eq!(args.date.as_deref(), Some("2024-11-02"));
                assert_eq!(args.single_file.as_deref(), Some("file1.txt"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
