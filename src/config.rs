//! Configuration for the stack-stitcher CLI.
//!
//! Three subcommands cover the inspection workflow:
//! - `infer` - recover the file pattern for a file on disk
//! - `expand` - expand a pattern string into its file list
//! - `info` - open a stitched series over synthetic `.fake` ids and
//!   print its geometry and plane routing
//!
//! Options can also be set through environment variables with the
//! `STITCH_` prefix:
//!
//! - `STITCH_MAX_READERS` - reader pool bound (default: 1000)
//! - `STITCH_VERBOSE` - enable debug logging

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::stitch::DEFAULT_MAX_READERS;

// =============================================================================
// CLI
// =============================================================================

/// Stack Stitcher - view numbered image files as one 5D stack.
///
/// Discovers file-naming patterns, guesses which varying number means
/// which dimensional axis, and routes global plane indexes to
/// individual files.
#[derive(Parser, Debug, Clone)]
#[command(name = "stack-stitcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Infer the file pattern for a file on disk.
    Infer(InferConfig),

    /// Expand a pattern string into its file list.
    Expand(ExpandConfig),

    /// Open a stitched series and print its geometry.
    Info(InfoConfig),
}

// =============================================================================
// Subcommand configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InferConfig {
    /// The file to use as a template for the match.
    pub file: PathBuf,

    /// Discover one pattern per series instead of one overall pattern.
    #[arg(long)]
    pub series_split: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false, env = "STITCH_VERBOSE")]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExpandConfig {
    /// The pattern string to expand.
    pub pattern: String,

    /// Emit the listing as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false, env = "STITCH_VERBOSE")]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// The id to open: a file path or a pattern string. Pixel access
    /// uses the synthetic reader, so files should be `.fake` ids.
    pub id: String,

    /// Treat the id as a pattern string exactly as written.
    #[arg(long)]
    pub pattern_id: bool,

    /// Disable file grouping (open the id alone).
    #[arg(long)]
    pub no_group: bool,

    /// Bound on each series' reader pool; larger groups alias to one
    /// slot and reopen per plane.
    #[arg(long, default_value_t = DEFAULT_MAX_READERS, env = "STITCH_MAX_READERS")]
    pub max_readers: usize,

    /// Also print the global-plane to (file, plane) routing table.
    #[arg(long)]
    pub routing: bool,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false, env = "STITCH_VERBOSE")]
    pub verbose: bool,
}

impl InfoConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id must not be empty".to_string());
        }
        if self.max_readers == 0 {
            return Err("max_readers must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info_config() -> InfoConfig {
        InfoConfig {
            id: "t<1-3>.fake".to_string(),
            pattern_id: false,
            no_group: false,
            max_readers: DEFAULT_MAX_READERS,
            routing: false,
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn test_valid_info_config() {
        assert!(test_info_config().validate().is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut config = test_info_config();
        config.id = String::new();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("id"));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = test_info_config();
        config.max_readers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["stack-stitcher", "expand", "t<1-3>.tif", "--json"])
            .unwrap();
        match cli.command {
            Command::Expand(c) => {
                assert_eq!(c.pattern, "t<1-3>.tif");
                assert!(c.json);
            }
            _ => panic!("expected expand subcommand"),
        }

        let cli = Cli::try_parse_from([
            "stack-stitcher",
            "info",
            "t<1-3>.fake",
            "--max-readers",
            "2",
            "--routing",
        ])
        .unwrap();
        match cli.command {
            Command::Info(c) => {
                assert_eq!(c.max_readers, 2);
                assert!(c.routing);
            }
            _ => panic!("expected info subcommand"),
        }
    }
}
