// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - crawl: run a crawl from a config file, write records as JSON Lines
// - check: validate a config file and show the compiled rules
//
// Flags on `crawl` override the matching keys of the config file.
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rule-crawler",
    version,
    about = "Crawl a site by pattern rules and extract fields with CSS selectors",
    long_about = "rule-crawler follows pagination and detail links that match the rules in a \
                  JSON config, and extracts one record per matching product page. \
                  Records are written as JSON Lines."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a site and extract records
    ///
    /// Example: rule-crawler crawl products.json --output products.jsonl
    Crawl {
        /// Path to the JSON crawl config
        config: PathBuf,

        /// Write records to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Stop after visiting this many pages (overrides the config)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum number of fetches in flight (overrides the config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the final summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a crawl config without crawling
    ///
    /// Example: rule-crawler check products.json
    Check {
        /// Path to the JSON crawl config
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl_with_overrides() {
        let cli = Cli::parse_from([
            "rule-crawler",
            "crawl",
            "products.json",
            "-o",
            "out.jsonl",
            "--max-pages",
            "10",
            "--json",
        ]);
        match cli.command {
            Commands::Crawl {
                config,
                output,
                max_pages,
                concurrency,
                json,
            } => {
                assert_eq!(config, PathBuf::from("products.json"));
                assert_eq!(output, Some(PathBuf::from("out.jsonl")));
                assert_eq!(max_pages, Some(10));
                assert_eq!(concurrency, None);
                assert!(json);
            }
            other => panic!("expected crawl, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::parse_from(["rule-crawler", "check", "products.json"]);
        assert!(matches!(cli.command, Commands::Check { .. }));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
