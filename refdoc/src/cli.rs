//! Command-line interface definitions for refdoc

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI structure for the refdoc application
#[derive(Parser)]
#[command(name = "refdoc")]
#[command(version)]
#[command(about = "Render collapsible, sortable reference pages from JSON specs", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the documents come from
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Site configuration file (defaults to ./refdoc.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Section spec document; renders a single root without a configuration file
    #[arg(long, value_name = "FILE", conflicts_with = "config")]
    pub sections: Option<PathBuf>,

    /// Formatting rules document for --sections
    #[arg(long, value_name = "FILE", requires = "sections")]
    pub formatting: Option<PathBuf>,

    /// Table definitions document for --sections
    #[arg(long, value_name = "FILE", requires = "sections")]
    pub tables: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Available subcommands for refdoc
#[derive(Subcommand)]
pub enum Commands {
    /// Render the page to a single HTML file
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Output file path
        #[arg(short, long, default_value = "output.html")]
        output: PathBuf,

        /// Heading id to open the page at (deep link)
        #[arg(long, value_name = "ID")]
        anchor: Option<String>,

        /// Turn auto-formatting off by default; roots and sections that enable it keep it
        #[arg(long)]
        no_auto_format: bool,
    },

    /// Print the table of contents
    Outline {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Check documents for problems that would degrade the page
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },
}
