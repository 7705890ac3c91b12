//! chef-facts cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; chef-facts ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract the facts of one cookbook
    ///
    /// Fails when the directory is not a cookbook. Files that cannot be parsed are
    /// skipped and listed in `meta.coverage.notes`.
    Extract(ExtractCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ExtractCommand {
    /// Cookbook directory
    #[clap(short = 'c', long = "cookbook", default_value = ".")]
    pub cookbook: PathBuf,

    /// Write the fact document to a file instead of stdout
    #[clap(short = 'o', long = "out")]
    pub out: Option<PathBuf>,

    /// Print the coverage counters as one JSON line
    ///
    /// Goes to stdout, or is the only output on stdout when --out is given.
    #[clap(long = "summary")]
    pub summary: bool,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// List the files of the cookbook in the work directory
    Files,
    /// Print the syntax tree of a file (`.erb` files use the template grammar)
    Tree { file: PathBuf },
}
