use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Cellar: put typed values into an object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Client configuration file (TOML). `CELLAR_*` variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a value into a fresh in-memory store and show the result
    Put(PutArgs),
    /// List the default builders and resolvers
    Builders(BuildersArgs),
    /// Show the effective client configuration
    Config(ConfigArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    String,
    /// Hex-encoded bytes
    Bytes,
}

#[derive(Args)]
pub struct PutArgs {
    pub value: String,
    #[arg(long = "as", value_enum, default_value = "string")]
    pub kind: ValueKind,
    #[arg(long)]
    pub persist: bool,
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct BuildersArgs {}

#[derive(Args)]
pub struct ConfigArgs {}
