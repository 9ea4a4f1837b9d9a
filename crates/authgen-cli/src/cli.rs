use std::path::PathBuf;

use authgen_config::OutputFormat;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "authgen")]
#[command(about = "Compile AuthPolicy documents into Istio EnvoyFilter resources")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ./authgen.toml when present)
    #[arg(short, long, global = true, env = "AUTHGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "AUTHGEN_LOG")]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile an AuthPolicy into an EnvoyFilter
    Compile(CompileArgs),
    /// Resolve a well-known URI to endpoints and the cluster target
    Resolve(ResolveArgs),
    /// Inspect effective settings
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct CompileArgs {
    /// Policy file, YAML or JSON (reads from stdin if omitted)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Output format (overrides output.format)
    #[arg(long)]
    pub format: Option<OutputFormat>,
    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ResolveArgs {
    /// OIDC discovery URI
    pub uri: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print effective settings as TOML
    Show,
}
