use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "healthflow")]
#[command(version, about = "HealthFlow - health assistant backed by the Spark chat service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults to <config dir>/healthflow/config.toml)
    #[arg(long, global = true, env = "HEALTHFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Ask the assistant a question
    Chat(ChatArgs),

    /// Analyze the trend of one health indicator
    Analyze(AnalyzeArgs),

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Message to send
    pub message: String,

    /// User tag sent as the request uid; also selects the user's records
    #[arg(short, long)]
    pub user: Option<String>,

    /// Extra context appended to the system prompt
    #[arg(long)]
    pub context: Option<String>,

    /// Health records file used to build the context
    #[arg(long, env = "HEALTHFLOW_RECORDS")]
    pub records: Option<PathBuf>,

    /// Print the reply as it streams in
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Indicator id (heart-rate, weight, bmi, body-fat, calorie, sleep, running, exercise-heart-rate)
    #[arg(short, long)]
    pub indicator: String,

    /// Whose records to analyze
    #[arg(short, long)]
    pub user: Option<String>,

    /// Health records file
    #[arg(long, env = "HEALTHFLOW_RECORDS")]
    pub records: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration with the secret masked
    Show,
    /// Print the config file path
    Path,
}
