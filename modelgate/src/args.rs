use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::Value;

/// Modelgate model runtime
#[derive(Debug, Parser)]
#[command(name = "modelgate", about = "Invoke, validate and inspect OpenAI-shaped model providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "modelgate.toml", env = "MODELGATE_CONFIG")]
    pub config: PathBuf,

    /// Log filter directive
    #[arg(long, default_value = "warn", env = "MODELGATE_LOG")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a completion for a prompt
    Invoke(InvokeArgs),
    /// Check a provider's credentials with a minimal call
    Validate(ValidateArgs),
    /// Estimate prompt tokens
    Tokens(TokensArgs),
    /// Embed texts
    Embed(EmbedArgs),
    /// Print the schema of a customizable model
    Schema(TargetArgs),
}

impl Command {
    /// Whether the command resolves a configured provider
    pub const fn needs_config(&self) -> bool {
        match self {
            Self::Tokens(args) => args.provider.is_some(),
            _ => true,
        }
    }
}

/// Provider and model a command runs against
#[derive(Debug, ClapArgs)]
pub struct TargetArgs {
    /// Configured provider name
    #[arg(short, long)]
    pub provider: String,

    /// Model or deployment id
    #[arg(short, long)]
    pub model: String,
}

#[derive(Debug, ClapArgs)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// User prompt
    #[arg(long)]
    pub prompt: String,

    /// Optional system instruction
    #[arg(long)]
    pub system: Option<String>,

    /// Print chunks as they arrive
    #[arg(long)]
    pub stream: bool,

    /// Model parameter as `key=value`; values parse as JSON when they can
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,
}

#[derive(Debug, ClapArgs)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Validate as an embedding model
    #[arg(long)]
    pub embedding: bool,
}

#[derive(Debug, ClapArgs)]
pub struct TokensArgs {
    /// Count a single user message
    #[arg(long, conflicts_with = "messages", required_unless_present = "messages")]
    pub prompt: Option<String>,

    /// JSON file holding an array of prompt messages
    #[arg(long)]
    pub messages: Option<PathBuf>,

    /// JSON file holding an array of tools
    #[arg(long)]
    pub tools: Option<PathBuf>,

    /// Count with this provider's message dialect
    #[arg(short, long)]
    pub provider: Option<String>,
}

#[derive(Debug, ClapArgs)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Texts to embed
    #[arg(required = true)]
    pub texts: Vec<String>,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_owned(), value))
}
