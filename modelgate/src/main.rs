#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use args::{Args, Command, EmbedArgs, InvokeArgs, TargetArgs, TokensArgs, ValidateArgs};
use clap::Parser;
use futures_util::StreamExt;
use modelgate_config::Config;
use modelgate_runtime::convert::MessageDialect;
use modelgate_runtime::{
    Credentials, InvokeRequest, InvokeResult, LargeLanguageModel, PromptMessage, PromptMessageTool,
    TextEmbeddingModel, TokenEstimator, Usage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if args.command.needs_config() {
        Some(Config::load(&args.config)?)
    } else {
        None
    };

    let _telemetry_guard = modelgate_telemetry::init(
        config.as_ref().and_then(|c| c.telemetry.as_ref()),
        &args.log_filter,
    )?;

    tracing::debug!(config_path = %args.config.display(), "starting modelgate");

    match args.command {
        Command::Invoke(cmd) => invoke(require(config.as_ref())?, cmd).await,
        Command::Validate(cmd) => validate(require(config.as_ref())?, cmd).await,
        Command::Tokens(cmd) => tokens(config.as_ref(), &cmd),
        Command::Embed(cmd) => embed(require(config.as_ref())?, cmd).await,
        Command::Schema(cmd) => schema(require(config.as_ref())?, &cmd),
    }
}

fn require(config: Option<&Config>) -> anyhow::Result<&Config> {
    config.context("configuration was not loaded")
}

/// Resolve a configured provider into its type and credential record
fn provider(config: &Config, name: &str) -> anyhow::Result<(modelgate_config::ProviderType, Credentials)> {
    let provider = config
        .provider(name)
        .with_context(|| format!("provider '{name}' is not configured"))?;
    Ok((provider.provider_type, Credentials::from(provider.credentials.clone())))
}

async fn invoke(config: &Config, cmd: InvokeArgs) -> anyhow::Result<()> {
    let TargetArgs { provider: name, model } = cmd.target;
    let (provider_type, credentials) = provider(config, &name)?;
    let llm = LargeLanguageModel::new(provider_type)?;

    let mut messages = Vec::new();
    if let Some(system) = cmd.system {
        messages.push(PromptMessage::system(system));
    }
    messages.push(PromptMessage::user(cmd.prompt));

    let request = InvokeRequest::new(model, credentials, messages)
        .parameters(cmd.params.into_iter().collect())
        .stream(cmd.stream);

    match llm.invoke(&request).await? {
        InvokeResult::Complete(result) => {
            println!("{}", result.message.content);
            for call in &result.message.tool_calls {
                println!("tool call {} {}({})", call.id, call.function.name, call.function.arguments);
            }
            print_usage(&result.usage);
        }
        InvokeResult::Stream(mut chunks) => {
            let mut stdout = std::io::stdout();
            let mut usage = None;
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                write!(stdout, "{}", chunk.message.content)?;
                stdout.flush()?;
                if chunk.is_final() {
                    usage = chunk.usage;
                }
            }
            writeln!(stdout)?;
            if let Some(usage) = usage {
                print_usage(&usage);
            }
        }
    }
    Ok(())
}

fn print_usage(usage: &Usage) {
    println!(
        "usage: prompt={} completion={} total={}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );
}

async fn validate(config: &Config, cmd: ValidateArgs) -> anyhow::Result<()> {
    let TargetArgs { provider: name, model } = cmd.target;
    let (provider_type, credentials) = provider(config, &name)?;

    if cmd.embedding {
        TextEmbeddingModel::new(provider_type)?
            .validate_credentials(&model, &credentials)
            .await?;
    } else {
        LargeLanguageModel::new(provider_type)?
            .validate_credentials(&model, &credentials)
            .await?;
    }

    println!("credentials for '{name}' are valid");
    Ok(())
}

fn tokens(config: Option<&Config>, cmd: &TokensArgs) -> anyhow::Result<()> {
    let messages = match (&cmd.prompt, &cmd.messages) {
        (Some(prompt), _) => vec![PromptMessage::user(prompt.as_str())],
        (None, Some(path)) => PromptMessage::parse_list(&read(path)?)?,
        (None, None) => anyhow::bail!("either --prompt or --messages is required"),
    };
    let tools: Vec<PromptMessageTool> = match &cmd.tools {
        Some(path) => serde_json::from_str(&read(path)?)
            .with_context(|| format!("failed to parse tools from {}", path.display()))?,
        None => Vec::new(),
    };

    let count = match (&cmd.provider, config) {
        (Some(name), Some(config)) => {
            let (provider_type, _) = provider(config, name)?;
            LargeLanguageModel::new(provider_type)?.get_num_tokens(&messages, &tools)
        }
        _ => TokenEstimator::shared().count_messages(&messages, MessageDialect::OPENAI, &tools),
    };

    println!("{count}");
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn embed(config: &Config, cmd: EmbedArgs) -> anyhow::Result<()> {
    let TargetArgs { provider: name, model } = cmd.target;
    let (provider_type, credentials) = provider(config, &name)?;

    let result = TextEmbeddingModel::new(provider_type)?
        .invoke(&model, &credentials, &cmd.texts, None)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn schema(config: &Config, cmd: &TargetArgs) -> anyhow::Result<()> {
    let (provider_type, credentials) = provider(config, &cmd.provider)?;
    let entity = LargeLanguageModel::new(provider_type)?.get_customizable_model_schema(&cmd.model, &credentials)?;

    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}
