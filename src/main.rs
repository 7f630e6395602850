mod cli;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use comms_assist::config::AppConfig;
use comms_assist::data::Table;
use comms_assist::llm::{ChatMessage, GeminiClient, LlmConfig, create_provider};
use comms_assist::pipeline::{ChatbotProcessor, EmailAutomation, EmailMessage, run_data_pipeline};
use comms_assist::text::TextPreprocessor;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    if let Some(model) = cli.model.clone() {
        config.model = model;
    }

    let _log_guard = init_tracing(&config.log_file, cli.verbose)?;

    match cli.command {
        Commands::Preprocess(args) => {
            let report = run_data_pipeline(&config, args.source_dir.as_deref())?;
            for dataset in &report.datasets {
                eprintln!(
                    "  {:<8} {:>5} rows  (train {}, test {})",
                    dataset.dataset, dataset.rows, dataset.train_rows, dataset.test_rows
                );
            }
            eprintln!("Wrote {} files to {}", report.written.len(), config.processed_dir().display());
        }

        Commands::Analyze(args) => {
            let text = TextPreprocessor::new();
            let result = text.preprocess_pipeline(&args.text, !args.keep_stopwords);
            println!("{}", serde_json::to_string_pretty(&result)?);

            if args.api {
                let client = build_client(&config)?;
                let sentiment = client.analyze_sentiment(&args.text).await?;
                println!("{}", serde_json::to_string_pretty(&sentiment)?);
                log_usage(&client);
            }
        }

        Commands::Emails(args) => {
            let client = build_client(&config)?;
            let automation = EmailAutomation::new(client.clone(), config.email_categories.clone());
            let input = load_batch(&args.input, args.limit)?;

            let output = automation.batch_process_emails(&input).await?;
            output.write_csv(&args.output)?;
            eprintln!("Processed {} emails -> {}", output.len(), args.output.display());
            log_usage(&client);
        }

        Commands::Conversations(args) => {
            let client = build_client(&config)?;
            let mut chatbot = ChatbotProcessor::new(client.clone(), config.chatbot_max_history);
            let input = load_batch(&args.input, args.limit)?;

            let output = chatbot.batch_process_conversations(&input).await?;
            output.write_csv(&args.output)?;
            eprintln!("Processed {} conversations -> {}", output.len(), args.output.display());
            log_usage(&client);
        }

        Commands::Reply(args) => {
            let client = build_client(&config)?;
            let automation = EmailAutomation::new(client.clone(), config.email_categories.clone());
            let reply = automation
                .generate_reply(&args.subject, &args.body, &args.sender, args.category.as_deref())
                .await?;
            println!("{reply}");
            log_usage(&client);
        }

        Commands::FollowUp(args) => {
            let thread: Vec<EmailMessage> = read_json(&args.file).await?;
            let client = build_client(&config)?;
            let automation = EmailAutomation::new(client.clone(), config.email_categories.clone());
            println!("{}", automation.suggest_follow_up(&thread).await?);
            log_usage(&client);
        }

        Commands::Inquiry(args) => {
            let client = build_client(&config)?;
            let chatbot = ChatbotProcessor::new(client.clone(), config.chatbot_max_history);
            let context: BTreeMap<String, String> = args.context.into_iter().collect();
            let answer = chatbot
                .handle_business_inquiry(&args.text, Some(&context))
                .await;
            println!("{answer}");
            log_usage(&client);
        }

        Commands::Summarize(args) => {
            let report = tokio::fs::read_to_string(&args.file)
                .await
                .with_context(|| format!("reading {}", args.file.display()))?;
            let client = build_client(&config)?;
            println!("{}", client.summarize_business_report(&report).await?);
            log_usage(&client);
        }

        Commands::AnalyzeChat(args) => {
            let conversation: Vec<ChatMessage> = read_json(&args.file).await?;
            let client = build_client(&config)?;
            let chatbot = ChatbotProcessor::new(client.clone(), config.chatbot_max_history);
            let analysis = chatbot.analyze_conversation(&conversation).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            log_usage(&client);
        }

        Commands::Chat => {
            let client = build_client(&config)?;
            let mut chatbot = ChatbotProcessor::new(client.clone(), config.chatbot_max_history);
            chatbot
                .run_interactive(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
            log_usage(&client);
        }
    }

    Ok(())
}

/// Stderr plus a non-blocking file layer. The guard must outlive `main`'s work.
fn init_tracing(log_file: &Path, verbose: u8) -> anyhow::Result<WorkerGuard> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_name = log_file
        .file_name()
        .context("log file path has no file name")?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

fn build_client(config: &AppConfig) -> anyhow::Result<Arc<GeminiClient>> {
    let llm_config = LlmConfig::from_app(config)?;
    let provider = create_provider(&llm_config)?;
    Ok(Arc::new(GeminiClient::new(provider, config.generation)))
}

fn load_batch(path: &Path, limit: Option<usize>) -> anyhow::Result<Table> {
    let table = Table::read_csv(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(match limit {
        Some(n) => table.head(n),
        None => table,
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn log_usage(client: &GeminiClient) {
    let usage = client.usage();
    tracing::info!(
        model = client.model_name(),
        requests = usage.requests,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        cost_usd = %usage.cost.round_dp(6),
        "API usage"
    );
}
