//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CSV-driven email and chatbot automation on Gemini.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding the raw CSV datasets
    #[arg(long, global = true, env = "COMMS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Gemini model name
    #[arg(long, global = true, env = "GEMINI_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean the raw datasets and write processed files, splits, and samples
    Preprocess(PreprocessArgs),

    /// Run text preprocessing on a single text and print the result as JSON
    Analyze(AnalyzeArgs),

    /// Categorize and draft replies for every email in a CSV
    Emails(BatchArgs),

    /// Generate chatbot responses for every conversation in a CSV
    Conversations(BatchArgs),

    /// Draft a reply to one email
    Reply(ReplyArgs),

    /// Suggest a follow-up for an email thread (JSON array of emails)
    FollowUp(FileArgs),

    /// Answer a business inquiry
    Inquiry(InquiryArgs),

    /// Summarize a business report text file
    Summarize(FileArgs),

    /// Analyze a conversation transcript (JSON array of chat messages)
    AnalyzeChat(FileArgs),

    /// Interactive chatbot on stdin/stdout
    Chat,
}

#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Copy raw datasets missing from the data directory out of this directory
    #[arg(long)]
    pub source_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Text to analyze
    pub text: String,

    /// Keep stopwords in the token list
    #[arg(long)]
    pub keep_stopwords: bool,

    /// Also ask the model for sentiment and tone
    #[arg(long)]
    pub api: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only process the first N rows
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ReplyArgs {
    #[arg(long)]
    pub subject: String,

    #[arg(long)]
    pub body: String,

    #[arg(long)]
    pub sender: String,

    /// Skip categorization and use this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct InquiryArgs {
    /// Inquiry text
    pub text: String,

    /// Business context entry, repeatable
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub context: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    pub file: PathBuf,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
