//! Communication pipelines.
//!
//! Every stage runs sequentially, one row at a time:
//! 1. `runner::run_data_pipeline()` prepares the CSV datasets (no LLM)
//! 2. `EmailAutomation` categorizes emails and drafts replies
//! 3. `ChatbotProcessor` answers chat messages with bounded history
//!
//! Keyword rules in `rules` back up the model for categorization and
//! drive intent detection on their own.

pub mod chatbot;
pub mod email;
pub mod memory;
pub mod rules;
pub mod runner;
pub mod types;

pub use chatbot::ChatbotProcessor;
pub use email::EmailAutomation;
pub use runner::{PipelineReport, run_data_pipeline};
pub use types::{ConversationAnalysis, EmailMessage, Intent, IntentResult, Satisfaction};
