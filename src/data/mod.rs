//! CSV datasets: loading, cleaning, and train/test preparation.

pub mod processor;
pub mod table;

pub use processor::DataProcessor;
pub use table::Table;

use std::fmt;

/// The three raw datasets the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatasetKind {
    Email,
    Chatbot,
    Report,
}

impl DatasetKind {
    /// Processing order.
    pub const ALL: [DatasetKind; 3] = [Self::Email, Self::Chatbot, Self::Report];

    /// Raw CSV file name inside the data directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Email => "email_communication_data.csv",
            Self::Chatbot => "chatbot_conversation_data.csv",
            Self::Report => "business_report_data.csv",
        }
    }

    /// Short key used in output file names.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chatbot => "chatbot",
            Self::Report => "report",
        }
    }

    pub fn fill_defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Email => &[
                ("Subject", "No Subject"),
                ("Email_Body", ""),
                ("Category", "Uncategorized"),
            ],
            Self::Chatbot => &[("User_Input", ""), ("AI_Response", "")],
            Self::Report => &[
                ("Report_Type", "General"),
                ("Summary", ""),
                ("Key_Findings", ""),
            ],
        }
    }

    /// `(source, target)` pairs for derived length columns.
    pub fn length_columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Email => &[("Email_Body", "Email_Length")],
            Self::Chatbot => &[
                ("User_Input", "Input_Length"),
                ("AI_Response", "Response_Length"),
            ],
            Self::Report => &[
                ("Summary", "Summary_Length"),
                ("Key_Findings", "Findings_Length"),
            ],
        }
    }

    /// Column whose values get case-normalized, if any.
    pub fn normalized_column(&self) -> Option<&'static str> {
        match self {
            Self::Email => Some("Category"),
            Self::Chatbot => None,
            Self::Report => Some("Report_Type"),
        }
    }

    /// Free-text column used for the preprocessing sample.
    pub fn sample_column(&self) -> &'static str {
        match self {
            Self::Email => "Email_Body",
            Self::Chatbot => "User_Input",
            Self::Report => "Summary",
        }
    }

    /// Stem of the `sample_<stem>_processed.txt` file.
    pub fn sample_stem(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Chatbot => "chat",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
