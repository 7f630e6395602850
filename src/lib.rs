//! Comms Assist: CSV-driven business email and chatbot automation on Gemini.

pub mod config;
pub mod data;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod text;
