//! Roberta - Subtitle Transcription Review
//!
//! Splits `.srt` files into token-bounded chunks of whole records, asks a
//! language model to flag suspicious transcriptions in each chunk, and
//! collects the findings into a Markdown report.

pub mod cli;
pub mod config;
pub mod error;
pub mod tokenizer;
pub mod chunker;
pub mod completion;
pub mod cache;
pub mod dispatcher;
pub mod report;
pub mod workflow;
pub mod session;
