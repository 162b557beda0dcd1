//! Rulebook ingestion and retrieval for board-game rules Q&A.
//!
//! Uploaded PDF rulebooks are split into page-attributed chunks, embedded and
//! stored in a vector index scoped by game. Questions are answered with the
//! most similar passages and the pages they came from.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod ingest;
pub mod meta;
pub mod parse;
pub mod progress;
pub mod retrieve;
pub mod server;
pub mod store;
