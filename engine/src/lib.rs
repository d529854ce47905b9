//! Moustachar Engine Library
//!
//! This library provides the core functionality of the Moustachar engine:
//! a grounded question-answering assistant over Moroccan labor law.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Generation capability abstraction layer
pub mod llm;

/// Retrieval sources and fan-out orchestration
pub mod retrieval;

/// Conversation-aware query reformulation
pub mod reformulator;

/// Grounding/refusal policy and answer synthesis
pub mod answer;

/// Session turn controller
pub mod turn;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
