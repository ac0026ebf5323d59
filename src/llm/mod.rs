//! LLM Provider Clients and Abstractions
//!
//! The research nodes talk to a language model through one trait,
//! [`LLMClient`], and two helpers in [`structured`] that add schema-typed
//! output and the retry budget on top of it.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server
//!
//! # Example
//!
//! ```ignore
//! use delve::llm::{structured, Provider};
//!
//! let client = Provider::from_config(&config.llm_provider)?.create_client()?;
//! let settings = structured::CallSettings { model: "gpt-4o", temperature: 0.0, max_retries: 2 };
//! let text = structured::generate_text(client.as_ref(), settings, "What is 2+2?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// Schema-typed generation with retries.
pub mod structured;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{GenerationRequest, LLMClient, Provider, ResponseSchema};
pub use structured::{generate_structured, generate_text, CallSettings};
