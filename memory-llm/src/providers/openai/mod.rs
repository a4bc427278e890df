//! OpenAI-shaped HTTP adapters: embeddings, chat completions, redaction.
//!
//! The redaction endpoint is not part of OpenAI's real API surface; the
//! service's redaction collaborator is configured to speak this same
//! request/response shape, so it reuses the chat client.

pub mod chat;
pub mod client;
pub mod embedding;
pub mod identity;
pub mod redaction;
pub mod types;

pub use chat::OpenAIChatProvider;
pub use client::OpenAIClient;
pub use embedding::OpenAIEmbeddingProvider;
pub use identity::OpenAIIdentityProvider;
pub use redaction::OpenAIRedactionProvider;
