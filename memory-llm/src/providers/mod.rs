//! Concrete HTTP-backed collaborator adapters.

pub mod openai;

pub use openai::{
    OpenAIChatProvider, OpenAIClient, OpenAIEmbeddingProvider, OpenAIIdentityProvider, OpenAIRedactionProvider,
};
