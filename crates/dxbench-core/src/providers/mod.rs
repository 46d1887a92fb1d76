//! External service integrations: chat-completion inference, ICD-11 code
//! resolution, and text embeddings. Each concern is a trait with a real
//! HTTP-backed implementation and a scriptable fake for tests.

pub mod embedder;
pub mod inference;
pub mod resolver;
