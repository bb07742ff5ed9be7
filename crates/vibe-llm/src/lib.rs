//! `vibe-llm` is the chat-completions client used by the `vibe` CLI.
//!
//! ```text
//! Conversation  ← system prompt, repository context, pruned turn history
//!     │
//!     ▼
//! ChatClient    ← POST {base}/chat/completions (bearer auth, X-Title)
//!     │
//!     ▼
//! ChatStream    ← futures::Stream<Item = Result<String>> of text deltas
//!                  decoded from server-sent events
//! ```
//!
//! ```rust,ignore
//! use vibe_llm::{ChatClient, ChatOptions, Conversation};
//!
//! let client = ChatClient::from_env("https://openrouter.ai/api/v1", opts)?;
//! let mut convo = Conversation::new("You are a coding assistant.");
//! convo.push_user("hello");
//! let reply = client
//!     .stream(&convo.messages())
//!     .await?
//!     .collect_text(|d| print!("{d}"))
//!     .await?;
//! ```

pub mod client;
pub mod conversation;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{ChatClient, API_KEY_ENV};
pub use conversation::Conversation;
pub use error::LlmError;
pub use stream::ChatStream;
pub use types::{ChatMessage, ChatOptions, Role};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
