//! aiquery: AI query execution engine
//!
//! Runs one conversational turn against a model service: picks the wire
//! protocol for the model, adapts the conversation, streams or buffers the
//! answer into a placeholder transcript message, dispatches any function
//! calls to plugins and appends the automated follow-up turn.
//!
//! Transports are supplied by the caller through [`provider::ChatProvider`]
//! and [`provider::ResponseProvider`]; the [`provider::openai`] and
//! [`provider::openai_responses`] modules hold the JSON and SSE codecs for
//! them.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use aiquery::prelude::*;
//!
//! # async fn example(
//! #     chat: Arc<dyn ChatProvider>,
//! #     responses: Arc<dyn ResponseProvider>,
//! # ) -> aiquery::error::Result<()> {
//! let transcript = Arc::new(MemoryTranscript::new());
//! let engine = QueryEngine::builder()
//!     .config(EngineConfig::load_default()?)
//!     .chat(chat)
//!     .responses(responses)
//!     .transcript(transcript.clone())
//!     .build();
//!
//! let outcome = engine
//!     .query(
//!         QueryRequest::builder()
//!             .conversation_id("conv-1")
//!             .model("gpt-4o")
//!             .messages(vec![ConversationMessage::user("Hello!")])
//!             .build(),
//!     )
//!     .await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;
