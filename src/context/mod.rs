//! Execution context management: registration, cancellation and teardown.

pub mod cancellation;
pub mod registry;
pub mod scope;
pub mod transcript;

pub use cancellation::QueryCancellation;
pub use registry::QueryRegistry;
pub use scope::{ExecutionScope, ScopeServices};
pub use transcript::{MemoryTranscript, TranscriptSink};
