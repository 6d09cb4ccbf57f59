//! Core types for aiquery.

pub mod completion;
pub mod message;
pub mod stream;
pub mod tool;
pub mod transcript;

pub use completion::*;
pub use message::*;
pub use stream::*;
pub use tool::*;
pub use transcript::*;
