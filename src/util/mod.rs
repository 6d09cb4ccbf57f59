//! Utility modules.

pub mod data_uri;
