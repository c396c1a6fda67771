//! Client-side admission control for LLM platform calls.
//!
//! Every outbound call passes through two token buckets keyed by
//! `(platform, credential)`: a request bucket consuming one unit per call
//! and a token bucket consuming the estimated prompt token count. After the
//! provider reports actual usage, the token bucket is reconciled so that
//! under-estimates slow down subsequent calls.
//!
//! Storage is in-memory, built on the governor crate.

#![deny(missing_docs)]

mod error;
mod manager;
mod request;
mod storage;

pub use error::RateLimitError;
pub use manager::RateLimitManager;
pub use request::{AdmissionRequest, AdmissionRequestBuilder};
pub use storage::{InMemoryStorage, RateLimitStorage, StorageError};
