//! Shared types and policy for kubegate.
//!
//! Everything here is pure: parameter validation, the instruction catalog,
//! mutation classification, output summaries, log redaction and the HTTP
//! wire types. Process execution and I/O live in `kubegated`.

pub mod catalog;
pub mod classify;
pub mod error;
pub mod params;
pub mod redact;
pub mod rpc;
pub mod summary;
pub mod validate;
pub mod version;

pub use version::VERSION;
