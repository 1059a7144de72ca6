//! Retry support for the reload path.

pub mod backoff;
