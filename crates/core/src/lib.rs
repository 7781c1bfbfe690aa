//! Domain types and pure lifecycle logic for the OCR job client.
//!
//! Nothing in this crate performs I/O. The HTTP client, poll loop and
//! controller live in `ocrjob-client`.

pub mod error;
pub mod job_state;
pub mod lifecycle;
pub mod poll;
pub mod types;
