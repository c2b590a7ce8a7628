//! AI review pipeline for pull requests.
//!
//! Provides diff acquisition, provider request construction, a retrying
//! HTTP client with Gemini model fallback, response extraction, comment
//! formatting and GitHub inline comment posting.

pub mod artifacts;
pub mod client;
pub mod diff;
pub mod extract;
pub mod format;
pub mod github;
pub mod pipeline;
pub mod poster;
pub mod provider;
pub mod request;
