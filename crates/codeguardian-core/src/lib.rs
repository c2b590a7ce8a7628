//! Core types, configuration, and error handling for codeguardian.
//!
//! This crate provides the shared foundation used by the review crate and
//! the CLI:
//! - [`GuardianError`]: unified error type using `thiserror`
//! - [`GuardianConfig`]: configuration from `.codeguardian.toml` plus
//!   environment overrides
//! - Shared types: [`Issue`], [`ReviewResult`], [`PrContext`], [`PostingStats`]

mod config;
mod error;
mod types;

pub use config::{
    DocsConfig, GitHubConfig, GuardianConfig, LimitsConfig, PathsConfig, Provider,
    ProviderConfig, RetryConfig,
};
pub use error::GuardianError;
pub use types::{Issue, PostingStats, PrContext, ReviewResult};

/// A convenience `Result` type for codeguardian operations.
pub type Result<T> = std::result::Result<T, GuardianError>;
