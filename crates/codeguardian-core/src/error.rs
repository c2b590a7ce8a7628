use std::path::PathBuf;

/// Errors that can occur across the review bot.
///
/// Library crates use this type directly; the binary reports it through
/// `miette` at the process boundary.
///
/// # Examples
///
/// ```
/// use codeguardian_core::GuardianError;
///
/// let err = GuardianError::Config("bad provider".into());
/// assert!(err.to_string().contains("bad provider"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum GuardianError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// One or more required environment variables are unset or empty.
    #[error("Missing required environment variables:\n  - {}", .0.join("\n  - "))]
    #[diagnostic(
        code(codeguardian::missing_env),
        help("export the variables listed above before running codeguardian")
    )]
    MissingEnv(Vec<String>),

    /// One or more required files do not exist.
    #[error("Required files are missing:\n  - {}", display_paths(.0))]
    #[diagnostic(code(codeguardian::missing_files))]
    MissingFiles(Vec<PathBuf>),

    /// AI provider API failure after retries and fallbacks.
    #[error("AI provider error: {0}")]
    Provider(String),

    /// GitHub API or event payload failure.
    #[error("GitHub error: {0}")]
    GitHub(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  - ")
}
