use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GuardianError;

/// Top-level configuration loaded from `.codeguardian.toml`.
///
/// Resolution is layered: CLI flags > env vars > config file > defaults.
/// Built once at startup and passed by reference to each component.
///
/// # Examples
///
/// ```
/// use codeguardian_core::GuardianConfig;
///
/// let config = GuardianConfig::default();
/// assert_eq!(config.limits.max_inline_comments, 30);
/// assert_eq!(config.retry.max_attempts, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// AI provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Size caps.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Retry and backoff tuning.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Input and artifact file locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Rule documentation links.
    #[serde(default)]
    pub docs: DocsConfig,
}

impl GuardianConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Io`] if the file cannot be read, or
    /// [`GuardianError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, GuardianError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeguardian_core::GuardianConfig;
    ///
    /// let toml = r#"
    /// [limits]
    /// max_inline_comments = 10
    /// "#;
    /// let config = GuardianConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.limits.max_inline_comments, 10);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, GuardianError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay environment variables onto this configuration.
    ///
    /// `lookup` resolves a variable name to its value; pass
    /// `|k| std::env::var(k).ok()` for the process environment. Empty values
    /// count as unset. Numeric values that fail to parse, or are zero, keep
    /// the current value.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Config`] if `AI_PROVIDER` names an unknown
    /// provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeguardian_core::{GuardianConfig, Provider};
    ///
    /// let mut config = GuardianConfig::default();
    /// config
    ///     .apply_env(|k| match k {
    ///         "AI_PROVIDER" => Some("openai".into()),
    ///         "MAX_INLINE" => Some("12".into()),
    ///         _ => None,
    ///     })
    ///     .unwrap();
    /// assert_eq!(config.provider.kind, Provider::OpenAi);
    /// assert_eq!(config.limits.max_inline_comments, 12);
    /// ```
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), GuardianError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(kind) = var("AI_PROVIDER") {
            self.provider.kind = kind.parse().map_err(GuardianError::Config)?;
        }

        let key_var = match self.provider.kind {
            Provider::Gemini => var("AI_API_KEY"),
            Provider::OpenAi => var("OPENAI_API_KEY").or_else(|| var("AI_API_KEY")),
        };
        if key_var.is_some() {
            self.provider.api_key = key_var;
        }
        if let Some(model) = var("MODEL") {
            self.provider.model = Some(model);
        }
        if let Some(list) = var("FALLBACK_MODELS") {
            self.provider.fallback_models = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        let url_var = match self.provider.kind {
            Provider::Gemini => var("GEMINI_API_URL"),
            Provider::OpenAi => var("OPENAI_API_URL"),
        };
        if url_var.is_some() {
            self.provider.api_url = url_var;
        }

        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repository) = var("GITHUB_REPOSITORY") {
            self.github.repository = Some(repository);
        }
        if let Some(event_path) = var("GITHUB_EVENT_PATH") {
            self.github.event_path = Some(PathBuf::from(event_path));
        }
        if let Some(api_url) = var("GITHUB_API_URL") {
            self.github.api_url = api_url;
        }

        overlay_number(&var, "DIFF_MAX_CHARS", &mut self.limits.diff_max_chars);
        overlay_number(&var, "MAX_INLINE", &mut self.limits.max_inline_comments);
        if let Some(raw) = var("DIFF_UNIFIED_LINES") {
            match raw.trim().parse() {
                Ok(n) => self.limits.diff_unified_lines = n,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid DIFF_UNIFIED_LINES"),
            }
        }

        overlay_number(&var, "RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts);
        overlay_number(&var, "RETRY_INITIAL_DELAY_MS", &mut self.retry.initial_delay_ms);
        overlay_number(&var, "RETRY_MAX_DELAY_MS", &mut self.retry.max_delay_ms);
        if let Some(raw) = var("RETRY_BACKOFF_MULTIPLIER") {
            match raw.trim().parse::<f64>() {
                Ok(m) if m >= 1.0 && m.is_finite() => self.retry.backoff_multiplier = m,
                _ => tracing::warn!(value = %raw, "ignoring invalid RETRY_BACKOFF_MULTIPLIER"),
            }
        }

        Ok(())
    }

    /// Check values that the TOML schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), GuardianError> {
        if self.retry.max_attempts == 0 {
            return Err(GuardianError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.provider.attempts_per_model == 0 {
            return Err(GuardianError::Config(
                "provider.attempts_per_model must be at least 1".into(),
            ));
        }
        if !(self.retry.backoff_multiplier >= 1.0 && self.retry.backoff_multiplier.is_finite()) {
            return Err(GuardianError::Config(
                "retry.backoff_multiplier must be a finite number >= 1".into(),
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(GuardianError::Config("provider.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Return the provider API key, or the environment variable that should
    /// have supplied it.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] if no key is configured.
    pub fn require_api_key(&self) -> Result<&str, GuardianError> {
        self.provider
            .api_key
            .as_deref()
            .ok_or_else(|| GuardianError::MissingEnv(vec![self.provider.kind.key_env().into()]))
    }

    /// Return the names of every unset variable needed to post comments.
    pub fn missing_github_env(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.github.token.is_none() {
            missing.push("GITHUB_TOKEN".to_string());
        }
        if self.github.event_path.is_none() {
            missing.push("GITHUB_EVENT_PATH".to_string());
        }
        missing
    }
}

fn overlay_number<T, F>(var: &F, name: &str, slot: &mut T)
where
    T: FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => *slot = v,
        _ => tracing::warn!(variable = name, value = %raw, "ignoring invalid numeric override"),
    }
}

/// Supported AI providers.
///
/// # Examples
///
/// ```
/// use codeguardian_core::Provider;
///
/// let p: Provider = "Gemini".parse().unwrap();
/// assert_eq!(p, Provider::Gemini);
/// assert_eq!(p.to_string(), "gemini");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent`, with model fallback.
    #[default]
    Gemini,
    /// OpenAI chat completions with strict JSON schema output.
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    /// Environment variable that carries this provider's API key.
    pub fn key_env(self) -> &'static str {
        match self {
            Provider::Gemini => "AI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Default API base URL.
    pub fn default_api_url(self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Default model identifier.
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown AI provider: {other}")),
        }
    }
}

/// AI provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which provider to call (default: `gemini`).
    #[serde(default)]
    pub kind: Provider,
    /// Primary model. Defaults per provider when unset.
    pub model: Option<String>,
    /// Models tried in order after the primary (Gemini only).
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
    /// API base URL. Defaults per provider when unset.
    pub api_url: Option<String>,
    /// API key. Normally supplied via environment.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Per-attempt request timeout in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempt budget per fallback model (default: 2).
    #[serde(default = "default_attempts_per_model")]
    pub attempts_per_model: u32,
}

fn default_fallback_models() -> Vec<String> {
    [
        "gemini-2.5-flash",
        "gemini-2.5-pro",
        "gemini-2.0-flash-exp",
        "gemini-1.5-flash",
        "gemini-1.5-pro",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_attempts_per_model() -> u32 {
    2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: Provider::default(),
            model: None,
            fallback_models: default_fallback_models(),
            api_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            attempts_per_model: default_attempts_per_model(),
        }
    }
}

impl ProviderConfig {
    /// The primary model, falling back to the provider default.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.kind.default_model())
    }

    /// The API base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(self.kind.default_api_url())
            .trim_end_matches('/')
    }

    /// Models to attempt, in order: the primary first, then the fallback
    /// list. Duplicates are removed so no model is tried twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeguardian_core::ProviderConfig;
    ///
    /// let config = ProviderConfig {
    ///     model: Some("b".into()),
    ///     fallback_models: vec!["a".into(), "b".into(), "c".into()],
    ///     ..ProviderConfig::default()
    /// };
    /// assert_eq!(config.candidate_models(), vec!["b", "a", "c"]);
    /// ```
    pub fn candidate_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = Vec::with_capacity(self.fallback_models.len() + 1);
        let configured = self.fallback_models.iter().map(String::as_str);
        for model in std::iter::once(self.model()).chain(configured) {
            if !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }
}

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL (default: `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Value for the `X-GitHub-Api-Version` header.
    #[serde(default = "default_github_api_version")]
    pub api_version: String,
    /// `owner/repo`, used when the event payload lacks a base repository.
    pub repository: Option<String>,
    /// Path to the pull request event JSON.
    pub event_path: Option<PathBuf>,
    /// API token. Normally supplied via environment.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}

fn default_github_api_version() -> String {
    "2022-11-28".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            api_version: default_github_api_version(),
            repository: None,
            event_path: None,
            token: None,
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum diff characters sent to the provider (default: 150000).
    #[serde(default = "default_diff_max_chars")]
    pub diff_max_chars: usize,
    /// Maximum inline comments posted per run (default: 30).
    #[serde(default = "default_max_inline_comments")]
    pub max_inline_comments: usize,
    /// Context lines passed to `git diff --unified` (default: 0).
    #[serde(default)]
    pub diff_unified_lines: u32,
}

fn default_diff_max_chars() -> usize {
    150_000
}

fn default_max_inline_comments() -> usize {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            diff_max_chars: default_diff_max_chars(),
            max_inline_comments: default_max_inline_comments(),
            diff_unified_lines: 0,
        }
    }
}

/// Retry and backoff configuration shared by every HTTP call.
///
/// # Examples
///
/// ```
/// use codeguardian_core::RetryConfig;
///
/// let retry = RetryConfig::default();
/// assert_eq!(retry.retryable_statuses, vec![429, 500, 503]);
/// assert_eq!(retry.max_delay_ms, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts for single-endpoint calls (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds (default: 10000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays (default: 2.0).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// HTTP statuses that are retried. Everything else fails immediately.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 500, 503]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

/// Input files and hand-off artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Reviewer instruction (system prompt) file.
    #[serde(default = "default_instruction_path")]
    pub instruction: PathBuf,
    /// Review rules file.
    #[serde(default = "default_rules_path")]
    pub rules: PathBuf,
    /// Trimmed diff artifact.
    #[serde(default = "default_diff_trimmed_path")]
    pub diff_trimmed: PathBuf,
    /// Provider request artifact.
    #[serde(default = "default_request_path")]
    pub request: PathBuf,
    /// Raw provider response artifact.
    #[serde(default = "default_response_path")]
    pub response: PathBuf,
    /// Text extracted from the response.
    #[serde(default = "default_raw_text_path")]
    pub raw_text: PathBuf,
    /// Parsed review result.
    #[serde(default = "default_result_path")]
    pub result: PathBuf,
    /// Rendered markdown summary.
    #[serde(default = "default_comment_path")]
    pub comment: PathBuf,
}

fn default_instruction_path() -> PathBuf {
    PathBuf::from(".ai/ai-reviewer-instruction.md")
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(".ai/review-rules.md")
}

fn default_diff_trimmed_path() -> PathBuf {
    PathBuf::from("diff.trimmed")
}

fn default_request_path() -> PathBuf {
    PathBuf::from("request.json")
}

fn default_response_path() -> PathBuf {
    PathBuf::from("response.json")
}

fn default_raw_text_path() -> PathBuf {
    PathBuf::from("ai_raw_text.txt")
}

fn default_result_path() -> PathBuf {
    PathBuf::from("ai_result.json")
}

fn default_comment_path() -> PathBuf {
    PathBuf::from("comment.md")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            instruction: default_instruction_path(),
            rules: default_rules_path(),
            diff_trimmed: default_diff_trimmed_path(),
            request: default_request_path(),
            response: default_response_path(),
            raw_text: default_raw_text_path(),
            result: default_result_path(),
            comment: default_comment_path(),
        }
    }
}

/// Where rule ids link to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Base page for the code quality standards.
    #[serde(default = "default_rules_url")]
    pub rules_url: String,
}

fn default_rules_url() -> String {
    "https://clca-dev.atlassian.net/wiki/spaces/NL/pages/312246283/Frontend+Code+Quality+Architecture+Standards".into()
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            rules_url: default_rules_url(),
        }
    }
}
