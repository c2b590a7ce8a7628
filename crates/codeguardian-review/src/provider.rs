use std::time::Duration;

use codeguardian_core::{GuardianConfig, GuardianError, Provider, ProviderConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::client::{HttpClient, RequestError, RetryPolicy};
use crate::request::RequestPayload;

/// Why one candidate model was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFailure {
    /// Model identifier.
    pub model: String,
    /// Failure description.
    pub reason: String,
}

/// A successful provider call.
#[derive(Debug, Clone)]
pub struct AiResponse {
    /// Raw response body.
    pub body: serde_json::Value,
    /// Model that produced the body.
    pub model: String,
    /// Models tried and abandoned before `model` succeeded.
    pub failures: Vec<ModelFailure>,
}

/// Client for the configured AI provider.
///
/// Gemini calls walk the candidate model list in order with a small
/// per-model attempt budget; the first success wins. OpenAI calls use the
/// single configured model with the full attempt budget.
///
/// # Examples
///
/// ```
/// use codeguardian_core::GuardianConfig;
/// use codeguardian_review::provider::AiClient;
///
/// let mut config = GuardianConfig::default();
/// config.provider.api_key = Some("test-key".into());
/// let client = AiClient::new(&config).unwrap();
/// assert_eq!(client.candidate_models()[0], "gemini-2.5-flash");
/// ```
pub struct AiClient {
    http: HttpClient,
    config: ProviderConfig,
    api_key: String,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("provider", &self.config.kind)
            .field("api_url", &self.config.api_url())
            .finish_non_exhaustive()
    }
}

impl AiClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] if no API key is configured, or
    /// [`GuardianError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &GuardianConfig) -> Result<Self, GuardianError> {
        let api_key = config.require_api_key()?.to_string();
        let http = HttpClient::new(
            RetryPolicy::from_config(&config.retry),
            Duration::from_secs(config.provider.timeout_secs),
        )?;
        Ok(Self {
            http,
            config: config.provider.clone(),
            api_key,
        })
    }

    /// Models that [`AiClient::generate`] will try, in order.
    pub fn candidate_models(&self) -> Vec<&str> {
        match self.config.kind {
            Provider::Gemini => self.config.candidate_models(),
            Provider::OpenAi => vec![self.config.model()],
        }
    }

    /// Send `payload` to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Config`] if the payload is shaped for a
    /// different provider, or [`GuardianError::Provider`] if every
    /// candidate model fails.
    pub async fn generate(&self, payload: &RequestPayload) -> Result<AiResponse, GuardianError> {
        if payload.provider() != self.config.kind {
            return Err(GuardianError::Config(format!(
                "request is shaped for {} but the configured provider is {}",
                payload.provider(),
                self.config.kind
            )));
        }
        match self.config.kind {
            Provider::Gemini => self.generate_with_fallback(payload).await,
            Provider::OpenAi => self.generate_openai(payload).await,
        }
    }

    async fn generate_with_fallback(
        &self,
        payload: &RequestPayload,
    ) -> Result<AiResponse, GuardianError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", header_value(&self.api_key)?);

        let mut failures = Vec::new();
        for model in self.candidate_models() {
            tracing::info!(model, "trying model");
            let url = format!("{}/{model}:generateContent", self.config.api_url());
            let result = self
                .call(&url, &headers, payload, self.config.attempts_per_model)
                .await;
            match result {
                Ok(body) => {
                    tracing::info!(model, "model succeeded");
                    return Ok(AiResponse {
                        body,
                        model: model.to_string(),
                        failures,
                    });
                }
                Err(reason) => {
                    tracing::warn!(model, error = %reason, "model failed");
                    failures.push(ModelFailure {
                        model: model.to_string(),
                        reason,
                    });
                }
            }
        }

        let summary = failures
            .iter()
            .map(|f| format!("{}: {}", f.model, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Err(GuardianError::Provider(format!(
            "all Gemini models failed. Errors: {summary}"
        )))
    }

    async fn generate_openai(&self, payload: &RequestPayload) -> Result<AiResponse, GuardianError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.api_key))?);

        let model = self.config.model();
        let url = format!("{}/chat/completions", self.config.api_url());
        tracing::info!(model, "calling OpenAI");
        let body = self
            .call(&url, &headers, payload, self.http.policy().max_attempts)
            .await
            .map_err(|reason| {
                GuardianError::Provider(format!("OpenAI model {model} failed: {reason}"))
            })?;
        Ok(AiResponse {
            body,
            model: model.to_string(),
            failures: Vec::new(),
        })
    }

    async fn call(
        &self,
        url: &str,
        headers: &HeaderMap,
        payload: &RequestPayload,
        attempts: u32,
    ) -> Result<serde_json::Value, String> {
        let response = self
            .http
            .post_json(url, headers, payload, attempts)
            .await
            .map_err(|e: RequestError| e.to_string())?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| format!("failed to parse response body: {e}"))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, GuardianError> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| GuardianError::Config("API key contains invalid header characters".into()))?;
    header.set_sensitive(true);
    Ok(header)
}
