use std::path::Path;

use codeguardian_core::{GuardianConfig, GuardianError, PostingStats, ReviewResult};
use serde::Serialize;

use crate::artifacts;
use crate::diff::TrimmedDiff;
use crate::extract;
use crate::format::CommentFormatter;
use crate::github::{self, GitHubClient};
use crate::poster;
use crate::provider::{AiClient, ModelFailure};
use crate::request::{self, PromptInputs, RequestPayload};

/// Outcome of the provider stage.
///
/// # Examples
///
/// ```
/// use codeguardian_core::ReviewResult;
/// use codeguardian_review::pipeline::CallOutcome;
///
/// let outcome = CallOutcome {
///     result: ReviewResult::default(),
///     model: "gemini-2.5-flash".into(),
///     failed_models: vec![],
/// };
/// assert!(outcome.result.issues.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcome {
    /// Parsed review, or the empty fallback.
    pub result: ReviewResult,
    /// Model that answered.
    pub model: String,
    /// Models abandoned before `model` answered.
    pub failed_models: Vec<String>,
}

/// Review orchestrator.
///
/// Each stage reads its inputs from and writes its outputs to the
/// configured artifact paths, so the stages can run in one process or as
/// separate CLI invocations.
#[derive(Debug)]
pub struct ReviewPipeline<'a> {
    config: &'a GuardianConfig,
    formatter: CommentFormatter,
}

impl<'a> ReviewPipeline<'a> {
    /// Create a pipeline over `config`.
    pub fn new(config: &'a GuardianConfig) -> Self {
        Self {
            config,
            formatter: CommentFormatter::new(config.docs.rules_url.clone()),
        }
    }

    /// Fail early with every missing variable the selected stages need.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] listing the API key variable
    /// and, when `post` is set, the GitHub variables that are unset.
    pub fn preflight(&self, post: bool) -> Result<(), GuardianError> {
        let mut missing = Vec::new();
        if self.config.provider.api_key.is_none() {
            missing.push(self.config.provider.kind.key_env().to_string());
        }
        if post {
            missing.extend(self.config.missing_github_env());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GuardianError::MissingEnv(missing))
        }
    }

    /// Trim `raw` to the configured cap and write the diff artifact.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::Io`] if the artifact cannot be written.
    pub fn prepare_diff(&self, raw: &str) -> Result<TrimmedDiff, GuardianError> {
        let diff = TrimmedDiff::new(raw, self.config.limits.diff_max_chars);
        artifacts::write_text(&self.config.paths.diff_trimmed, &diff.text)?;
        tracing::info!(
            raw_chars = diff.raw_len,
            trimmed_chars = diff.trimmed_len,
            "diff prepared"
        );
        Ok(diff)
    }

    /// Build the provider request from the instruction, rules and trimmed
    /// diff files, and write the request artifact.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingFiles`] if the instruction or rules
    /// file is missing.
    pub fn build_request(&self) -> Result<RequestPayload, GuardianError> {
        let paths = &self.config.paths;
        artifacts::require_files(&[paths.instruction.as_path(), paths.rules.as_path()])?;
        let instruction = std::fs::read_to_string(&paths.instruction)?;
        let rules = std::fs::read_to_string(&paths.rules)?;
        let diff = read_optional(&paths.diff_trimmed)?;
        if diff.is_empty() {
            tracing::info!("no diff content found, building request with an empty diff");
        }

        let inputs = PromptInputs {
            instruction: &instruction,
            rules: &rules,
            diff: &diff,
        };
        let provider = &self.config.provider;
        let payload = request::build_request(provider.kind, provider.model(), &inputs);
        artifacts::write_json_compact(&paths.request, &payload)?;
        tracing::info!(
            provider = %provider.kind,
            prompt_chars = payload.prompt_chars(),
            path = %paths.request.display(),
            "request built"
        );
        Ok(payload)
    }

    /// Send `payload` to the provider, then extract, parse and summarize
    /// the answer, writing every intermediate artifact.
    ///
    /// Unparseable answers degrade to an empty review.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] without an API key, or
    /// [`GuardianError::Provider`] if every candidate model fails.
    pub async fn call(
        &self,
        payload: &RequestPayload,
        raw_diff_len: usize,
    ) -> Result<CallOutcome, GuardianError> {
        let client = AiClient::new(self.config)?;
        tracing::info!(models = ?client.candidate_models(), "calling AI provider");
        let response = client.generate(payload).await?;
        let paths = &self.config.paths;

        artifacts::write_json_pretty(&paths.response, &response.body)?;
        let text = extract::extract_text(&response.body);
        if text.is_empty() {
            tracing::warn!("no text extracted from response");
        }
        artifacts::write_text(&paths.raw_text, &text)?;

        let result = extract::parse_or_empty(&text);
        artifacts::write_json_pretty(&paths.result, &result)?;
        let summary = self.formatter.summary(&result, &response.model, raw_diff_len);
        artifacts::write_text(&paths.comment, &summary)?;

        tracing::info!(model = %response.model, issues = result.issues.len(), "review parsed");
        Ok(CallOutcome {
            result,
            model: response.model,
            failed_models: response.failures.into_iter().map(|f: ModelFailure| f.model).collect(),
        })
    }

    /// Post `result` as inline comments on the pull request named by the
    /// event payload.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianError::MissingEnv`] if the token or event path is
    /// unset, and [`GuardianError::GitHub`] if the pull request cannot be
    /// resolved. Individual comment failures are counted, not returned.
    pub async fn post(&self, result: &ReviewResult) -> Result<PostingStats, GuardianError> {
        let missing = self.config.missing_github_env();
        if !missing.is_empty() {
            return Err(GuardianError::MissingEnv(missing));
        }
        let Some(event_path) = self.config.github.event_path.as_deref() else {
            return Err(GuardianError::MissingEnv(vec!["GITHUB_EVENT_PATH".into()]));
        };
        let ctx = github::load_pr_context(event_path, self.config.github.repository.as_deref())?;
        tracing::info!(pr = %ctx, "posting inline comments");

        if result.issues.is_empty() {
            tracing::info!("no issues to post");
            return Ok(PostingStats::default());
        }

        let client = GitHubClient::new(&self.config.github, &self.config.retry)?;
        Ok(poster::post_issues(
            &client,
            &self.formatter,
            &ctx,
            &result.issues,
            self.config.limits.max_inline_comments,
        )
        .await)
    }

    /// Read the result artifact and run [`ReviewPipeline::post`].
    ///
    /// # Errors
    ///
    /// As [`ReviewPipeline::post`], plus [`GuardianError::MissingFiles`] if
    /// the result artifact is missing.
    pub async fn post_from_artifact(&self) -> Result<PostingStats, GuardianError> {
        let result: ReviewResult = artifacts::read_json(&self.config.paths.result)?;
        self.post(&result).await
    }
}

fn read_optional(path: &Path) -> Result<String, GuardianError> {
    if path.exists() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(String::new())
    }
}
