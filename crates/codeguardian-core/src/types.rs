use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One finding reported by the AI reviewer.
///
/// Every field deserializes leniently so a single malformed entry does not
/// void the whole result. `line` keeps the raw JSON value; use
/// [`Issue::line_number`] or [`Issue::is_postable`] to validate it.
///
/// # Examples
///
/// ```
/// use codeguardian_core::Issue;
///
/// let issue: Issue = serde_json::from_str(
///     r#"{"id":"CQ-4.05","path":"src/App.jsx","line":12,"message":"Missing key","suggestion":"Use todo.id"}"#,
/// ).unwrap();
/// assert_eq!(issue.line_number(), Some(12));
/// assert!(issue.is_postable());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Rule identifier, e.g. `CQ-4.05`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// File path relative to the repository root.
    #[serde(default, deserialize_with = "lenient_string")]
    pub path: String,
    /// Line in the new version of the file, as reported.
    #[serde(default)]
    pub line: Value,
    /// Explanation of the problem.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    /// Proposed fix.
    #[serde(default, deserialize_with = "lenient_string")]
    pub suggestion: String,
}

impl Issue {
    /// Convenience constructor for a well-formed issue.
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        line: u64,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            line: Value::from(line),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// The line as a positive integer, if it is one.
    pub fn line_number(&self) -> Option<u64> {
        self.line.as_u64().filter(|l| *l > 0)
    }

    /// `true` when the issue can be anchored as an inline comment: a
    /// non-empty path and a positive integer line.
    pub fn is_postable(&self) -> bool {
        !self.path.is_empty() && self.line_number().is_some()
    }

    /// Human-readable `path:line` location.
    pub fn location(&self) -> String {
        match &self.line {
            Value::Null => self.path.clone(),
            Value::String(s) => format!("{}:{s}", self.path),
            other => format!("{}:{other}", self.path),
        }
    }
}

/// The parsed reviewer output.
///
/// # Examples
///
/// ```
/// use codeguardian_core::ReviewResult;
///
/// let result: ReviewResult = serde_json::from_str("{}").unwrap();
/// assert!(result.issues.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Issues in the order the reviewer reported them.
    #[serde(default, deserialize_with = "lenient_issues")]
    pub issues: Vec<Issue>,
}

/// Strings pass through, numbers and booleans are stringified, anything
/// else becomes empty.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Non-object entries become empty issues, which fail validation and are
/// counted as skipped. A non-array `issues` is treated as no issues.
fn lenient_issues<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Issue>, D::Error> {
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(_) => serde_json::from_value(entry).unwrap_or_default(),
            _ => Issue::default(),
        })
        .collect())
}

/// Identity of the pull request that comments are posted to.
///
/// # Examples
///
/// ```
/// use codeguardian_core::PrContext;
///
/// let ctx = PrContext {
///     owner: "octo".into(),
///     repo: "todo-app".into(),
///     pull_number: 7,
///     head_sha: "0123456789abcdef".into(),
/// };
/// assert_eq!(ctx.to_string(), "octo/todo-app#7 @ 0123456");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrContext {
    /// Repository owner login.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub pull_number: u64,
    /// Head commit the comments attach to.
    pub head_sha: String,
}

impl std::fmt::Display for PrContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short: String = self.head_sha.chars().take(7).collect();
        write!(f, "{}/{}#{} @ {short}", self.owner, self.repo, self.pull_number)
    }
}

/// Tally of one posting run.
///
/// `total` counts every issue handed to the poster, before validation and
/// capping, so `posted + skipped + failed <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingStats {
    /// Comments GitHub accepted.
    pub posted: usize,
    /// Issues rejected by validation.
    pub skipped: usize,
    /// Comments GitHub rejected or that failed in transit.
    pub failed: usize,
    /// Issues received.
    pub total: usize,
}

impl PostingStats {
    /// Valid issues dropped because of the inline comment cap.
    pub fn capped(&self) -> usize {
        self.total
            .saturating_sub(self.skipped + self.posted + self.failed)
    }
}
