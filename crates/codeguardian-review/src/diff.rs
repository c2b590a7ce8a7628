//! Diff acquisition and trimming.

use std::io::Read;
use std::path::Path;
use std::process::Command;

use codeguardian_core::GuardianError;

/// A diff cut down to the configured character cap.
///
/// # Examples
///
/// ```
/// use codeguardian_review::diff::TrimmedDiff;
///
/// let diff = TrimmedDiff::new("+añadir\n", 4);
/// assert_eq!(diff.text, "+aña");
/// assert_eq!(diff.raw_len, 8);
/// assert!(diff.was_trimmed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimmedDiff {
    /// At most `max_chars` characters of the raw diff.
    pub text: String,
    /// Characters in the raw diff.
    pub raw_len: usize,
    /// Characters in `text`.
    pub trimmed_len: usize,
}

impl TrimmedDiff {
    /// Keep the first `max_chars` Unicode scalar values of `raw`.
    pub fn new(raw: &str, max_chars: usize) -> Self {
        let raw_len = raw.chars().count();
        let text: String = match raw.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => raw[..byte_idx].to_string(),
            None => raw.to_string(),
        };
        let trimmed_len = raw_len.min(max_chars);
        Self {
            text,
            raw_len,
            trimmed_len,
        }
    }

    /// `true` when nothing is left to review.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// `true` when the cap cut the diff short.
    pub fn was_trimmed(&self) -> bool {
        self.trimmed_len < self.raw_len
    }
}

/// Run `git diff --unified=<context> base...head` in `repo`.
///
/// A git failure is logged and yields an empty diff.
pub fn git_diff(repo: &Path, base: &str, head: &str, context: u32) -> String {
    let range = format!("{base}...{head}");
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["diff", &format!("--unified={context}"), &range])
        .output();

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            tracing::warn!(range = %range, stderr = %stderr.trim(), "git diff failed");
            String::new()
        }
        Err(e) => {
            tracing::warn!(range = %range, error = %e, "failed to run git");
            String::new()
        }
    }
}

/// Compute the diff for `base...head`, or an empty diff if either side is
/// unknown.
pub fn compute_diff(repo: &Path, base: Option<&str>, head: Option<&str>, context: u32) -> String {
    match (base.filter(|b| !b.is_empty()), head.filter(|h| !h.is_empty())) {
        (Some(base), Some(head)) => git_diff(repo, base, head, context),
        _ => {
            tracing::warn!("base or head SHA not set, skipping diff computation");
            String::new()
        }
    }
}

/// Read a diff from `path`, or from stdin when `path` is `-`.
///
/// # Errors
///
/// Returns [`GuardianError::Io`] if the file or stdin cannot be read.
pub fn read_diff(path: &Path) -> Result<String, GuardianError> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    Ok(std::fs::read_to_string(path)?)
}
