use codeguardian_core::{Issue, PostingStats, PrContext};

use crate::format::CommentFormatter;
use crate::github::GitHubClient;

/// Split issues into those that can be anchored inline and a count of the
/// rest.
///
/// # Examples
///
/// ```
/// use codeguardian_core::Issue;
/// use codeguardian_review::poster::partition_postable;
///
/// let issues = vec![
///     Issue::new("CQ-4.05", "a.js", 3, "m", ""),
///     Issue::new("CQ-4.05", "", 3, "m", ""),
///     Issue::new("CQ-4.05", "a.js", 0, "m", ""),
/// ];
/// let (valid, skipped) = partition_postable(&issues);
/// assert_eq!(valid.len(), 1);
/// assert_eq!(skipped, 2);
/// ```
pub fn partition_postable(issues: &[Issue]) -> (Vec<&Issue>, usize) {
    let mut valid = Vec::with_capacity(issues.len());
    let mut skipped = 0;
    for issue in issues {
        if issue.is_postable() {
            valid.push(issue);
        } else {
            let raw = serde_json::to_string(issue).unwrap_or_default();
            tracing::warn!(issue = %raw, "skipping invalid issue");
            skipped += 1;
        }
    }
    (valid, skipped)
}

/// Post one inline comment per valid issue, at most `max_comments`.
///
/// Issues are posted sequentially in their original order. A rejected
/// comment is logged and counted as failed; posting continues with the next
/// issue.
pub async fn post_issues(
    client: &GitHubClient,
    formatter: &CommentFormatter,
    ctx: &PrContext,
    issues: &[Issue],
    max_comments: usize,
) -> PostingStats {
    let (valid, skipped) = partition_postable(issues);
    let mut stats = PostingStats {
        skipped,
        total: issues.len(),
        ..PostingStats::default()
    };

    if valid.len() > max_comments {
        tracing::info!(
            valid = valid.len(),
            limit = max_comments,
            "capping inline comments"
        );
    }

    for issue in valid.into_iter().take(max_comments) {
        // is_postable guarantees a line number.
        let Some(line) = issue.line_number() else {
            continue;
        };
        let body = formatter.issue_comment(issue);
        match client.post_review_comment(ctx, &issue.path, line, &body).await {
            Ok(()) => {
                stats.posted += 1;
                tracing::info!(id = %issue.id, location = %issue.location(), "posted comment");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    id = %issue.id,
                    location = %issue.location(),
                    error = %e,
                    "failed to post comment"
                );
            }
        }
    }

    stats
}
