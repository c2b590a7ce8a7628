//! Markdown rendering for inline comments and the run summary.

use codeguardian_core::{Issue, ReviewResult};

/// Rule id to documentation anchor title.
const RULE_TITLES: &[(&str, &str)] = &[
    ("CQ-1.01", "Single-Responsibility-Everywhere"),
    ("CQ-1.02", "Predictability-&-Determinism"),
    ("CQ-1.03", "Explicit-over-Implicit"),
    ("CQ-1.04", "Separation-of-Concerns"),
    ("CQ-1.05", "Observability-&-Logging"),
    ("CQ-1.06", "Minimal-Global-State"),
    ("CQ-2.01", "Shared-Modules-Isolation"),
    ("CQ-2.02", "Consistent-Naming-(Features/Folders)"),
    ("CQ-2.03", "Absolute-Import-Paths"),
    ("CQ-2.04", "No-Cross-Feature-Coupling"),
    ("CQ-3.01", "Folders-use-kebab-case"),
    ("CQ-3.02", "Components/Hooks-Naming"),
    ("CQ-3.03", "Real-Constants-in-UPPER_SNAKE_CASE"),
    ("CQ-3.04", "Functions/Variables-in-camelCase"),
    ("CQ-3.05", "Boolean-Flags-Descriptive-&-Positive"),
    ("CQ-3.06", "Enums/Dictionaries-PascalCase"),
    ("CQ-3.07", "File-Name-=-Exported-Entity"),
    ("CQ-3.08", "Avoid-Abbreviations/Acronyms"),
    ("CQ-3.09", "No-Meaningless-Suffixes/Prefixes"),
    ("CQ-3.10", "Tests-Mirror-Source"),
    ("CQ-3.11", "Singular-Folder-for-Single-Feature"),
    ("CQ-3.12", "CSS/SCSS-Modules-Match-Component"),
    ("CQ-3.13", "Context/Provider-Naming-Consistency"),
    ("CQ-4.01", "Single-Responsibility-per-Component"),
    ("CQ-4.02", "Custom-Hooks-for-Shared-Logic"),
    ("CQ-4.03", "Complete-Effect-Dependencies"),
    ("CQ-4.05", "Proper-Keys-in-Lists"),
    ("CQ-4.06", "Clear-Conditional-Rendering"),
    ("CQ-4.07", "Memoization-&-Performance"),
    ("CQ-4.08", "No-Business-Logic-in-JSX"),
    ("CQ-4.09", "Avoid-Heavy-Components-(>200-lines)"),
    ("CQ-4.10", "Consistent-Event-Handlers"),
    ("CQ-4.11", "No-Inline-Functions-in-Hot-Loops"),
    ("CQ-4.12", "Use-Suspense-&-Lazy-Loading"),
    ("CQ-4.13", "Avoid-Mixing-UI-&-Business-Logic"),
    ("CQ-5.01", "Local-State-First"),
    ("CQ-5.02", "Server-State-via-React-Query"),
    ("CQ-5.03", "Derived-State-in-Selectors"),
    ("CQ-5.04", "Avoid-Prop-Drilling-Beyond-Two-Levels"),
    ("CQ-5.05", "Keep-State-Immutable"),
    ("CQ-5.06", "Avoid-Redundant-State"),
    ("CQ-5.07", "Reset-State-on-Unmount"),
];

/// Renders comment bodies and summaries with links into the rule docs.
///
/// # Examples
///
/// ```
/// use codeguardian_review::format::CommentFormatter;
///
/// let fmt = CommentFormatter::new("https://docs.example.com/rules");
/// assert_eq!(
///     fmt.rule_url("CQ-4.05"),
///     "https://docs.example.com/rules#CQ-4.05-%E2%80%94-Proper-Keys-in-Lists"
/// );
/// assert_eq!(fmt.rule_url("XYZ"), "https://docs.example.com/rules");
/// ```
#[derive(Debug, Clone)]
pub struct CommentFormatter {
    docs_url: String,
}

impl CommentFormatter {
    /// Create a formatter linking into `docs_url`.
    pub fn new(docs_url: impl Into<String>) -> Self {
        Self {
            docs_url: docs_url.into(),
        }
    }

    /// Documentation URL for a rule. Unknown ids link to the docs root.
    pub fn rule_url(&self, rule_id: &str) -> String {
        match RULE_TITLES.iter().find(|(id, _)| *id == rule_id) {
            // The separator is an em dash, percent-encoded.
            Some((_, title)) => format!("{}#{rule_id}-%E2%80%94-{title}", self.docs_url),
            None => self.docs_url.clone(),
        }
    }

    /// Markdown link for a rule.
    pub fn rule_link(&self, rule_id: &str) -> String {
        format!("[{rule_id}]({})", self.rule_url(rule_id))
    }

    /// Body of the inline comment for one issue.
    pub fn issue_comment(&self, issue: &Issue) -> String {
        let mut lines = vec![
            format!("**{}**", self.rule_link(&issue.id)),
            String::new(),
            issue.message.clone(),
        ];
        if !issue.suggestion.is_empty() {
            lines.push(String::new());
            lines.push(format!("**Suggestion:** {}", issue.suggestion));
        }
        lines.push(String::new());
        lines.push("---".into());
        lines.push(format!(
            "<sub>CodeGuardian AI • [View all rules →]({})</sub>",
            self.docs_url
        ));
        lines.join("\n")
    }

    /// Markdown summary of a whole review.
    pub fn summary(&self, result: &ReviewResult, model: &str, raw_diff_len: usize) -> String {
        let mut lines = vec![
            "## CodeGuardian AI Review".to_string(),
            String::new(),
            format!("<sub>Powered by {model} • Analyzed {raw_diff_len} characters</sub>"),
            String::new(),
        ];

        let count = result.issues.len();
        if count > 0 {
            let plural = if count > 1 { "s" } else { "" };
            lines.push(format!("### Found {count} issue{plural}"));
            lines.push(String::new());
            for (index, issue) in result.issues.iter().enumerate() {
                lines.push(format!("#### {}. {}", index + 1, self.rule_link(&issue.id)));
                lines.push(String::new());
                lines.push(format!("`{}`", issue.location()));
                lines.push(String::new());
                if !issue.message.is_empty() {
                    lines.push(issue.message.clone());
                    lines.push(String::new());
                }
                if !issue.suggestion.is_empty() {
                    lines.push(format!("**Suggestion:** {}", issue.suggestion));
                    lines.push(String::new());
                }
            }
        } else {
            lines.push("### ✓ No issues found".into());
            lines.push(String::new());
            lines.push("All code quality checks passed.".into());
            lines.push(String::new());
        }

        let json = serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".into());
        lines.extend([
            "---".to_string(),
            String::new(),
            "<details>".into(),
            "<summary>View detailed analysis</summary>".into(),
            String::new(),
            "```json".into(),
            json,
            "```".into(),
            String::new(),
            "</details>".into(),
            String::new(),
            format!(
                "<sub>**CodeGuardian AI** • [View documentation →]({})</sub>",
                self.docs_url
            ),
        ]);
        lines.join("\n")
    }
}
