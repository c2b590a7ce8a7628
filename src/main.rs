use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use codeguardian_core::{GuardianConfig, PostingStats};
use codeguardian_review::pipeline::{CallOutcome, ReviewPipeline};
use codeguardian_review::request::RequestPayload;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_FILE: &str = ".codeguardian.toml";

#[derive(Parser)]
#[command(
    name = "codeguardian",
    version,
    about = "AI code review for pull requests",
    long_about = "CodeGuardian reviews a pull request diff against your team's rules with an\n\
                  AI model and posts each finding as an inline GitHub comment.\n\n\
                  Examples:\n  \
                    codeguardian run                       Full review in a pull_request workflow\n  \
                    codeguardian run --diff-file pr.diff --no-post\n  \
                                                           Review a saved diff locally\n  \
                    git diff main | codeguardian run --diff-file - --no-post\n  \
                    codeguardian init                      Write a default .codeguardian.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .codeguardian.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole review: diff, request, AI call, inline comments
    #[command(long_about = "Run the whole review workflow.\n\n\
        Computes `git diff base...head`, trims it, builds the provider request,\n\
        calls the AI provider and posts one inline comment per valid issue.\n\
        An empty diff ends the run successfully without calling the provider.\n\n\
        Base and head default to BASE_SHA/GITHUB_BASE_REF and HEAD_SHA/GITHUB_SHA.")]
    Run {
        /// Base commit (default: $BASE_SHA or $GITHUB_BASE_REF)
        #[arg(long)]
        base: Option<String>,

        /// Head commit (default: $HEAD_SHA or $GITHUB_SHA)
        #[arg(long)]
        head: Option<String>,

        /// Read the diff from a file ("-" for stdin) instead of running git
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// Repository to diff (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Write artifacts but do not post comments
        #[arg(long)]
        no_post: bool,
    },
    /// Build the provider request from the instruction, rules and diff files
    BuildRequest,
    /// Send the saved request to the AI provider and parse the answer
    Call {
        /// Raw diff size shown in the summary (default: $RAW_DIFF_LEN or 0)
        #[arg(long)]
        raw_diff_len: Option<usize>,
    },
    /// Post the saved review result as inline pull request comments
    Post,
    /// Create a default .codeguardian.toml configuration file
    #[command(long_about = "Create a default .codeguardian.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .codeguardian.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# CodeGuardian Configuration
# Environment variables override every value below.

[provider]
# kind = "gemini"             # or "openai" (AI_PROVIDER)
# model = "gemini-2.5-flash"  # MODEL
# fallback_models = ["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash-exp", "gemini-1.5-flash", "gemini-1.5-pro"]
# api_url = "https://generativelanguage.googleapis.com/v1beta/models"
# timeout_secs = 60
# attempts_per_model = 2

[github]
# api_url = "https://api.github.com"
# api_version = "2022-11-28"

[limits]
# diff_max_chars = 150000
# max_inline_comments = 30
# diff_unified_lines = 0

[retry]
# max_attempts = 5
# initial_delay_ms = 1000
# max_delay_ms = 10000
# backoff_multiplier = 2.0
# retryable_statuses = [429, 500, 503]

[paths]
# instruction = ".ai/ai-reviewer-instruction.md"
# rules = ".ai/review-rules.md"
# diff_trimmed = "diff.trimmed"
# request = "request.json"
# response = "response.json"
# raw_text = "ai_raw_text.txt"
# result = "ai_result.json"
# comment = "comment.md"

[docs]
# rules_url = "https://example.atlassian.net/wiki/spaces/ENG/pages/1/Code+Quality+Standards"
"#;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }));
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            if debug_enabled() {
                eprintln!("{report:?}");
            } else {
                eprintln!("Error: {report}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn debug_enabled() -> bool {
    std::env::var_os("DEBUG").is_some_and(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn load_config(path: Option<&Path>) -> Result<GuardianConfig> {
    let mut config = match path {
        Some(path) => GuardianConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                GuardianConfig::from_file(default_path)?
            } else {
                GuardianConfig::default()
            }
        }
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
            return Ok(());
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "codeguardian", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let pipeline = ReviewPipeline::new(&config);

    match cli.command {
        Command::Run {
            base,
            head,
            diff_file,
            repo,
            no_post,
        } => {
            let raw = match diff_file {
                Some(path) => codeguardian_review::diff::read_diff(&path)?,
                None => {
                    let base = base
                        .or_else(|| env_var("BASE_SHA"))
                        .or_else(|| env_var("GITHUB_BASE_REF"));
                    let head = head
                        .or_else(|| env_var("HEAD_SHA"))
                        .or_else(|| env_var("GITHUB_SHA"));
                    codeguardian_review::diff::compute_diff(
                        &repo,
                        base.as_deref(),
                        head.as_deref(),
                        config.limits.diff_unified_lines,
                    )
                }
            };

            let diff = pipeline.prepare_diff(&raw)?;
            if diff.is_empty() {
                println!("No changes to review (empty diff)");
                return Ok(());
            }
            if diff.was_trimmed() {
                eprintln!(
                    "Diff trimmed from {} to {} characters",
                    diff.raw_len, diff.trimmed_len
                );
            }

            pipeline.preflight(!no_post)?;
            let payload = pipeline.build_request()?;
            let outcome = call_with_spinner(&pipeline, &payload, diff.raw_len).await?;
            print_outcome(&outcome, diff.raw_len);

            if no_post {
                println!("Skipping inline comments (--no-post)");
            } else {
                let stats = pipeline.post(&outcome.result).await?;
                print_stats(&stats, config.limits.max_inline_comments);
            }
        }
        Command::BuildRequest => {
            let payload = pipeline.build_request()?;
            println!(
                "Built {} request ({} prompt characters) at {}",
                payload.provider(),
                payload.prompt_chars(),
                config.paths.request.display()
            );
        }
        Command::Call { raw_diff_len } => {
            let raw_diff_len = raw_diff_len.unwrap_or_else(raw_diff_len_from_env);
            pipeline.preflight(false)?;
            let payload: RequestPayload =
                codeguardian_review::artifacts::read_json(&config.paths.request)?;
            let outcome = call_with_spinner(&pipeline, &payload, raw_diff_len).await?;
            print_outcome(&outcome, raw_diff_len);
        }
        Command::Post => {
            let stats = pipeline.post_from_artifact().await?;
            print_stats(&stats, config.limits.max_inline_comments);
        }
        Command::Init | Command::Completions { .. } => {}
    }

    Ok(())
}

fn raw_diff_len_from_env() -> usize {
    match env_var("RAW_DIFF_LEN") {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "ignoring invalid RAW_DIFF_LEN");
            0
        }),
        None => 0,
    }
}

async fn call_with_spinner(
    pipeline: &ReviewPipeline<'_>,
    payload: &RequestPayload,
    raw_diff_len: usize,
) -> Result<CallOutcome> {
    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        let template = "{spinner:.cyan} {msg} ({elapsed})";
        if let Ok(style) = indicatif::ProgressStyle::with_template(template) {
            pb.set_style(style);
        }
        pb.set_message(format!("Reviewing with {}...", payload.provider()));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let outcome = pipeline.call(payload, raw_diff_len).await.inspect_err(|_e| {
        if let Some(pb) = &spinner {
            pb.finish_with_message("Failed");
        }
    })?;

    if let Some(pb) = spinner {
        pb.finish_with_message("Done");
    }
    Ok(outcome)
}

fn print_outcome(outcome: &CallOutcome, raw_diff_len: usize) {
    if !outcome.failed_models.is_empty() {
        println!("Fell back past: {}", outcome.failed_models.join(", "));
    }
    println!("Model used: {}", outcome.model);
    println!("Issues found: {}", outcome.result.issues.len());
    println!("Diff size: {raw_diff_len} chars");
}

fn print_stats(stats: &PostingStats, limit: usize) {
    print!("{}", stats_report(stats, limit));
}

fn stats_report(stats: &PostingStats, limit: usize) -> String {
    let mut out = String::from("Inline comments:\n");
    out.push_str(&format!("  Posted: {}\n", stats.posted));
    out.push_str(&format!("  Skipped (invalid): {}\n", stats.skipped));
    out.push_str(&format!("  Failed: {}\n", stats.failed));
    out.push_str(&format!("  Total: {}\n", stats.total));
    let capped = stats.capped();
    if capped > 0 {
        out.push_str(&format!("  Limited to {limit} comments ({capped} not posted)\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_includes_total_and_cap() {
        let stats = PostingStats {
            posted: 30,
            skipped: 0,
            failed: 0,
            total: 35,
        };
        let report = stats_report(&stats, 30);
        assert!(report.contains("  Posted: 30\n"));
        assert!(report.contains("  Total: 35\n"));
        assert!(report.contains("Limited to 30 comments (5 not posted)"));
    }

    #[test]
    fn stats_report_omits_cap_line_when_nothing_was_dropped() {
        let stats = PostingStats {
            posted: 1,
            skipped: 1,
            failed: 0,
            total: 2,
        };
        let report = stats_report(&stats, 30);
        assert!(report.contains("  Total: 2\n"));
        assert!(!report.contains("Limited"));
    }
}
