use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use premortem_core::enrich::{AnthropicEnricher, Enricher, NoopEnricher};
use premortem_core::git::GitBaselineSource;
use premortem_core::report::{Report, Severity};
use premortem_core::rules::{self, Profile, Rule};
use premortem_core::source::discover;
use premortem_core::{load_config, review, ReviewConfig, ReviewOptions};
use tracing_subscriber::EnvFilter;

mod render;

use render::{render, OutputFormat, RenderOptions};

#[derive(Parser, Debug)]
#[command(
    name = "premortem",
    author,
    version,
    about = "Design review and pre-mortem analysis for engineering documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze documents for missing considerations and risks
    Review {
        /// File path, directory, or glob pattern to analyze
        path: String,
        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,
        /// Minimum severity to display
        #[arg(long, value_enum, default_value_t = ThresholdArg::Low)]
        severity_threshold: ThresholdArg,
        /// Exit with code 1 if surfaced findings reach this severity
        #[arg(long, value_enum, default_value_t = FailOnArg::None)]
        fail_on: FailOnArg,
        /// Analysis profile (defaults to the configured profile)
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,
        /// Git ref to diff findings against
        #[arg(long, value_name = "REF")]
        baseline: Option<String>,
        /// Enrich top findings through the configured LLM provider
        #[arg(long)]
        with_llm: bool,
        /// Additional regex patterns to redact (repeatable)
        #[arg(long, value_name = "PATTERN")]
        redact: Vec<String>,
        /// Write output to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Disable color output
        #[arg(long)]
        no_color: bool,
        /// Show evidence for each finding in text output
        #[arg(long, visible_alias = "verbose")]
        show_evidence: bool,
        /// Include suppressed findings in text output
        #[arg(long)]
        show_suppressed: bool,
    },
    /// List all catalog rules
    ListRules {
        /// Emit rules as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Explain what a rule checks and how to address it
    Explain {
        /// Rule id, e.g. ARCH-001
        rule_id: String,
        /// Emit the explanation as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThresholdArg {
    Low,
    Med,
    High,
}

impl ThresholdArg {
    fn severity(self) -> Severity {
        match self {
            ThresholdArg::Low => Severity::Low,
            ThresholdArg::Med => Severity::Medium,
            ThresholdArg::High => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailOnArg {
    None,
    Med,
    High,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    General,
    Security,
    Performance,
    Reliability,
}

impl ProfileArg {
    fn profile(self) -> Profile {
        match self {
            ProfileArg::General => Profile::General,
            ProfileArg::Security => Profile::Security,
            ProfileArg::Performance => Profile::Performance,
            ProfileArg::Reliability => Profile::Reliability,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(3)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Review {
            path,
            format,
            severity_threshold,
            fail_on,
            profile,
            baseline,
            with_llm,
            redact,
            output,
            no_color,
            show_evidence,
            show_suppressed,
        } => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            let config = load_config(&cwd).context("failed to load configuration")?;
            let files = discover(&path, &config.ignore_paths)
                .with_context(|| format!("failed to discover files for '{path}'"))?;
            if files.is_empty() {
                bail!("no supported files found at '{path}'");
            }

            let now = Utc::now();
            let options = ReviewOptions {
                profile: profile.map(ProfileArg::profile),
                baseline_ref: baseline,
                enrich: with_llm,
                today: now.date_naive(),
                timestamp: now.to_rfc3339(),
                extra_redact: redact,
            };

            let enricher = build_enricher(&config, with_llm)?;
            let baseline_source = GitBaselineSource::new();
            let report = review(&files, &config, &options, enricher.as_ref(), &baseline_source)
                .await
                .context("review failed")?;

            let render_options = RenderOptions {
                no_color,
                show_evidence,
                show_suppressed,
                severity_threshold: severity_threshold.severity(),
            };
            let format = match format {
                FormatArg::Text => OutputFormat::Text,
                FormatArg::Json => OutputFormat::Json,
            };
            let rendered = render(&report, format, &render_options)?;

            match output {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("failed to write output to {}", path.display()))?,
                None => print!("{rendered}"),
            }

            if should_fail(&report, fail_on) {
                return Ok(ExitCode::from(1));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListRules { json } => {
            list_rules(json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Explain { rule_id, json } => {
            explain(&rule_id, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exit-code contract: nonzero iff a surfaced finding reaches the fail-on
/// severity. Surfaced means non-suppressed, and in baseline mode only the
/// new or worsened findings.
fn should_fail(report: &Report, fail_on: FailOnArg) -> bool {
    let threshold = match fail_on {
        FailOnArg::None => return false,
        FailOnArg::Med => Severity::Medium,
        FailOnArg::High => Severity::High,
    };
    match &report.comparison {
        Some(comparison) => comparison
            .surfaced()
            .any(|delta| delta.severity.is_some_and(|severity| severity >= threshold)),
        None => report
            .findings
            .iter()
            .filter(|finding| finding.is_active())
            .any(|finding| finding.severity >= threshold),
    }
}

fn build_enricher(config: &ReviewConfig, with_llm: bool) -> Result<Box<dyn Enricher>> {
    if !with_llm {
        return Ok(Box::new(NoopEnricher));
    }
    match config.llm.as_ref().filter(|llm| llm.enabled) {
        Some(llm) if llm.provider.eq_ignore_ascii_case("anthropic") => {
            Ok(Box::new(AnthropicEnricher::new(llm)?))
        }
        Some(llm) if llm.provider.eq_ignore_ascii_case("noop") => Ok(Box::new(NoopEnricher)),
        Some(llm) => bail!("unsupported llm provider `{}`", llm.provider),
        None => Ok(Box::new(NoopEnricher)),
    }
}

fn list_rules(json: bool) -> Result<()> {
    let mut rules: Vec<&Rule> = rules::catalog().iter().collect();
    rules.sort_by(|a, b| a.id.cmp(b.id));

    if json {
        let value: Vec<_> = rules
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.id,
                    "title": rule.title,
                    "severity": rule.severity,
                    "category": rule.category,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} rule(s) in the catalog", rules.len());
    for rule in rules {
        println!(
            "- {id:<10} [{severity:<6}] {category:<14} :: {title}",
            id = rule.id,
            severity = rule.severity.label(),
            category = rule.category.as_str(),
            title = rule.title,
        );
    }
    Ok(())
}

fn explain(rule_id: &str, json: bool) -> Result<()> {
    let rule = rules::find(rule_id)
        .with_context(|| format!("unknown rule id `{rule_id}`; see `premortem list-rules`"))?;

    if json {
        let value = serde_json::json!({
            "id": rule.id,
            "title": rule.title,
            "severity": rule.severity,
            "category": rule.category,
            "why": rule.impact,
            "how_to_fix": rule.recommendation,
            "pitfalls": rule.pitfalls,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}: {}", rule.id, rule.title);
    println!("Category: {}", rule.category.as_str());
    println!("Severity: {}", rule.severity.label());
    println!();
    println!("Why it matters:");
    println!("  {}", rule.impact);
    println!();
    println!("How to address it:");
    println!("  {}", rule.recommendation);
    if !rule.pitfalls.is_empty() {
        println!();
        println!("Common pitfalls:");
        println!("  {}", rule.pitfalls);
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("PREMORTEM_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
