use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use sentinel_core::{
    formatter_for, CheckCategory, CheckResult, ConfigDocument, OutputFormat, Report, Severity,
};
use sentinel_dbt::ArtifactLoader;
use sentinel_engine::{plan, run, runner, Artifacts, Registry};

/// Failures printed to the console unless `--show-all-failures` is given
const MAX_CONSOLE_FAILURES: usize = 25;

/// dbt-sentinel - Configure and enforce conventions for your dbt project
#[derive(Parser)]
#[command(name = "dbt-sentinel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured checks against the dbt artifacts
    Check(CheckArgs),

    /// List every available check and what it iterates over
    ListChecks,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Config file (default: dbt-sentinel.yml, then pyproject.toml)
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Directory holding manifest.json and friends, overrides `dbt_artifacts_dir`
    #[arg(short, long)]
    artifacts_dir: Option<PathBuf>,

    /// Only run these categories, e.g. `manifest_checks,run_results_checks`
    #[arg(long, value_delimiter = ',')]
    only: Vec<CheckCategory>,

    /// Write the results to this file
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Format of the output file (default: inferred from its extension, else json)
    #[arg(long, requires = "output_file")]
    output_format: Option<OutputFormat>,

    /// Only write failed and errored results to the output file
    #[arg(long, requires = "output_file")]
    output_only_failures: bool,

    /// Print every failure instead of the first 25
    #[arg(long)]
    show_all_failures: bool,

    /// Plan the run and report how many checks would execute
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Check(args) => check_command(&args),
        Commands::ListChecks => list_checks_command(),
    }
    .unwrap_or_else(|e| {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        1
    });

    std::process::exit(exit_code);
}

/// Log to stderr; `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).with_target(false).boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

/// Check command - validate config, load artifacts, run checks, report
fn check_command(args: &CheckArgs) -> Result<i32> {
    let config_path = match &args.config_file {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
            ConfigDocument::discover(&cwd)?
        }
    };
    eprintln!("{} {}", "Using config file:".cyan(), config_path.display());

    let config = ConfigDocument::from_file(&config_path)
        .with_context(|| format!("Failed to load config file {}", config_path.display()))?;

    // Every entry is validated before any artifact is read
    let definitions = Registry::builtin().validate(&config)?;
    let definitions = runner::select_categories(definitions, &args.only);
    if definitions.is_empty() {
        eprintln!("{}", "No checks selected, nothing to do.".yellow());
        return Ok(0);
    }

    let loader = match &args.artifacts_dir {
        Some(dir) => ArtifactLoader::new(dir).with_package_name(config.package_name.clone()),
        None => ArtifactLoader::from_config(&config),
    };
    eprintln!("{} {}", "Loading artifacts from:".cyan(), loader.dir().display());

    let artifacts = Artifacts::load(&loader, runner::requirements(&definitions))
        .context("Failed to load dbt artifacts")?;
    let ctx = artifacts.context();

    if args.dry_run {
        let planned = plan(&definitions, &ctx);
        println!(
            "Dry run: {} checks would execute across {} configured checks.",
            planned.len() + planned.errored.len(),
            definitions.len()
        );
        return Ok(0);
    }

    let report = Report::from_results(run(&definitions, &ctx));
    print_report_summary(&report, args.show_all_failures);

    if let Some(path) = &args.output_file {
        let format = output_format(path, args.output_format);
        write_results(&report, path, format, args.output_only_failures)?;
        eprintln!("{} {} ({})", "Results saved to:".green(), path.display(), format);
    }

    Ok(report.exit_code())
}

/// List checks command
fn list_checks_command() -> Result<i32> {
    let registry = Registry::builtin();
    let width = registry.kinds().map(|k| k.name.len()).max().unwrap_or_default();

    for kind in registry.kinds() {
        println!(
            "{}  {:<16}  {}",
            format!("{:<width$}", kind.name).bold(),
            kind.iterate_over.as_str(),
            kind.summary.dimmed()
        );
    }

    Ok(0)
}

/// Explicit format wins, then the file extension, then json
fn output_format(path: &Path, explicit: Option<OutputFormat>) -> OutputFormat {
    explicit
        .or_else(|| OutputFormat::from_extension(path))
        .unwrap_or_default()
}

fn write_results(report: &Report, path: &Path, format: OutputFormat, only_failures: bool) -> Result<()> {
    let results = report.selected_results(only_failures);
    let contents = formatter_for(format).format(&results)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Cannot write {}", path.display()))?;

    tracing::info!(path = %path.display(), results = results.len(), format = %format, "Wrote output file");
    Ok(())
}

/// Print summary counts and a table of failures to stdout
fn print_report_summary(report: &Report, show_all: bool) {
    let summary = &report.summary;
    let errors = summary.errors + summary.errored;

    let success = format!("SUCCESS={}", summary.passed).green();
    let warn = if summary.warnings > 0 {
        format!("WARN={}", summary.warnings).yellow()
    } else {
        format!("WARN={}", summary.warnings).normal()
    };
    let error = if errors > 0 {
        format!("ERROR={}", errors).red().bold()
    } else {
        format!("ERROR={}", errors).normal()
    };
    println!("Done. {} {} {}", success, warn, error);

    if report.failures().is_empty() {
        println!("{}", "✓ All checks passed!".green().bold());
        return;
    }

    let limit = if show_all { None } else { Some(MAX_CONSOLE_FAILURES) };
    let totals = report.failures_by_check();
    let (groups, hidden) = visible_failures(report, limit);
    let width = groups
        .iter()
        .flat_map(|(_, results)| results.iter().map(|r| r.check_run_id.len()))
        .max()
        .unwrap_or_default();

    for (check, results) in &groups {
        println!();
        let total = totals.get(check).map_or(results.len(), Vec::len);
        println!("{} {}", check.bold(), format!("({total} failed)").dimmed());
        for result in results {
            let severity = match result.severity {
                Severity::Error => format!("{:<5}", "error").red().bold(),
                Severity::Warn => format!("{:<5}", "warn").yellow().bold(),
            };
            println!(
                "  {}  {:<width$}  {}",
                severity,
                result.check_run_id,
                result.failure_message.as_deref().unwrap_or_default()
            );
        }
    }

    if hidden > 0 {
        println!();
        println!(
            "{}",
            format!("... and {hidden} more. Use --show-all-failures or --output-file to see every failure.")
                .dimmed()
        );
    }
}

/// Failures grouped by check name, keeping at most `limit` rows overall.
///
/// Also returns how many failures were left out.
fn visible_failures(report: &Report, limit: Option<usize>) -> (Vec<(&str, Vec<&CheckResult>)>, usize) {
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut hidden = 0;
    let mut groups = Vec::new();

    for (check, results) in report.failures_by_check() {
        let shown = results.len().min(remaining);
        remaining -= shown;
        hidden += results.len() - shown;
        if shown > 0 {
            groups.push((check, results[..shown].to_vec()));
        }
    }

    (groups, hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn output_format_precedence() {
        assert_eq!(output_format(Path::new("out.xml"), None), OutputFormat::Junit);
        assert_eq!(output_format(Path::new("out.xml"), Some(OutputFormat::Tap)), OutputFormat::Tap);
        assert_eq!(output_format(Path::new("out.txt"), None), OutputFormat::Json);
    }

    #[test]
    fn parses_category_list() {
        let cli = Cli::try_parse_from([
            "dbt-sentinel",
            "check",
            "--only",
            "manifest_checks,run_results",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Check(args) = cli.command else {
            panic!("expected the check subcommand");
        };
        assert_eq!(args.only, vec![CheckCategory::Manifest, CheckCategory::RunResults]);
    }

    #[test]
    fn failures_are_grouped_by_check_and_capped() {
        let report = Report::from_results(vec![
            CheckResult::failed("check_model_names:0:orders", Severity::Warn, "bad name"),
            CheckResult::passed("check_model_names:0:stg_orders", Severity::Warn),
            CheckResult::failed("check_model_names:0:customers", Severity::Warn, "bad name"),
            CheckResult::errored("check_model_has_tags:0:orders", "boom"),
            CheckResult::failed("check_source_loader_populated:0:raw.orders", Severity::Error, "no loader"),
        ]);

        let summarize = |limit| {
            let (groups, hidden) = visible_failures(&report, limit);
            let groups: Vec<(&str, Vec<&str>)> = groups
                .into_iter()
                .map(|(check, results)| (check, results.iter().map(|r| r.check_run_id.as_str()).collect()))
                .collect();
            (groups, hidden)
        };

        assert_eq!(
            summarize(Some(2)),
            (
                vec![
                    ("check_model_has_tags", vec!["check_model_has_tags:0:orders"]),
                    ("check_model_names", vec!["check_model_names:0:customers"]),
                ],
                2
            )
        );
        assert_eq!(summarize(None).1, 0);
        assert_eq!(summarize(None).0.len(), 3);
    }

    #[test]
    fn output_format_requires_output_file() {
        assert!(Cli::try_parse_from(["dbt-sentinel", "check", "--output-format", "csv"]).is_err());
    }
}
