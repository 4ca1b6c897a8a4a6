use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use cli::batch::{self, ApplyStatus, BatchEntry, BatchOptions, BatchSummary};
use cli::inputs;
use docsort_core::config::{self, AppConfig, ConflictPolicy, TransferMode};
use docsort_core::pipeline::{self, Context, FileStatus};
use docsort_core::rules::RuleTable;
use docsort_core::split;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(rules) = cli.rules {
        cfg.rules.path = Some(rules);
    }

    match cli.command {
        Commands::Classify { paths, json } => run_classify(cfg, paths, json).await,
        Commands::Rename(args) => run_rename(cfg, args).await,
        Commands::Rules { category, json } => run_rules(&cfg, category.as_deref(), json),
        Commands::Categories => run_categories(&cfg),
        Commands::Split { pdf, output, prefix } => run_split(pdf, output, &prefix),
    }
}

#[derive(Parser)]
#[command(name = "docsort")]
#[command(about = "Classify PDF and CSV documents by keyword rules and rename them", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Rules file or directory, replacing the built-in rules
    #[arg(long, global = true)]
    rules: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and classify files without renaming them
    Classify {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify files and copy or move them under their new names
    Rename(RenameArgs),
    /// List the loaded rules
    Rules {
        /// Only rules in this category
        #[arg(long)]
        category: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List rule categories
    Categories,
    /// Split a PDF into one file per page
    Split {
        pdf: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "page")]
        prefix: String,
    },
}

#[derive(clap::Args)]
struct RenameArgs {
    /// Files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Destination directory (falls back to `output.dir` in the config)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Move instead of copy
    #[arg(long = "move")]
    move_files: bool,
    /// Print the plan without touching any file
    #[arg(long)]
    dry_run: bool,
    /// YYYY, YYMM, YYYYMM or YYYYMMDD
    #[arg(long)]
    date_format: Option<String>,
    /// Literal date text to use instead of today's date
    #[arg(long)]
    date: Option<String>,
    /// Naming template, e.g. "{code}_{document_type}_{date}.{extension}"
    #[arg(long)]
    template: Option<String>,
    /// Skip OCR for PDFs without a text layer
    #[arg(long)]
    no_ocr: bool,
    /// Split multi-page PDFs and rename each page
    #[arg(long)]
    split: bool,
    /// Leave unclassified and ambiguous files alone
    #[arg(long)]
    require_code: bool,
    /// Conflict policy: rename|skip|overwrite
    #[arg(long)]
    conflict: Option<String>,
    /// Files processed at once
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Output JSON
    #[arg(long)]
    json: bool,
}

fn parse_conflict(value: &str) -> Result<ConflictPolicy> {
    match value.to_ascii_lowercase().as_str() {
        "rename" => Ok(ConflictPolicy::Rename),
        "skip" => Ok(ConflictPolicy::Skip),
        "overwrite" => Ok(ConflictPolicy::Overwrite),
        other => bail!("unknown conflict policy {other:?} (expected rename|skip|overwrite)"),
    }
}

fn load_rules(cfg: &AppConfig) -> Result<Arc<RuleTable>> {
    let rules = pipeline::load_rules(cfg)?;
    tracing::info!(rules = rules.len(), "rule table loaded");
    Ok(Arc::new(rules))
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

async fn run_classify(cfg: AppConfig, paths: Vec<PathBuf>, json: bool) -> Result<()> {
    let rules = load_rules(&cfg)?;
    let files = inputs::collect_inputs(&paths, &cfg.scan)?;
    let ctx = Context::from_config(&cfg, rules, PathBuf::from("."), today())?;
    let opts = BatchOptions {
        dry_run: true,
        jobs: cfg.output.jobs.unwrap_or_else(batch::default_jobs),
        ..BatchOptions::default()
    };
    let entries = batch::run_batch(files, Arc::new(ctx), opts).await?;

    if json {
        let reports: Vec<_> = entries.iter().map(|e| &e.report).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    for entry in &entries {
        let r = &entry.report;
        match (&r.status, &r.result) {
            (FileStatus::Failed, _) | (_, None) => {
                println!("{}\tfailed\t{}", r.path.display(), r.error.as_deref().unwrap_or(""))
            }
            (FileStatus::Ambiguous, Some(res)) => println!(
                "{}\tambiguous\tscore={}\tcandidates={}",
                r.path.display(),
                res.score,
                res.candidates.join(",")
            ),
            (_, Some(res)) => match &res.matched_rule {
                Some(rule) => println!(
                    "{}\t{}\t{}\tscore={}\tkeywords={}",
                    r.path.display(),
                    rule.code,
                    rule.display_name,
                    res.score,
                    res.matched_keywords.join(",")
                ),
                None => println!("{}\tunclassified", r.path.display()),
            },
        }
    }
    Ok(())
}

async fn run_rename(mut cfg: AppConfig, args: RenameArgs) -> Result<()> {
    if let Some(f) = args.date_format {
        cfg.naming.date_format = f;
    }
    if args.date.is_some() {
        cfg.naming.custom_date = args.date;
    }
    if let Some(t) = args.template {
        cfg.naming.template = t;
    }
    if args.no_ocr {
        cfg.extraction.ocr_enabled = false;
    }
    if args.require_code {
        cfg.naming.require_code = true;
    }
    let conflict = match args.conflict.as_deref() {
        Some(c) => parse_conflict(c)?,
        None => cfg.output.conflict,
    };
    let output = match args.output.or_else(|| cfg.output.dir.as_ref().map(PathBuf::from)) {
        Some(dir) => dir,
        None => bail!("no output directory: pass --output or set output.dir"),
    };

    let rules = load_rules(&cfg)?;
    let files = inputs::collect_inputs(&args.paths, &cfg.scan)?;
    let ctx = Context::from_config(&cfg, rules, output.clone(), today())?;
    let opts = BatchOptions {
        mode: if args.move_files { TransferMode::Move } else { cfg.output.mode },
        conflict,
        dry_run: args.dry_run || cfg.output.dry_run,
        split_pdfs: args.split || cfg.output.split_pdfs,
        jobs: args.jobs.or(cfg.output.jobs).unwrap_or_else(batch::default_jobs),
    };
    if !opts.dry_run {
        std::fs::create_dir_all(&output)
            .with_context(|| format!("creating output directory {}", output.display()))?;
    }

    let entries = batch::run_batch(files, Arc::new(ctx), opts).await?;
    let summary = BatchSummary::from_entries(&entries);

    if args.json {
        let out = serde_json::json!({ "files": entries, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for entry in &entries {
            print_entry(entry);
        }
        println!(
            "Summary: total={} classified={} unclassified={} ambiguous={} failed={} executed={} skipped={} errors={}",
            summary.total,
            summary.classified,
            summary.unclassified,
            summary.ambiguous,
            summary.failed,
            summary.executed,
            summary.skipped,
            summary.apply_errors
        );
    }
    Ok(())
}

fn print_entry(entry: &BatchEntry) {
    let r = &entry.report;
    let src = r.path.display();
    let target = r
        .plan
        .as_ref()
        .map(|p| p.new_filename.clone())
        .unwrap_or_else(|| "-".into());
    match &entry.apply {
        ApplyStatus::Executed { to } => println!("{src} -> {}", to.display()),
        ApplyStatus::DryRun => println!("{src} -> {target} (dry run)"),
        ApplyStatus::Skipped { reason } => println!("{src}: skipped ({reason})"),
        ApplyStatus::Error { message } => println!("{src}: error: {message}"),
        ApplyStatus::None => println!(
            "{src}: {:?}: {}",
            r.status,
            r.error.as_deref().unwrap_or("no plan")
        ),
    }
}

fn run_rules(cfg: &AppConfig, category: Option<&str>, json: bool) -> Result<()> {
    let rules = load_rules(cfg)?;
    let selected: Vec<_> = match category {
        Some(c) => rules.by_category(c).collect(),
        None => rules.rules().iter().collect(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }
    for rule in selected {
        println!(
            "{}\t{}\t{}\tpriority={}\t{}",
            rule.code,
            rule.display_name,
            rule.category,
            rule.priority,
            rule.keywords.join(", ")
        );
    }
    Ok(())
}

fn run_categories(cfg: &AppConfig) -> Result<()> {
    let rules = load_rules(cfg)?;
    for cat in rules.categories() {
        let count = rules.by_category(&cat).count();
        match rules.category_description(&cat) {
            Some(desc) => println!("{cat}\t{count}\t{desc}"),
            None => println!("{cat}\t{count}"),
        }
    }
    Ok(())
}

fn run_split(pdf: PathBuf, output: PathBuf, prefix: &str) -> Result<()> {
    let pages = split::split_pdf(&pdf, &output, prefix)
        .with_context(|| format!("splitting {}", pdf.display()))?;
    for page in &pages {
        println!("{}", page.display());
    }
    println!("{} page(s) written", pages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_policy_parses_case_insensitively() {
        assert_eq!(parse_conflict("Skip").unwrap(), ConflictPolicy::Skip);
        assert_eq!(parse_conflict("overwrite").unwrap(), ConflictPolicy::Overwrite);
        assert!(parse_conflict("merge").is_err());
    }

    #[test]
    fn cli_parses_rename_flags() {
        let cli = Cli::parse_from([
            "docsort", "--rules", "r.toml", "rename", "a.csv", "-o", "out", "--move",
            "--conflict", "skip", "--date-format", "YYYYMM",
        ]);
        assert_eq!(cli.rules.as_deref(), Some("r.toml"));
        match cli.command {
            Commands::Rename(args) => {
                assert!(args.move_files);
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert_eq!(args.conflict.as_deref(), Some("skip"));
                assert_eq!(args.date_format.as_deref(), Some("YYYYMM"));
            }
            _ => panic!("expected rename"),
        }
    }
}
