//! rebasekit command-line tool.
//!
//! Provides subcommands for creating the commit record store, running the
//! revert resolution pass, inspecting commit dispositions, and checking
//! versions against the downstream baseline and the upstream target.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use rebasekit_core::config::AppConfig;
use rebasekit_core::db::{CommitFilter, Database};
use rebasekit_core::models::{Disposition, REASON_REVISIT};
use rebasekit_core::resolver::Resolver;
use rebasekit_core::revert::RevertEngine;
use rebasekit_core::version::version_to_number;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rebasekit command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "rebasekit",
    version,
    about = "Track which commits survive a downstream rebase"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./rebasekit.toml")]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./rebasekit.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Drop and rebuild the commit record store.
    CreateDb {
        /// Required when a store already exists; its contents are lost.
        #[arg(long)]
        force: bool,
    },

    /// Drop commits cancelled out by a later revert.
    ResolveReverts {
        /// Print the pass report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the downstream baseline.
    Baseline,

    /// Show the upstream rebase target.
    Target,

    /// Check whether a version is already in the baseline or target.
    Included {
        /// Version to check, e.g. v5.50-rc2.
        version: String,

        /// Reference to check against.
        #[arg(long, value_enum, default_value_t = Against::Baseline)]
        against: Against,
    },

    /// Show the first upstream tag containing a commit.
    Integrated {
        /// Commit SHA.
        sha: String,
    },

    /// List commit records.
    List {
        /// Filter by disposition.
        #[arg(short, long, value_enum)]
        disposition: Option<DispositionArg>,

        /// Filter by reason, e.g. reverted, fixup/reverted, revisit.
        #[arg(short, long)]
        reason: Option<String>,

        /// Number of results.
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Show disposition counts and the processed pointer.
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Against {
    Baseline,
    Target,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DispositionArg {
    Unset,
    Pick,
    Drop,
}

impl From<DispositionArg> for Disposition {
    fn from(arg: DispositionArg) -> Self {
        match arg {
            DispositionArg::Unset => Disposition::Unset,
            DispositionArg::Pick => Disposition::Pick,
            DispositionArg::Drop => Disposition::Drop,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_init(&output)
        }
        Commands::Validate => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_validate(&cli.config)
        }
        command => {
            // Everything else needs the configuration.
            let config = load_config(&cli.config)?;
            init_tracing(
                cli.log_level
                    .as_deref()
                    .unwrap_or(&config.general.log_level),
            );

            tracing::debug!(config = %cli.config.display(), "configuration loaded");

            match command {
                Commands::CreateDb { force } => cmd_create_db(&config, force),
                Commands::ResolveReverts { json } => cmd_resolve_reverts(&config, json),
                Commands::Baseline => cmd_baseline(&config),
                Commands::Target => cmd_target(&config),
                Commands::Included { version, against } => {
                    cmd_included(&config, &version, against)
                }
                Commands::Integrated { sha } => cmd_integrated(&config, &sha),
                Commands::List {
                    disposition,
                    reason,
                    limit,
                } => cmd_list(&config, disposition, reason, limit),
                Commands::Status => cmd_status(&config),
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_validate(path).context("failed to load configuration file")
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    Database::new(&db_path).with_context(|| {
        format!(
            "failed to open record store {} (create it with `rebasekit create-db`)",
            db_path.display()
        )
    })
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# rebasekit configuration

[general]
data_dir = "database"
database = "rebase-latest.db"
log_level = "info"

[downstream]
# Local working copy of the branch being rebased.
path = "bluez-chrome"
baseline_branch = "chromeos-5.44"
branch_prefix = "chromeos"

[upstream]
# Local working copy of the tree being rebased onto.
path = "bluez-upstream"
# "latest" follows upstream's nearest tag; otherwise an explicit version.
target = "latest"
stable_branch_format = "linux-{series}.y"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point the downstream and upstream paths at your working copies");
    println!(
        "  2. Validate with: rebasekit validate --config {}",
        output.display()
    );
    println!(
        "  3. Create the record store: rebasekit create-db --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All required fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let present = |p: &Path| if p.exists() { "present" } else { "missing" };

    println!();
    println!("Configuration summary:");
    println!("  Record store    : {}", config.database_path().display());
    println!(
        "  Downstream      : {} ({})",
        config.downstream.path.display(),
        present(&config.downstream.path)
    );
    println!("  Baseline branch : {}", config.downstream.baseline_branch);
    println!(
        "  Upstream        : {} ({})",
        config.upstream.path.display(),
        present(&config.upstream.path)
    );
    println!("  Target          : {}", config.upstream.target);
    println!("  Log level       : {}", config.general.log_level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_create_db(config: &AppConfig, force: bool) -> Result<()> {
    let db_path = config.database_path();
    if db_path.exists() && !force {
        anyhow::bail!(
            "record store already exists: {}. Pass --force to discard it.",
            db_path.display()
        );
    }

    Database::recreate(&db_path).context("failed to create record store")?;
    println!(
        "{}",
        style::success(&format!("Created record store {}", db_path.display()))
    );
    Ok(())
}

fn cmd_resolve_reverts(config: &AppConfig, json: bool) -> Result<()> {
    let engine = RevertEngine::new(open_database(config)?);
    let report = engine.run().context("revert pass failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", style::header("Revert Resolution"));
    println!();
    println!("  Commits scanned   : {}", report.scanned);
    println!("  Reverts found     : {}", report.reverts_found);
    println!("  Pairs dropped     : {}", report.pairs_dropped);
    println!("  Fixups dropped    : {}", report.fixups_dropped);
    println!("  Newly flagged     : {}", report.revisits);
    println!("  Rows updated      : {}", report.updates);

    let pending = pending_reviews(engine.db())?;
    if pending > 0 {
        println!();
        println!(
            "{}",
            style::warn(&format!(
                "{} revert(s) need manual review; see `rebasekit list --reason revisit`",
                pending
            ))
        );
    }
    Ok(())
}

/// Reverts still waiting for a human decision.
fn pending_reviews(db: &Database) -> Result<usize> {
    let filter = CommitFilter {
        disposition: Some(Disposition::Pick),
        reason: Some(REASON_REVISIT.to_string()),
        limit: None,
    };
    let revisits = db
        .list_commits(&filter)
        .context("failed to list reverts awaiting review")?;
    Ok(revisits.len())
}

fn cmd_baseline(config: &AppConfig) -> Result<()> {
    let resolver = Resolver::from_config(config);

    match resolver.baseline() {
        Some(tag) => {
            println!("  Baseline        : {} ({})", tag, version_to_number(&tag));
            match resolver.baseline_series() {
                Some(series) => {
                    let series = series.trim_start_matches('v');
                    println!("  Baseline series : {}", series);
                    println!("  Downstream      : {}", config.downstream_branch(series));
                    println!("  Upstream stable : {}", config.stable_branch(series));
                    println!(
                        "  Series store    : {}",
                        config.series_database_path(series).display()
                    );
                }
                None => println!("  Baseline series : {}", style::dim("unknown")),
            }
        }
        None => {
            println!("  Baseline        : {}", style::dim("none"));
        }
    }
    Ok(())
}

fn cmd_target(config: &AppConfig) -> Result<()> {
    let resolver = Resolver::from_config(config);
    let target = resolver.target();

    println!("  Target          : {} ({})", target, version_to_number(&target));
    println!("  Target version  : {}", resolver.target_version());
    Ok(())
}

fn cmd_included(config: &AppConfig, version: &str, against: Against) -> Result<()> {
    let resolver = Resolver::from_config(config);

    let (label, reference, included) = match against {
        Against::Baseline => (
            "baseline",
            resolver.baseline().unwrap_or_else(|| "none".to_string()),
            resolver.is_in_baseline(Some(version)),
        ),
        Against::Target => (
            "target",
            resolver.target(),
            resolver.is_in_target(Some(version)),
        ),
    };

    println!(
        "  {} in {} {}: {}",
        version,
        label,
        reference,
        style::verdict(included)
    );
    Ok(())
}

fn cmd_integrated(config: &AppConfig, sha: &str) -> Result<()> {
    let resolver = Resolver::from_config(config);

    match resolver.integrated_tag(sha) {
        Some(tag) => println!("  {} first appears in {}", sha, tag),
        None => println!("  {} is not in any upstream version tag", sha),
    }
    Ok(())
}

fn cmd_list(
    config: &AppConfig,
    disposition: Option<DispositionArg>,
    reason: Option<String>,
    limit: u32,
) -> Result<()> {
    let db = open_database(config)?;
    let filter = CommitFilter {
        disposition: disposition.map(Disposition::from),
        reason,
        limit: Some(limit),
    };
    let commits = db.list_commits(&filter).context("failed to list commits")?;

    if commits.is_empty() {
        println!("No commits found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["SHA", "Committed", "Subject", "Disposition", "Reason", "Linked"]);

    for commit in &commits {
        let committed = DateTime::from_timestamp(commit.committed_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| commit.committed_at.to_string());

        table.add_row(vec![
            Cell::new(short_sha(&commit.sha)),
            Cell::new(committed),
            Cell::new(truncate(&commit.subject, 60)),
            style::disposition_cell(commit.disposition),
            Cell::new(&commit.reason),
            Cell::new(commit.linked_sha.as_deref().map(short_sha).unwrap_or("")),
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn cmd_status(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    let counts = db
        .count_by_disposition()
        .context("failed to count commits")?;
    let tip = db.get_tip().context("failed to read processed pointer")?;

    println!("{}", style::header("rebasekit Status"));
    println!();
    println!("  Record store     : {}", config.database_path().display());
    println!(
        "  Last processed   : {}",
        tip.as_deref().unwrap_or("none")
    );

    let total: i64 = counts.iter().map(|(_, n)| n).sum();
    println!("  Total commits    : {}", total);
    for (disposition, n) in &counts {
        println!("    {:<15}: {}", disposition.to_string(), n);
    }
    Ok(())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
