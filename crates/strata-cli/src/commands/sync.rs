//! The sync command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use strata_core::config::CleanupBehavior;
use strata_core::Config;
use strata_graph::GraphClient;
use strata_intel::{SyncReport, StageOutcome, Sources};

#[derive(Args)]
pub struct SyncArgs {
    /// Pin the update tag instead of using the current unix time
    #[arg(long)]
    pub update_tag: Option<i64>,

    /// Run only the named stages (repeatable)
    #[arg(long = "select", value_name = "STAGE")]
    pub selected: Vec<String>,

    /// Directory of inventory snapshot files for the cloud sources
    #[arg(long, env = "STRATA_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<String>,

    /// Run each cleanup statement once instead of looping to convergence
    #[arg(long)]
    pub single_pass: bool,
}

impl SyncArgs {
    /// CLI flags override the file configuration.
    fn apply(&self, mut config: Config) -> Config {
        if self.update_tag.is_some() {
            config.update_tag = self.update_tag;
        }
        if !self.selected.is_empty() {
            config.requested_syncs = self.selected.clone();
        }
        if self.snapshot_dir.is_some() {
            config.snapshot_dir = self.snapshot_dir.clone();
        }
        if self.single_pass {
            config.cleanup_behavior = CleanupBehavior::SinglePass;
        }
        config
    }
}

pub async fn execute(args: SyncArgs, config: Config) -> Result<()> {
    let config = args.apply(config);

    strata_intel::validate_requested_syncs(&config)?;

    println!("{}", "Connecting to inventory graph...".bold());
    let client = GraphClient::connect(&config.graph).await?;
    let sources = Sources::from_config(&config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message("Syncing...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = strata_intel::run(&client, &config, &sources).await?;
    spinner.finish_and_clear();

    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("\n{}", "Sync report:".bold());
    for stage in &report.stages {
        match &stage.outcome {
            StageOutcome::Completed => println!(
                "  {} {} ({:.1}s)",
                "ok".green(),
                stage.name,
                stage.duration.as_secs_f64()
            ),
            StageOutcome::Skipped(reason) => {
                println!("  {} {} - {}", "--".dimmed(), stage.name.dimmed(), reason.dimmed())
            }
            StageOutcome::Failed(error) => {
                println!("  {} {} - {}", "!!".red().bold(), stage.name.red(), error)
            }
        }
    }

    if report.is_success() {
        println!("\n{}", "Sync complete.".green().bold());
    } else {
        println!(
            "\n{} failed stages: {}",
            "Sync finished with contained failures.".yellow().bold(),
            report.failed_stages().join(", ")
        );
    }
}
