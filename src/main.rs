//! Rotate PostgreSQL base backups from cron.
//!
//! `run` takes the scheduled backup (full on the configured day of month,
//! incremental otherwise) and then prunes chains that fell out of the
//! retention window. The read-only commands (`plan`, `list`) and `prune`
//! expose the same decisions for operators.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;

use pgrotate::core::chains::{partition_chains, plan_prune};
use pgrotate::core::types::is_set_name;
use pgrotate::exit_codes;
use pgrotate::io::config::{Config, ConfigError};
use pgrotate::io::executor::{BackupCommandError, PgBaseBackup};
use pgrotate::io::store;
use pgrotate::plan::{MissingManifestError, plan_backup};
use pgrotate::prune::prune_backups;
use pgrotate::run::run_backup;

#[derive(Parser)]
#[command(
    name = "pgrotate",
    version,
    about = "Rotate PostgreSQL base backups: scheduled fulls, daily incrementals, retention pruning"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take the scheduled backup, then prune expired chains.
    Run,
    /// Print the backup set the next run would create (checks the anchor
    /// manifest, executes nothing).
    Plan {
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Prune expired chains without taking a backup.
    Prune {
        /// Report what would be deleted without removing anything.
        #[arg(long)]
        dry_run: bool,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List every chain with its retention status.
    List {
        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    pgrotate::logging::init();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(classify(&err));
    }
}

/// Map an error to its exit code by the category it carries.
fn classify(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        exit_codes::CONFIG
    } else if err.downcast_ref::<MissingManifestError>().is_some() {
        exit_codes::MISSING_MANIFEST
    } else if err.downcast_ref::<BackupCommandError>().is_some() {
        exit_codes::BACKUP_FAILED
    } else {
        exit_codes::FAILURE
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let now = Local::now().naive_local();
    match cli.command {
        Command::Run => cmd_run(&config, now),
        Command::Plan { json } => cmd_plan(&config, now, json),
        Command::Prune { dry_run, json } => cmd_prune(&config, now, dry_run, json),
        Command::List { json } => cmd_list(&config, now, json),
    }
}

fn cmd_run(config: &Config, now: NaiveDateTime) -> Result<()> {
    let executor = PgBaseBackup::new(config);
    run_backup(config, &executor, now)?;
    Ok(())
}

fn cmd_plan(config: &Config, now: NaiveDateTime, json: bool) -> Result<()> {
    let target = plan_backup(config, now)?;
    if json {
        print_json(&target)
    } else {
        println!("{}", target.name);
        Ok(())
    }
}

fn cmd_prune(config: &Config, now: NaiveDateTime, dry_run: bool, json: bool) -> Result<()> {
    let outcome = prune_backups(config, now, dry_run)?;
    if json {
        return print_json(&outcome);
    }
    let verb = if dry_run { "would delete" } else { "deleted" };
    for name in &outcome.deleted {
        println!("{verb} {name}");
    }
    for name in &outcome.failed {
        println!("failed {name}");
    }
    Ok(())
}

fn cmd_list(config: &Config, now: NaiveDateTime, json: bool) -> Result<()> {
    let names = store::list_backup_sets(&config.backup_root)?.unwrap_or_default();
    let listing = build_listing(&names, now, config.retention_days);
    if json {
        return print_json(&listing);
    }
    for chain in &listing.chains {
        println!("{} [{}]", chain.full, chain.status);
        for member in chain.members.iter().skip(1) {
            println!("  {member}");
        }
    }
    if !listing.orphaned.is_empty() {
        println!("orphaned:");
        for name in &listing.orphaned {
            println!("  {name}");
        }
    }
    if !listing.foreign.is_empty() {
        println!("foreign:");
        for name in &listing.foreign {
            println!("  {name}");
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChainView {
    full: String,
    members: Vec<String>,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct Listing {
    chains: Vec<ChainView>,
    /// Entries sorting before the first full set; they belong to no chain.
    orphaned: Vec<String>,
    /// Entries that do not follow the set naming convention at all. They
    /// still occupy a place in chain intervals, so they are also listed as
    /// members above.
    foreign: Vec<String>,
}

/// Group a directory listing into chains and mark each chain's fate.
fn build_listing(names: &[String], now: NaiveDateTime, retention_days: u32) -> Listing {
    let (orphaned, chains) = partition_chains(names);
    let plan = plan_prune(names, now, retention_days);
    let expired: HashSet<&str> = plan.expired.iter().map(|chain| chain.full.as_str()).collect();
    let skipped: HashSet<&str> = plan.skipped.iter().map(String::as_str).collect();

    let total = chains.len();
    let chains = chains
        .into_iter()
        .enumerate()
        .map(|(index, chain)| {
            let status = if index + 1 == total {
                "current"
            } else if expired.contains(chain.full.as_str()) {
                "expired"
            } else if skipped.contains(chain.full.as_str()) {
                "unknown"
            } else {
                "retained"
            };
            ChainView {
                full: chain.full,
                members: chain.members,
                status,
            }
        })
        .collect();

    let mut foreign: Vec<String> = names
        .iter()
        .filter(|name| !is_set_name(name))
        .cloned()
        .collect();
    foreign.sort();

    Listing {
        chains,
        orphaned,
        foreign,
    }
}

/// Serialize `value` to pretty-printed JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("date")
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["pgrotate", "run"]);
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn parse_plan_json() {
        let cli = Cli::parse_from(["pgrotate", "plan", "--json"]);
        assert!(matches!(cli.command, Command::Plan { json: true }));
    }

    #[test]
    fn parse_prune_dry_run() {
        let cli = Cli::parse_from(["pgrotate", "prune", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Command::Prune {
                dry_run: true,
                json: false
            }
        ));
    }

    #[test]
    fn parse_list() {
        let cli = Cli::parse_from(["pgrotate", "list"]);
        assert!(matches!(cli.command, Command::List { json: false }));
    }

    #[test]
    fn listing_marks_expired_retained_and_current() {
        let names: Vec<String> = [
            "2024-01-01T00-00-00_full",
            "2024-01-02T00-00-00_incremental",
            "2024-01-10T00-00-00_full",
            "2024-01-14T00-00-00_full",
        ]
        .iter()
        .map(|name| (*name).to_string())
        .collect();

        let listing = build_listing(&names, at(2024, 1, 15), 7);
        let statuses: Vec<(&str, &str)> = listing
            .chains
            .iter()
            .map(|chain| (chain.full.as_str(), chain.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("2024-01-01T00-00-00_full", "expired"),
                ("2024-01-10T00-00-00_full", "retained"),
                ("2024-01-14T00-00-00_full", "current"),
            ]
        );
    }

    #[test]
    fn listing_calls_out_orphaned_and_foreign_entries() {
        let names: Vec<String> = [
            "2023-12-30T00-00-00_incremental",
            "2024-01-01T00-00-00_full",
            "lost+found",
        ]
        .iter()
        .map(|name| (*name).to_string())
        .collect();

        let listing = build_listing(&names, at(2024, 1, 2), 7);
        assert_eq!(listing.orphaned, vec!["2023-12-30T00-00-00_incremental"]);
        assert_eq!(listing.foreign, vec!["lost+found"]);
        // The foreign entry still occupies its interval in the chain view.
        assert_eq!(listing.chains.len(), 1);
        assert!(
            listing.chains[0]
                .members
                .contains(&"lost+found".to_string())
        );
    }

    #[test]
    fn single_ancient_chain_is_still_current() {
        let names = vec!["2000-01-01T00-00-00_full".to_string()];
        let listing = build_listing(&names, at(2024, 1, 15), 7);
        assert_eq!(listing.chains[0].status, "current");
    }
}
