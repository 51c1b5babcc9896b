//! Migrate command - inspect and move the schema version

use aggregator_core::{Direction, MigrationReport, Version};
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Show the current and latest schema version
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply all pending migrations
    Latest {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move the schema to a specific version (0 removes everything)
    To {
        /// Target version
        version: Version,
        /// Skip confirmation prompt when downgrading
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: MigrateCommands) -> Result<()> {
    match command {
        MigrateCommands::Status { json } => run_status(json),
        MigrateCommands::Latest { json } => {
            let ctx = get_context()?;
            let report = ctx.migrate_to_latest()?;
            print_report(&report, json)
        }
        MigrateCommands::To { version, force, json } => run_to(version, force, json),
    }
}

fn run_status(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.migration_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Schema Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Current version", &status.current.to_string()]);
    table.add_row(vec!["Latest version", &status.max.to_string()]);
    table.add_row(vec!["Pending migrations", &status.pending.to_string()]);
    println!("{}", table);
    println!();

    if status.is_latest() {
        output::success("Schema is up to date");
    } else {
        output::warning(&format!(
            "{} migration(s) pending, run `aggregator migrate latest`",
            status.pending
        ));
    }

    Ok(())
}

fn run_to(version: Version, force: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.migration_status()?;

    // Downgrades drop tables and the data in them
    if version < status.current && !force {
        println!(
            "\n{}",
            format!(
                "This will roll the schema back from version {} to {}.",
                status.current, version
            )
            .yellow()
        );
        println!("{}\n", "Data in tables created by the reverted migrations will be lost.".dimmed());

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    let report = ctx.migrate_to(version)?;
    print_report(&report, json)
}

fn print_report(report: &MigrationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match report.direction {
        Direction::None => output::info(&format!("Schema already at version {}", report.to)),
        Direction::Up => output::success(&format!(
            "Migrated up from version {} to {} ({} step(s))",
            report.from, report.to, report.steps
        )),
        Direction::Down => output::success(&format!(
            "Migrated down from version {} to {} ({} step(s))",
            report.from, report.to, report.steps
        )),
    }
    Ok(())
}
