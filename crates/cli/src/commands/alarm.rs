//! sentinel alarm command

use super::GlobalOptions;
use crate::render::spinner;
use clap::{Args, Subcommand};
use console::style;
use serde_json::json;
use shared::AlarmSpec;

#[derive(Debug, Args)]
pub struct AlarmCommand {
    #[command(subcommand)]
    pub command: AlarmSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AlarmSubcommand {
    /// Register an alarm and evaluate it once against fresh data
    Check {
        /// Alarm id
        id: String,
        /// SQL SELECT that returns rows when the alarm should fire
        condition: String,
        #[arg(short, long)]
        description: Option<String>,
    },
}

impl AlarmCommand {
    pub fn run(&self, options: &GlobalOptions) -> anyhow::Result<()> {
        match &self.command {
            AlarmSubcommand::Check {
                id,
                condition,
                description,
            } => {
                let session = options.open_session()?;
                let spec = AlarmSpec::new(id, condition)
                    .with_description(description.clone().unwrap_or_default());

                let progress = spinner("Checking alarm...", options.json);
                let checked = session.check_condition(spec);
                progress.finish_and_clear();
                let (record, report) = checked?;

                if options.json {
                    let summary = json!({
                        "alarm": record,
                        "refreshed": report.refreshed,
                        "triggered": report.triggered.contains(&record.id),
                        "failed": report.failed.contains(&record.id),
                    });
                    println!("{}", summary);
                } else if report.failed.contains(&record.id) {
                    println!("{} {} could not be evaluated", style("error").red().bold(), record.id);
                } else if report.triggered.contains(&record.id) {
                    println!("{} {} would trigger now", style("ALARM").red().bold(), record.id);
                } else {
                    println!("{} {} is quiet", style("ok").green().bold(), record.id);
                }
            }
        }
        Ok(())
    }
}
