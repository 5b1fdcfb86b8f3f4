//! sentinel watch command

use super::GlobalOptions;
use crate::render::{print_event, print_result};
use crate::session::Session;
use anyhow::bail;
use clap::Args;
use interceptor::BusEvent;
use shared::NotifyChannel;
use tracing::info;

const OBSERVER_ID: &str = "cli-watch";

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Alarm to register as ID=SQL; repeatable
    #[arg(short, long = "alarm")]
    pub alarms: Vec<String>,

    /// Seconds between monitoring cycles
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Also print every agent interaction, not just alarm triggers
    #[arg(long)]
    pub interactions: bool,
}

impl WatchCommand {
    pub fn run(&self, options: &GlobalOptions) -> anyhow::Result<()> {
        let mut config = options.load_config()?;
        config.alarm_notify_channel = NotifyChannel::EventBus;
        if let Some(interval) = self.interval {
            config.monitoring_interval_seconds = interval;
        }
        config.validate()?;

        let session = Session::open(config)?;
        let mut events = session.topology().bus().add_observer(OBSERVER_ID);

        for alarm in &self.alarms {
            let Some((id, condition)) = alarm.split_once('=') else {
                bail!("alarm '{}' is not ID=SQL", alarm);
            };
            let result = session.set_alarm(id.trim(), condition.trim(), None);
            if result.is_error() {
                print_result(&result, options.json);
                bail!("could not register alarm {}", id.trim());
            }
        }
        session.start_monitoring();
        info!(
            alarms = self.alarms.len(),
            interval = session.config().monitoring_interval_seconds,
            "Watching; press Ctrl-C to stop"
        );

        while let Some(event) = events.blocking_recv() {
            if self.interactions || matches!(event, BusEvent::Alarm { .. }) {
                print_event(&event, options.json);
            }
        }
        Ok(())
    }
}
