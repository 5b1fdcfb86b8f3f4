//! AlarmAgent - message front end of the alarm monitor

use crate::monitor::{AlarmMonitor, MonitorOptions, StopOutcome};
use crate::registry::AlarmRegistry;
use chrono::Utc;
use shared::{
    Agent, AgentHandle, AgentResult, AgentRole, AlarmNotifier, AlarmSpec, Datastore, Envelope,
    Message, Outbox, Tap,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AlarmAgent {
    monitor: AlarmMonitor,
}

impl AlarmAgent {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        notifiers: Vec<Arc<dyn AlarmNotifier>>,
        options: MonitorOptions,
        tap: Option<Arc<dyn Tap>>,
    ) -> Self {
        let outbox = Outbox::new(AgentRole::Alarm.agent_name(), tap);
        Self {
            monitor: AlarmMonitor::new(
                Arc::new(AlarmRegistry::new()),
                datastore,
                notifiers,
                outbox,
                options,
            ),
        }
    }

    /// Wire the info distributor refreshed before each cycle
    pub fn wire_distributor(&self, distributor: &AgentHandle) -> shared::Result<()> {
        self.monitor.wire_distributor(distributor)
    }

    pub fn monitor(&self) -> &AlarmMonitor {
        &self.monitor
    }

    fn set_alarm(&self, spec: AlarmSpec) -> AgentResult {
        let record = match self.monitor.registry().insert(spec, Utc::now()) {
            Ok(record) => record,
            Err(e) => return e.into(),
        };
        info!(alarm_id = %record.id, condition = %record.condition, "Alarm set");

        if let Err(e) = self.monitor.start() {
            warn!(error = %e, "Alarm set but the monitor could not start");
        }
        AgentResult::ok(format!("alarm {} set", record.id))
            .with("alarm", &record)
            .with("monitoring", self.monitor.is_running())
    }

    fn remove_alarm(&self, id: &str) -> AgentResult {
        match self.monitor.registry().remove(id) {
            Some(_) => {
                info!(alarm_id = %id, "Alarm removed");
                AgentResult::ok(format!("alarm {} removed", id))
            }
            None => AgentResult::error(format!("alarm not found: {}", id)),
        }
    }

    fn list_alarms(&self) -> AgentResult {
        let alarms = self.monitor.registry().list();
        AgentResult::success()
            .with("count", alarms.len())
            .with("alarms", alarms)
            .with("monitoring", self.monitor.is_running())
    }

    fn start_monitoring(&self) -> AgentResult {
        match self.monitor.start() {
            Ok(true) => AgentResult::ok("alarm monitoring started"),
            Ok(false) => AgentResult::warning("alarm monitoring is already running"),
            Err(e) => e.into(),
        }
    }

    fn stop_monitoring(&self) -> AgentResult {
        match self.monitor.stop() {
            StopOutcome::Stopped => AgentResult::ok("alarm monitoring stopped"),
            StopOutcome::NotRunning => AgentResult::warning("alarm monitoring is not running"),
            StopOutcome::TimedOut => AgentResult::warning(
                "stop requested; the monitor did not exit within the timeout",
            ),
        }
    }
}

impl Agent for AlarmAgent {
    fn name(&self) -> &str {
        self.monitor.sender()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Alarm
    }

    fn receive(&self, envelope: Envelope) -> AgentResult {
        match envelope.into_message() {
            Message::SetAlarm(spec) => self.set_alarm(spec),
            Message::RemoveAlarm { id } => self.remove_alarm(&id),
            Message::ListAlarms {} => self.list_alarms(),
            Message::StartMonitoring {} => self.start_monitoring(),
            Message::StopMonitoring {} => self.stop_monitoring(),
            other => AgentResult::unsupported(other.type_name()),
        }
    }
}
