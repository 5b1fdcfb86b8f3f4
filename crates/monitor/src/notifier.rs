//! Alarm notifiers

use shared::{AlarmNotifier, AlarmRecord};
use tracing::warn;

/// Emits one structured `warn!` event per trigger
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl AlarmNotifier for LogNotifier {
    fn notify(&self, alarm: &AlarmRecord, matched_rows: i64) {
        warn!(
            alarm_id = %alarm.id,
            description = %alarm.description,
            condition = %alarm.condition,
            trigger_count = alarm.trigger_count,
            last_triggered = ?alarm.last_triggered,
            matched_rows,
            "Alarm triggered"
        );
    }
}
