//! Terminal rendering of results, bus events and the topology

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use interceptor::{BusEvent, InteractionRecord};
use serde_json::Value;
use shared::{AgentResult, AgentRole, Status};
use std::collections::BTreeMap;
use std::time::Duration;

/// Payload keys shown in the header instead of the body
const HEADER_KEYS: &[&str] = &["formattedResponse", "originalResult"];

/// Compact text for a JSON value; strings lose their quotes
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn badge(status: Status) -> String {
    match status {
        Status::Success => style("ok").green().bold().to_string(),
        Status::Warning => style("warning").yellow().bold().to_string(),
        Status::Error => style("error").red().bold().to_string(),
    }
}

/// Human-readable form of a result
pub fn render_result(result: &AgentResult) -> String {
    let mut lines = Vec::new();

    let headline = result
        .get("formattedResponse")
        .map(plain)
        .or_else(|| result.message.clone())
        .unwrap_or_default();
    lines.push(format!("[{}] {}", badge(result.status), headline).trim_end().to_string());

    // The user agent wraps the dispatcher's result; show the inner fields.
    let data = match result.get("originalResult") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => result.data.clone(),
    };
    for (key, value) in &data {
        if HEADER_KEYS.contains(&key.as_str()) || key == "status" || key == "message" {
            continue;
        }
        lines.push(format!("  {}: {}", style(key).dim(), plain(value)));
    }
    lines.join("\n")
}

pub fn print_result(result: &AgentResult, json: bool) {
    if json {
        println!("{}", result.to_value());
    } else {
        println!("{}", render_result(result));
    }
}

/// One line per bus event
pub fn render_event(event: &BusEvent) -> String {
    match event {
        BusEvent::Interaction(message) => format!(
            "{} {} -> {} {}",
            style(&message.message_type).cyan(),
            message.source.id,
            message.target.id,
            style(truncate(&message.content, 120)).dim()
        ),
        BusEvent::Alarm {
            alarm,
            matched_rows,
        } => format!(
            "{} {} matched {} row(s), triggered {} time(s)",
            style("ALARM").red().bold(),
            alarm.id,
            matched_rows,
            alarm.trigger_count
        ),
    }
}

pub fn print_event(event: &BusEvent, json: bool) {
    if json {
        println!("{}", event.to_value());
    } else {
        println!("{}", render_event(event));
    }
}

/// One line per recorded interaction
pub fn render_record(record: &InteractionRecord) -> String {
    format!(
        "{} {} -> {} {}",
        style(record.kind.as_str()).cyan(),
        record.source,
        record.target,
        style(truncate(&record.content, 120)).dim()
    )
}

/// Spinner shown while a request is in flight; hidden in JSON mode
pub fn spinner(message: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        bar.set_style(spinner_style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Adjacency list, one source per line
pub fn render_adjacency(adjacency: &BTreeMap<AgentRole, Vec<AgentRole>>) -> String {
    adjacency
        .iter()
        .map(|(from, targets)| {
            let targets: Vec<&str> = targets.iter().map(AgentRole::agent_name).collect();
            format!("{} -> {}", style(from.agent_name()).bold(), targets.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{AlarmRecord, AlarmSpec};

    fn alarm() -> AlarmRecord {
        let mut record = AlarmRecord::from_spec(
            AlarmSpec::new("big", "SELECT * FROM whale_transactions"),
            Default::default(),
        );
        record.trigger_count = 2;
        record
    }

    // ============== Result Tests ==============

    #[test]
    fn test_render_success_lists_fields() {
        let result = AgentResult::ok("done").with("coin", "ETH").with("price", 3120.5);
        let text = console::strip_ansi_codes(&render_result(&result)).to_string();

        assert!(text.starts_with("[ok] done"));
        assert!(text.contains("coin: ETH"));
        assert!(text.contains("price: 3120.5"));
    }

    #[test]
    fn test_render_prefers_formatted_response() {
        let result = AgentResult::success()
            .with("formattedResponse", "ETH is up today.")
            .with("originalResult", json!({"status": "success", "coin": "ETH"}));
        let text = console::strip_ansi_codes(&render_result(&result)).to_string();

        assert!(text.starts_with("[ok] ETH is up today."));
        assert!(text.contains("coin: ETH"));
        assert!(!text.contains("status"));
    }

    #[test]
    fn test_render_error() {
        let result = AgentResult::error("capability unavailable: coin_info");
        let text = console::strip_ansi_codes(&render_result(&result)).to_string();
        assert_eq!(text, "[error] capability unavailable: coin_info");
    }

    // ============== Event Tests ==============

    #[test]
    fn test_render_alarm_event() {
        let event = BusEvent::Alarm {
            alarm: alarm(),
            matched_rows: 3,
        };
        let text = console::strip_ansi_codes(&render_event(&event)).to_string();
        assert_eq!(text, "ALARM big matched 3 row(s), triggered 2 time(s)");
    }

    #[test]
    fn test_render_record() {
        let record = InteractionRecord {
            source: "CentralDispatcher".to_string(),
            target: "WhaleAgent".to_string(),
            content: "{}".to_string(),
            kind: interceptor::InteractionKind::Message,
            timestamp: 0.0,
        };
        let text = console::strip_ansi_codes(&render_record(&record)).to_string();
        assert_eq!(text, "message CentralDispatcher -> WhaleAgent {}");
    }

    #[test]
    fn test_truncate_long_content() {
        let long = "x".repeat(200);
        assert_eq!(truncate(&long, 10), "xxxxxxxxxx...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_render_adjacency() {
        let mut adjacency = BTreeMap::new();
        adjacency.insert(AgentRole::Trade, vec![AgentRole::Exchange, AgentRole::Central]);
        let text = console::strip_ansi_codes(&render_adjacency(&adjacency)).to_string();

        assert_eq!(text, "TradeExecutor -> ExchangeAgent, CentralDispatcher");
    }
}
