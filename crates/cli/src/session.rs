//! Session - one wired topology and the config it was built from

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use dispatch::Topology;
use monitor::CycleReport;
use serde_json::{Map, Value};
use shared::{AgentResult, AgentRole, AlarmRecord, AlarmSpec, CoreConfig, Message, Request};
use std::path::Path;

/// Config files picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILES: &[&str] = &["sentinel.yaml", "sentinel.yml", "sentinel.json"];

/// Load the config from `path`, a default file, or built-in defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CoreConfig> {
    let path = path.or_else(|| {
        DEFAULT_CONFIG_FILES
            .iter()
            .map(Path::new)
            .find(|candidate| candidate.exists())
    });

    let config = match path {
        Some(path) => CoreConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CoreConfig::default(),
    };
    Ok(config.with_env())
}

/// Parse `key=value` pairs; values that read as JSON keep their type
pub fn parse_params(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter '{}' is not key=value", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("parameter '{}' has an empty key", pair);
        }
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| Value::String(value.trim().to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

pub struct Session {
    topology: Topology,
    config: CoreConfig,
}

impl Session {
    /// Build the full topology with paper trading accounts
    pub fn open(config: CoreConfig) -> anyhow::Result<Self> {
        let topology = Topology::builder(config.clone())
            .with_paper_accounts()
            .build()
            .context("failed to wire the agent topology")?;
        Ok(Self { topology, config })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Free-text query through the user agent
    pub fn ask(&self, query: &str) -> AgentResult {
        self.topology.ask(query)
    }

    /// Typed request straight to central, skipping query parsing
    pub fn request(&self, request_type: &str, params: &[String]) -> anyhow::Result<AgentResult> {
        let parameters = parse_params(params)?;
        Ok(self.topology.request(Request::typed(request_type, parameters)))
    }

    pub fn set_alarm(&self, id: &str, condition: &str, description: Option<&str>) -> AgentResult {
        let spec = AlarmSpec::new(id, condition).with_description(description.unwrap_or_default());
        self.topology.send(AgentRole::Alarm, Message::SetAlarm(spec))
    }

    pub fn list_alarms(&self) -> AgentResult {
        self.topology.send(AgentRole::Alarm, Message::ListAlarms {})
    }

    pub fn remove_alarm(&self, id: &str) -> AgentResult {
        self.topology
            .send(AgentRole::Alarm, Message::RemoveAlarm { id: id.to_string() })
    }

    pub fn start_monitoring(&self) -> AgentResult {
        self.topology.send(AgentRole::Alarm, Message::StartMonitoring {})
    }

    pub fn stop_monitoring(&self) -> AgentResult {
        self.topology.send(AgentRole::Alarm, Message::StopMonitoring {})
    }

    /// Run one monitoring cycle in the foreground
    pub fn check_alarms(&self) -> Option<CycleReport> {
        self.topology.alarm().map(|alarm| alarm.monitor().run_cycle())
    }

    /// Register an alarm without starting the worker and check it once
    pub fn check_condition(&self, spec: AlarmSpec) -> anyhow::Result<(AlarmRecord, CycleReport)> {
        let alarm = self
            .topology
            .alarm()
            .ok_or_else(|| anyhow!("the alarm agent is not part of this topology"))?;
        let id = spec.id.clone();
        alarm.monitor().registry().insert(spec, Utc::now())?;

        let report = alarm.monitor().run_cycle();
        let record = alarm
            .monitor()
            .registry()
            .get(&id)
            .ok_or_else(|| anyhow!("alarm {} disappeared during the check", id))?;
        Ok((record, report))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.topology.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn session() -> Session {
        Session::open(CoreConfig::default()).unwrap()
    }

    // ============== Parameter Tests ==============

    #[test]
    fn test_parse_params_keeps_json_types() {
        let params = parse_params(&[
            "coin=ETH".to_string(),
            "quantity=0.5".to_string(),
            "dry=true".to_string(),
        ])
        .unwrap();

        assert_eq!(params["coin"], json!("ETH"));
        assert_eq!(params["quantity"], json!(0.5));
        assert_eq!(params["dry"], json!(true));
    }

    #[test]
    fn test_parse_params_rejects_bare_words() {
        assert!(parse_params(&["coin".to_string()]).is_err());
        assert!(parse_params(&["=ETH".to_string()]).is_err());
    }

    // ============== Config Tests ==============

    #[test]
    fn test_load_config_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "monitoringIntervalSeconds: 60\ndefaultCoin: BTC").unwrap();

        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.monitoring_interval_seconds, 60);
        assert_eq!(config.default_coin, "BTC");
    }

    #[test]
    fn test_load_config_reports_bad_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    // ============== Session Tests ==============

    #[test]
    fn test_typed_request() {
        let session = session();
        let result = session.request("coin_info", &["coin=eth".to_string()]).unwrap();

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.get("coin"), Some(&json!("ETH")));
    }

    #[test]
    fn test_alarm_round_trip() {
        let session = session();

        assert!(session
            .set_alarm("big", "SELECT * FROM whale_transactions WHERE value > 10000", None)
            .is_success());
        assert_eq!(session.list_alarms().get("count"), Some(&json!(1)));
        assert!(session.remove_alarm("big").is_success());
        assert_eq!(session.list_alarms().get("count"), Some(&json!(0)));
    }

    #[test]
    fn test_check_condition_once() {
        let session = session();
        let (record, report) = session
            .check_condition(AlarmSpec::new("big", "SELECT * FROM whale_transactions WHERE value > 10000"))
            .unwrap();

        assert_eq!(record.trigger_count, 1);
        assert_eq!(report.triggered, vec!["big"]);
        assert!(!session.topology().alarm().unwrap().monitor().is_running());
    }

    #[test]
    fn test_check_condition_rejects_bad_sql() {
        let session = session();
        assert!(session.check_condition(AlarmSpec::new("bad", "DROP TABLE coin_info")).is_err());
    }

    #[test]
    fn test_foreground_check_triggers() {
        let session = session();
        session.set_alarm("big", "SELECT * FROM whale_transactions WHERE value > 10000", None);
        session.stop_monitoring();

        let report = session.check_alarms().unwrap();

        assert!(report.refreshed);
        assert_eq!(report.triggered, vec!["big"]);
    }
}
