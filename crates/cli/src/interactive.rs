//! Interactive REPL mode
//!
//! Plain input is a question for the agents; input starting with `/` is a
//! command. Alarms live as long as the session does.

use crate::render::{print_result, render_adjacency, render_record, spinner};
use crate::session::Session;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use tracing::debug;

const DEFAULT_HISTORY: usize = 10;

/// Interactive CLI over one live session
pub struct InteractiveCli {
    session: Session,
    json: bool,
}

impl InteractiveCli {
    pub fn new(session: Session, json: bool) -> Self {
        Self { session, json }
    }

    /// Run the interactive REPL
    pub fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", style("Sentinel Interactive Mode").bold());
        println!("Ask a question, or type /help for commands and /quit to exit");
        println!();

        let theme = ColorfulTheme::default();
        loop {
            let input: String = match Input::with_theme(&theme)
                .with_prompt("sentinel")
                .allow_empty(true)
                .interact_text()
            {
                Ok(line) => line,
                Err(e) => {
                    debug!(error = %e, "Input closed");
                    break;
                }
            };
            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                match self.handle_command(input) {
                    Ok(true) => break,
                    Ok(false) => continue,
                    Err(e) => {
                        println!("{} {}", style("Error:").red(), e);
                        continue;
                    }
                }
            }

            let progress = spinner("Asking the agents...", self.json);
            let result = self.session.ask(input);
            progress.finish_and_clear();
            print_result(&result, self.json);
        }

        Ok(())
    }

    /// Handle a `/command`; `Ok(true)` means exit
    fn handle_command(&mut self, input: &str) -> anyhow::Result<bool> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                return Ok(true);
            }
            "/help" | "/h" => {
                println!("Commands:");
                println!("  /request <type> [key=value ...]  - Send a typed request to central");
                println!("  /alarm set <id> <sql>            - Register an alarm (starts monitoring)");
                println!("  /alarm list                      - List alarms");
                println!("  /alarm remove <id>               - Remove an alarm");
                println!("  /alarm check                     - Run one monitoring cycle now");
                println!("  /monitor start|stop              - Control the alarm monitor");
                println!("  /history [n]                     - Show recent agent interactions");
                println!("  /topology                        - Show the agent graph");
                println!("  /json                            - Toggle raw JSON output");
                println!("  /quit                            - Exit");
            }
            "/request" => {
                let Some(request_type) = parts.get(1) else {
                    anyhow::bail!("usage: /request <type> [key=value ...]");
                };
                let params: Vec<String> = parts[2..].iter().map(|p| p.to_string()).collect();
                let result = self.session.request(request_type, &params)?;
                print_result(&result, self.json);
            }
            "/alarm" => self.handle_alarm(&parts[1..])?,
            "/monitor" => {
                let result = match parts.get(1).copied() {
                    Some("start") => self.session.start_monitoring(),
                    Some("stop") => self.session.stop_monitoring(),
                    _ => anyhow::bail!("usage: /monitor start|stop"),
                };
                print_result(&result, self.json);
            }
            "/history" => {
                let limit = match parts.get(1) {
                    Some(n) => n.parse()?,
                    None => DEFAULT_HISTORY,
                };
                for record in self.session.topology().bus().recent_messages(limit) {
                    println!("{}", render_record(&record));
                }
            }
            "/topology" => {
                println!("{}", render_adjacency(&self.session.topology().adjacency()));
            }
            "/json" => {
                self.json = !self.json;
                println!("JSON output {}", if self.json { "on" } else { "off" });
            }
            _ => {
                println!("Unknown command: {}", cmd);
            }
        }

        Ok(false)
    }

    fn handle_alarm(&self, args: &[&str]) -> anyhow::Result<()> {
        let result = match args {
            ["set", id, condition @ ..] if !condition.is_empty() => {
                self.session.set_alarm(id, &condition.join(" "), None)
            }
            ["list"] => self.session.list_alarms(),
            ["remove", id] => self.session.remove_alarm(id),
            ["check"] => {
                let report = self
                    .session
                    .check_alarms()
                    .ok_or_else(|| anyhow::anyhow!("the alarm agent is not part of this topology"))?;
                println!(
                    "triggered: {:?}  quiet: {:?}  failed: {:?}",
                    report.triggered, report.quiet, report.failed
                );
                return Ok(());
            }
            _ => anyhow::bail!("usage: /alarm set <id> <sql> | list | remove <id> | check"),
        };
        print_result(&result, self.json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::CoreConfig;

    fn cli() -> InteractiveCli {
        InteractiveCli::new(Session::open(CoreConfig::default()).unwrap(), false)
    }

    fn alarm_count(cli: &InteractiveCli) -> Option<serde_json::Value> {
        cli.session.list_alarms().get("count").cloned()
    }

    // ============== Exit Command Tests ==============

    #[test]
    fn test_handle_quit_commands() {
        let mut cli = cli();
        for command in ["/quit", "/exit", "/q"] {
            assert!(cli.handle_command(command).unwrap());
        }
    }

    #[test]
    fn test_handle_help_command() {
        let mut cli = cli();
        assert!(!cli.handle_command("/help").unwrap());
    }

    #[test]
    fn test_handle_unknown_command() {
        let mut cli = cli();
        assert!(!cli.handle_command("/unknown").unwrap());
    }

    // ============== Session Command Tests ==============

    #[test]
    fn test_json_toggle() {
        let mut cli = cli();
        cli.handle_command("/json").unwrap();
        assert!(cli.json);
        cli.handle_command("/json").unwrap();
        assert!(!cli.json);
    }

    #[test]
    fn test_alarm_commands() {
        let mut cli = cli();

        cli.handle_command("/alarm set big SELECT * FROM whale_transactions WHERE value > 10000")
            .unwrap();
        assert_eq!(alarm_count(&cli), Some(json!(1)));

        cli.handle_command("/alarm remove big").unwrap();
        assert_eq!(alarm_count(&cli), Some(json!(0)));
    }

    #[test]
    fn test_alarm_usage_errors() {
        let mut cli = cli();
        assert!(cli.handle_command("/alarm set lonely").is_err());
        assert!(cli.handle_command("/alarm frobnicate").is_err());
    }

    #[test]
    fn test_request_needs_a_type() {
        let mut cli = cli();
        assert!(cli.handle_command("/request").is_err());
        assert!(cli.handle_command("/request coin_info coin=ETH").is_ok());
    }

    #[test]
    fn test_history_limit_must_be_a_number() {
        let mut cli = cli();
        assert!(cli.handle_command("/history ten").is_err());
        assert!(cli.handle_command("/history 5").is_ok());
    }

    #[test]
    fn test_monitor_commands() {
        let mut cli = cli();
        cli.handle_command("/monitor start").unwrap();
        assert!(cli.session.topology().alarm().unwrap().monitor().is_running());

        cli.handle_command("/monitor stop").unwrap();
        assert!(!cli.session.topology().alarm().unwrap().monitor().is_running());
    }
}
