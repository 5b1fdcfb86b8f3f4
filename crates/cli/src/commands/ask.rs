//! sentinel ask command

use super::GlobalOptions;
use crate::render::{print_result, spinner};
use clap::Args;

#[derive(Debug, Args)]
pub struct AskCommand {
    /// Question in plain language
    #[arg(required_unless_present = "request_type")]
    pub query: Vec<String>,

    /// Send a typed request instead (coin_info, sql_query, trade_operation, ...)
    #[arg(short = 't', long = "type")]
    pub request_type: Option<String>,

    /// Request parameter as key=value; repeatable
    #[arg(short, long = "param")]
    pub params: Vec<String>,
}

impl AskCommand {
    pub fn run(&self, options: &GlobalOptions) -> anyhow::Result<()> {
        let session = options.open_session()?;

        let progress = spinner("Asking the agents...", options.json);
        let result = match &self.request_type {
            Some(request_type) => session.request(request_type, &self.params),
            None => Ok(session.ask(&self.query.join(" "))),
        };
        progress.finish_and_clear();

        print_result(&result?, options.json);
        Ok(())
    }
}
