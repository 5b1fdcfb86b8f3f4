//! sentinel topology command

use super::GlobalOptions;
use crate::render::render_adjacency;
use clap::Args;

#[derive(Debug, Args)]
pub struct TopologyCommand {}

impl TopologyCommand {
    pub fn run(&self, options: &GlobalOptions) -> anyhow::Result<()> {
        let session = options.open_session()?;
        let adjacency = session.topology().adjacency();

        if options.json {
            println!("{}", serde_json::to_string_pretty(&adjacency)?);
        } else {
            println!("{}", render_adjacency(&adjacency));
        }
        Ok(())
    }
}
