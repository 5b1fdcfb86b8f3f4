//! CLI Commands

pub mod alarm;
pub mod ask;
pub mod topology;
pub mod watch;

pub use alarm::AlarmCommand;
pub use ask::AskCommand;
pub use topology::TopologyCommand;
pub use watch::WatchCommand;

use crate::session::{load_config, Session};
use shared::CoreConfig;
use std::path::PathBuf;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl GlobalOptions {
    pub fn load_config(&self) -> anyhow::Result<CoreConfig> {
        load_config(self.config.as_deref())
    }

    pub fn open_session(&self) -> anyhow::Result<Session> {
        Session::open(self.load_config()?)
    }
}
