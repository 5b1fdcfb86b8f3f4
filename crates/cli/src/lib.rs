//! Sentinel CLI - terminal front end for the agent topology

pub mod commands;
pub mod interactive;
pub mod render;
pub mod session;
