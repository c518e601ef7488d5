pub mod config;
pub mod jobs;
pub mod launcher;
pub mod logging;
pub mod server;
