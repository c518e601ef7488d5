//! Process logging for the binary.

use scout_logging::{scout_info, LogDestination, DEFAULT_LOG_FILE};

use super::config::Args;

/// Install the global logger described by `args`. Logging problems are
/// reported on stderr and never stop the server.
pub fn init(args: &Args) {
    let installed = scout_logging::initialize(args.log, args.log_level(), args.log_file.as_deref());
    if !installed {
        eprintln!("Warning: logger was not installed");
        return;
    }
    if matches!(args.log, LogDestination::File | LogDestination::Both) {
        let path = args
            .log_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        scout_info!("Logging to {}", path);
    }
}
