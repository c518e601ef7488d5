use log::LevelFilter;
use scout_logging::{initialize, scout_info, LogDestination};

#[test]
fn destination_parsing_accepts_known_names() {
    assert_eq!(LogDestination::parse("FILE"), Some(LogDestination::File));
    assert_eq!(LogDestination::parse(" terminal "), Some(LogDestination::Terminal));
    assert_eq!(LogDestination::parse("both"), Some(LogDestination::Both));
    assert_eq!(LogDestination::parse("syslog"), None);
}

#[test]
fn file_destination_creates_log_file_and_second_init_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scout-test.log");

    assert!(initialize(LogDestination::File, LevelFilter::Info, Some(&path)));
    scout_info!("hello from the logging test");
    assert!(path.exists());

    // The global logger can only be installed once per process.
    assert!(!initialize(LogDestination::Terminal, LevelFilter::Info, None));
}
