//! File output writes JSONL through the global subscriber
//!
//! Lives in its own test binary because a process can only install one
//! global subscriber.

use std::fs;

use twin_logging::{FileConfig, LogConfig, RotationStrategy, TwinSubscriberBuilder};

#[test]
fn test_jsonl_file_output() {
    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path().to_path_buf();
    let config = LogConfig {
        default_level: "info".to_string(),
        console: twin_logging::ConsoleConfig {
            enabled: false,
            pretty: false,
            ansi: false,
        },
        file: Some(FileConfig {
            directory: dir.clone(),
            prefix: "run".to_string(),
            rotation: RotationStrategy::Never,
            max_files: None,
        }),
        ..LogConfig::default()
    };

    // SAFETY: single-threaded at this point and no other test reads RUST_LOG
    unsafe { std::env::remove_var("RUST_LOG") };

    let guard = TwinSubscriberBuilder::new()
        .with_config(config)
        .init()
        .unwrap()
        .expect("file output returns a guard");

    tracing::info!(flow = "f1", "flow delivered");
    tracing::debug!("filtered out");
    drop(guard);

    let contents = fs::read_to_string(dir.join("run.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "flow delivered");
    assert_eq!(lines[0]["flow"], "f1");
    assert_eq!(lines[0]["level"], "INFO");

    // A second install is refused rather than panicking
    assert!(TwinSubscriberBuilder::new().init().is_err());
}
