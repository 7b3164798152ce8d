//! Sink Flow Tests
//!
//! Tests that verify rendered reports flow correctly from the runner through
//! sinks and channels.

use remotemedia_validate::{ids, ChannelSink, Reporter, Runner, ValidateConfig};
use std::sync::Arc;

fn runner(config: ValidateConfig) -> Arc<Runner> {
    Arc::new(Runner::new(&config).expect("runner should build"))
}

fn silent_config(details: &str) -> ValidateConfig {
    ValidateConfig {
        reporting_details: Some(details.to_string()),
        outputs: Vec::new(),
        ..Default::default()
    }
}

/// Test ChannelSink delivers each report block to a subscriber
#[tokio::test]
async fn test_channel_sink_delivery() {
    let runner = runner(silent_config("monitor"));
    let (sink, mut rx) = ChannelSink::with_default_capacity();
    runner.add_sink(Arc::new(sink));

    let reporter = Reporter::new("videodecoder", &runner);
    reporter
        .report(ids::BUFFER_BEFORE_SEGMENT.as_str(), "pts 0:00:00.040000000")
        .expect("report should be accepted");

    let block = rx.recv().await.expect("should receive block");
    let lines: Vec<&str> = block.lines().collect();
    assert_eq!(lines[0], "   warning : buffer was received before a segment");
    assert_eq!(lines[1], "             Detected on <videodecoder>");
    assert_eq!(lines[2], "             Details : pts 0:00:00.040000000");
}

/// Test blocks keep submission order through the channel
#[tokio::test]
async fn test_block_ordering() {
    let runner = runner(silent_config("monitor"));
    let (sink, mut rx) = ChannelSink::new(32);
    runner.add_sink(Arc::new(sink));

    for i in 0..10 {
        let reporter = Reporter::new(format!("pad{}", i), &runner);
        reporter
            .report(ids::BUFFER_AFTER_EOS.as_str(), format!("buffer {}", i))
            .unwrap();
    }

    for i in 0..10 {
        let block = rx.recv().await.unwrap();
        assert!(
            block.contains(&format!("Details : buffer {}", i)),
            "Expected buffer {} in {}",
            i,
            block
        );
    }
}

/// Test the summary reaches every subscriber
#[tokio::test]
async fn test_summary_to_multiple_subscribers() {
    let runner = runner(silent_config("synthetic"));
    let (sink, mut rx1) = ChannelSink::new(32);
    let mut rx2 = sink.subscribe();
    assert_eq!(sink.receiver_count(), 2);
    runner.add_sink(Arc::new(sink));

    Reporter::new("a", &runner)
        .report(ids::ERROR_ON_BUS.as_str(), "boom")
        .unwrap();
    Reporter::new("b", &runner)
        .report(ids::ERROR_ON_BUS.as_str(), "boom")
        .unwrap();
    assert_eq!(runner.print_summary(), 2);

    // Two report blocks, then the summary
    for rx in [&mut rx1, &mut rx2] {
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        let summary = rx.recv().await.unwrap();
        assert!(summary.contains("==== 2 issues found ===="));
        assert!(summary.contains("Return value set to 2"));
        assert!(summary.contains("Detected on <a, b>"));
    }
}

/// Test file outputs configured the way the environment variable lists them
#[test]
fn test_file_output_from_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("validate.log");

    let mut config = silent_config("monitor");
    config.apply_env(|key| match key {
        "REMOTEMEDIA_VALIDATE_FILE" => Some(format!("{}", path.display())),
        _ => None,
    });
    let runner = runner(config);

    Reporter::new("muxer", &runner)
        .report(ids::WRONG_BUFFER.as_str(), "unexpected buffer")?;

    let written = std::fs::read_to_string(&path)?;
    assert!(written.contains("Detected on <muxer>"));
    assert!(written.contains("Details : unexpected buffer"));
    Ok(())
}

/// Test channel sink handles a high volume of reports
#[tokio::test]
async fn test_high_volume_reports() {
    let runner = runner(silent_config("all"));
    let (sink, mut rx) = ChannelSink::new(128);
    runner.add_sink(Arc::new(sink));

    let reporter = Reporter::new("source", &runner);
    for i in 0..100 {
        let id = match i % 3 {
            0 => ids::BUFFER_AFTER_EOS,
            1 => ids::EVENT_HAS_WRONG_SEQNUM,
            _ => ids::WARNING_ON_BUS,
        };
        reporter.report(id.as_str(), format!("#{}", i)).unwrap();
    }

    let mut received_count = 0;
    for _ in 0..100 {
        rx.recv().await.unwrap();
        received_count += 1;
    }
    assert_eq!(received_count, 100, "All reports should be delivered");
    assert_eq!(runner.count_reports(), 100);
}
