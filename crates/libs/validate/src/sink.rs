//! Output sink trait and implementations
//!
//! This module defines the `OutputSink` trait the runner writes rendered
//! reports to, and provides implementations for different output targets.

use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Trait for report output targets
///
/// Implementations include:
/// - `TerminalSink` - text output to stdout, stderr or a file
/// - `ChannelSink` - Broadcast channel for in-process subscribers
pub trait OutputSink: Send + Sync {
    /// Write a block of rendered text
    fn write(&self, text: &str) -> Result<(), SinkError>;

    /// Close the sink and perform any cleanup
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Error type for output sink operations
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open output '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Channel send error: {0}")]
    Channel(String),
}

/// Terminal/file text sink
///
/// Every write is flushed so that output survives a fatal abort.
pub struct TerminalSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> TerminalSink<W> {
    /// Create a new terminal sink writing to the specified output
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl TerminalSink<std::io::Stdout> {
    /// Create a terminal sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl TerminalSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl TerminalSink<File> {
    /// Create (truncating) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| SinkError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> OutputSink for TerminalSink<W> {
    fn write(&self, text: &str) -> Result<(), SinkError> {
        let mut writer = self.writer.lock();
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// Broadcast channel sink
///
/// Sends each written block to a tokio broadcast channel that can have
/// multiple subscribers. Writing with no subscriber attached is not an error.
pub struct ChannelSink {
    sender: broadcast::Sender<String>,
}

impl ChannelSink {
    /// Create a new channel sink with the specified capacity
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<String>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a new channel sink with default capacity (256)
    pub fn with_default_capacity() -> (Self, broadcast::Receiver<String>) {
        Self::new(256)
    }

    /// Subscribe to receive output from this sink
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl OutputSink for ChannelSink {
    fn write(&self, text: &str) -> Result<(), SinkError> {
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(text.to_string())
            .map_err(|e| SinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Build sinks from output names: `stdout`, `stderr` or a file path
pub fn sinks_from_outputs<S: AsRef<str>>(outputs: &[S]) -> Result<Vec<Arc<dyn OutputSink>>, SinkError> {
    outputs
        .iter()
        .map(|output| -> Result<Arc<dyn OutputSink>, SinkError> {
            match output.as_ref() {
                "stdout" => Ok(Arc::new(TerminalSink::stdout())),
                "stderr" => Ok(Arc::new(TerminalSink::stderr())),
                path => Ok(Arc::new(TerminalSink::create(path)?)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().flush()
        }
    }

    #[test]
    fn test_terminal_sink() {
        let buffer = SharedBuffer::default();
        let sink = TerminalSink::new(buffer.clone());

        sink.write("  critical : first\n").unwrap();
        sink.write("   warning : second\n").unwrap();

        let output = String::from_utf8(buffer.0.lock().get_ref().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("critical"));
        assert!(lines[1].contains("warning"));
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut receiver) = ChannelSink::with_default_capacity();

        sink.write("one").unwrap();
        sink.write("two").unwrap();

        assert_eq!(receiver.recv().await.unwrap(), "one");
        assert_eq!(receiver.recv().await.unwrap(), "two");
    }

    #[test]
    fn test_channel_sink_multiple_subscribers() {
        let (sink, mut receiver1) = ChannelSink::with_default_capacity();
        let mut receiver2 = sink.subscribe();

        assert_eq!(sink.receiver_count(), 2);

        sink.write("block").unwrap();

        tokio_test::block_on(async {
            assert_eq!(receiver1.recv().await.unwrap(), "block");
            assert_eq!(receiver2.recv().await.unwrap(), "block");
        });
    }

    #[test]
    fn test_channel_sink_without_subscribers() {
        let (sink, receiver) = ChannelSink::new(4);
        drop(receiver);
        assert!(sink.write("nobody listens").is_ok());
    }

    #[test]
    fn test_sinks_from_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validate.log");
        let outputs = vec!["stderr".to_string(), path.display().to_string()];

        let sinks = sinks_from_outputs(&outputs).unwrap();
        assert_eq!(sinks.len(), 2);
        sinks[1].write("logged\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "logged\n");

        let missing = dir.path().join("missing").join("out.log");
        assert!(matches!(
            sinks_from_outputs(&[missing.display().to_string()]),
            Err(SinkError::Open { .. })
        ));
    }
}
