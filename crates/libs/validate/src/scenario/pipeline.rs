//! Pipeline control surface driven by scenarios
//!
//! The concrete media pipeline lives outside this crate. Scenarios only need
//! to query its position, duration and rate, to seek it, to change its state
//! and to end its stream. Completion and termination come back as
//! [`ScenarioEvent`]s on a channel.

use bitflags::bitflags;
use std::time::Duration;

/// Pipeline playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl PipelineState {
    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Seek behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeekFlags: u32 {
        const FLUSH = 1 << 0;
        const ACCURATE = 1 << 1;
        const KEY_UNIT = 1 << 2;
        const SEGMENT = 1 << 3;
        const SKIP = 1 << 4;
        const SNAP_BEFORE = 1 << 5;
        const SNAP_AFTER = 1 << 6;
    }
}

impl SeekFlags {
    const NICKS: &'static [(&'static str, SeekFlags)] = &[
        ("flush", SeekFlags::FLUSH),
        ("accurate", SeekFlags::ACCURATE),
        ("key-unit", SeekFlags::KEY_UNIT),
        ("segment", SeekFlags::SEGMENT),
        ("skip", SeekFlags::SKIP),
        ("snap-before", SeekFlags::SNAP_BEFORE),
        ("snap-after", SeekFlags::SNAP_AFTER),
    ];

    /// Collect every flag whose nick appears in `spec`, e.g. `accurate+flush`
    pub fn from_nicks(spec: &str) -> Self {
        Self::NICKS
            .iter()
            .filter(|(nick, _)| spec.contains(*nick))
            .fold(SeekFlags::empty(), |flags, (_, flag)| flags | *flag)
    }
}

/// Unit the seek positions are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekFormat {
    Default,
    Bytes,
    #[default]
    Time,
    Buffers,
    Percent,
}

impl SeekFormat {
    pub fn from_nick(nick: &str) -> Option<Self> {
        let format = match nick.trim() {
            "default" | "undefined" => SeekFormat::Default,
            "bytes" => SeekFormat::Bytes,
            "time" => SeekFormat::Time,
            "buffers" => SeekFormat::Buffers,
            "percent" => SeekFormat::Percent,
            _ => return None,
        };
        Some(format)
    }
}

/// How a seek boundary is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeekType {
    /// Leave the boundary unchanged
    None,
    /// Absolute position
    #[default]
    Set,
    /// Relative to the end of the stream
    End,
}

impl SeekType {
    pub fn from_nick(nick: &str) -> Option<Self> {
        let seek_type = match nick.trim() {
            "none" => SeekType::None,
            "set" => SeekType::Set,
            "end" => SeekType::End,
            _ => return None,
        };
        Some(seek_type)
    }
}

/// A seek as issued to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SeekRequest {
    pub rate: f64,
    pub format: SeekFormat,
    pub flags: SeekFlags,
    pub start_type: SeekType,
    pub start: Duration,
    pub stop_type: SeekType,
    pub stop: Option<Duration>,
}

impl SeekRequest {
    /// Accurate flushing seek to `start` at normal rate
    pub fn to_position(start: Duration) -> Self {
        Self {
            rate: 1.0,
            format: SeekFormat::Time,
            flags: SeekFlags::ACCURATE | SeekFlags::FLUSH,
            start_type: SeekType::Set,
            start,
            stop_type: SeekType::None,
            stop: None,
        }
    }

    /// Position the pipeline is expected to land on once the seek completes
    pub fn expected_position(&self) -> Option<Duration> {
        if self.rate > 0.0 {
            Some(self.start)
        } else {
            self.stop
        }
    }
}

/// Errors reported synchronously by the pipeline
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Seek rejected: {0}")]
    SeekRejected(String),

    #[error("State change to {target} failed: {reason}")]
    StateChange {
        target: PipelineState,
        reason: String,
    },

    #[error("End of stream could not be sent: {0}")]
    Eos(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Pipeline under scenario control
///
/// Calls are synchronous; their asynchronous completion is signalled through
/// [`ScenarioEvent::AsyncDone`].
pub trait Pipeline: Send + Sync {
    /// Pipeline name
    fn name(&self) -> &str;

    /// Current playback position, `None` when it cannot be queried
    fn position(&self) -> Option<Duration>;

    /// Stream duration, `None` when unknown
    fn duration(&self) -> Option<Duration>;

    /// Current segment rate
    fn rate(&self) -> f64 {
        1.0
    }

    fn seek(&self, request: &SeekRequest) -> Result<(), PipelineError>;

    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError>;

    fn send_eos(&self) -> Result<(), PipelineError>;
}

/// Pipeline notifications consumed by the scenario engine
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioEvent {
    /// A state change or seek completed
    AsyncDone,
    /// End of stream reached
    Eos,
    /// The pipeline posted an error
    Error(String),
    /// The user asked to stop
    Interrupt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_flags_from_nicks() {
        assert_eq!(
            SeekFlags::from_nicks("accurate+flush"),
            SeekFlags::ACCURATE | SeekFlags::FLUSH
        );
        assert_eq!(
            SeekFlags::from_nicks("key-unit|snap-before"),
            SeekFlags::KEY_UNIT | SeekFlags::SNAP_BEFORE
        );
        assert!(SeekFlags::from_nicks("none").is_empty());
    }

    #[test]
    fn test_expected_position_follows_direction() {
        let mut request = SeekRequest::to_position(Duration::from_secs(5));
        assert_eq!(request.expected_position(), Some(Duration::from_secs(5)));

        request.rate = -1.0;
        assert_eq!(request.expected_position(), None);
        request.stop = Some(Duration::from_secs(8));
        assert_eq!(request.expected_position(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_nick_parsing() {
        assert_eq!(SeekFormat::from_nick("bytes"), Some(SeekFormat::Bytes));
        assert_eq!(SeekFormat::from_nick("frames"), None);
        assert_eq!(SeekType::from_nick("end"), Some(SeekType::End));
        assert_eq!(PipelineState::Paused.to_string(), "paused");
    }
}
