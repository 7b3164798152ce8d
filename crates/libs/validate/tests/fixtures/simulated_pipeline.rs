//! Simulated pipeline recording every command it receives

use parking_lot::Mutex;
use remotemedia_validate::scenario::{Pipeline, PipelineError, PipelineState, SeekRequest};
use std::time::Duration;

/// Command received by the simulated pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Seek { start: Duration, rate: f64 },
    SetState(PipelineState),
    Eos,
}

/// Pipeline whose position is set by the test
///
/// A seek moves the position to the seek target plus `landing_offset`,
/// which lets tests simulate inaccurate seeks. Under a negative rate the
/// target is the seek's `stop` bound.
pub struct SimulatedPipeline {
    position: Mutex<Option<Duration>>,
    duration: Mutex<Option<Duration>>,
    rate: Mutex<f64>,
    landing_offset: Mutex<Duration>,
    fail_seek: Mutex<bool>,
    fail_eos: Mutex<bool>,
    commands: Mutex<Vec<Command>>,
}

impl Default for SimulatedPipeline {
    fn default() -> Self {
        Self {
            position: Mutex::new(Some(Duration::ZERO)),
            duration: Mutex::new(Some(Duration::from_secs(60))),
            rate: Mutex::new(1.0),
            landing_offset: Mutex::new(Duration::ZERO),
            fail_seek: Mutex::new(false),
            fail_eos: Mutex::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }
}

impl SimulatedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position_secs(&self, seconds: f64) {
        *self.position.lock() = Some(Duration::from_secs_f64(seconds));
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        *self.duration.lock() = duration;
    }

    pub fn set_rate(&self, rate: f64) {
        *self.rate.lock() = rate;
    }

    pub fn set_landing_offset(&self, offset: Duration) {
        *self.landing_offset.lock() = offset;
    }

    pub fn fail_seeks(&self) {
        *self.fail_seek.lock() = true;
    }

    pub fn fail_eos(&self) {
        *self.fail_eos.lock() = true;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }
}

impl Pipeline for SimulatedPipeline {
    fn name(&self) -> &str {
        "simulated"
    }

    fn position(&self) -> Option<Duration> {
        *self.position.lock()
    }

    fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    fn rate(&self) -> f64 {
        *self.rate.lock()
    }

    fn seek(&self, request: &SeekRequest) -> Result<(), PipelineError> {
        if *self.fail_seek.lock() {
            return Err(PipelineError::SeekRejected("not seekable".to_string()));
        }
        self.commands.lock().push(Command::Seek {
            start: request.start,
            rate: request.rate,
        });
        let target = if request.rate < 0.0 {
            request.stop.unwrap_or(request.start)
        } else {
            request.start
        };
        *self.position.lock() = Some(target + *self.landing_offset.lock());
        *self.rate.lock() = request.rate;
        Ok(())
    }

    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError> {
        self.commands.lock().push(Command::SetState(state));
        Ok(())
    }

    fn send_eos(&self) -> Result<(), PipelineError> {
        if *self.fail_eos.lock() {
            return Err(PipelineError::Eos("sink refused".to_string()));
        }
        self.commands.lock().push(Command::Eos);
        Ok(())
    }
}
