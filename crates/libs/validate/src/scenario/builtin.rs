//! Built-in action types

use super::action::{Action, ActionResult};
use super::context::{ActionContext, DeferredOp};
use super::pipeline::{PipelineState, SeekFlags, SeekFormat, SeekRequest, SeekType};
use super::registry::{ActionParameter, ActionType, ActionTypeFlags};
use crate::issue::ids;
use crate::time::{format_clock_time, format_optional_clock_time, seconds_to_duration};
use crate::{Error, Result};
use std::time::Duration;

const SEEK_FLAG_NICKS: &str = "flush, accurate, key-unit, segment, skip, snap-before, snap-after";

fn execute_seek(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    let start = action
        .get_seconds("start")
        .ok_or_else(|| Error::action("seek", "'start' must be a non-negative number of seconds"))?;
    let rate = action.get_f64("rate").unwrap_or(1.0);
    let format = action
        .get_str("format")
        .and_then(SeekFormat::from_nick)
        .unwrap_or_default();
    let flags = action
        .get_str("flags")
        .map(SeekFlags::from_nicks)
        .unwrap_or(SeekFlags::ACCURATE | SeekFlags::FLUSH);
    let start_type = action
        .get_str("start_type")
        .and_then(SeekType::from_nick)
        .unwrap_or(SeekType::Set);
    let stop = action.get_seconds("stop");
    let stop_type = action
        .get_str("stop_type")
        .and_then(SeekType::from_nick)
        .unwrap_or(if stop.is_some() { SeekType::Set } else { SeekType::None });

    let request = SeekRequest {
        rate,
        format,
        flags,
        start_type,
        start,
        stop_type,
        stop,
    };

    tracing::info!(
        "Executing seek: '{}' seeking to: {} stop: {} Rate {}",
        action.name,
        format_clock_time(start),
        format_optional_clock_time(stop),
        rate
    );

    ctx.set_expected_seek_position(request.expected_position());
    match ctx.pipeline().seek(&request) {
        Ok(()) => Ok(ActionResult::Async),
        Err(e) => {
            ctx.set_expected_seek_position(None);
            ctx.report(
                ids::EVENT_SEEK_NOT_HANDLED.as_str(),
                format!(
                    "Could not execute seek: '(position {}), {} (num {}, missing repeat: 0), seeking to: {} stop: {} Rate {}': {}",
                    format_optional_clock_time(action.playback_time),
                    action.name,
                    action.sequence_number,
                    format_clock_time(start),
                    format_optional_clock_time(stop),
                    rate,
                    e
                ),
            );
            Ok(ActionResult::ErrorReported)
        }
    }
}

fn execute_pause(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    let duration = action
        .get_seconds("duration")
        .unwrap_or(Duration::ZERO);

    tracing::info!(
        "Executing pause: '{}' for {}",
        action.name,
        format_clock_time(duration)
    );

    if let Err(e) = ctx.pipeline().set_state(PipelineState::Paused) {
        ctx.report(
            ids::STATE_CHANGE_FAILURE.as_str(),
            format!("Failed to set state to paused: {}", e),
        );
        return Ok(ActionResult::ErrorReported);
    }

    if duration > Duration::ZERO {
        ctx.defer(duration, DeferredOp::SetState(PipelineState::Playing));
    }
    Ok(ActionResult::Ok)
}

fn execute_play(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    tracing::info!("Executing play: '{}'", action.name);

    if let Err(e) = ctx.pipeline().set_state(PipelineState::Playing) {
        ctx.report(
            ids::STATE_CHANGE_FAILURE.as_str(),
            format!("Failed to set state to playing: {}", e),
        );
        return Ok(ActionResult::ErrorReported);
    }
    Ok(ActionResult::Ok)
}

fn execute_eos(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    tracing::info!("Executing eos: '{}'", action.name);
    ctx.pipeline().send_eos()?;
    Ok(ActionResult::Ok)
}

fn execute_stop(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    tracing::info!("Executing stop: '{}'", action.name);

    if let Err(e) = ctx.pipeline().set_state(PipelineState::Null) {
        ctx.report(
            ids::STATE_CHANGE_FAILURE.as_str(),
            format!("Failed to set state to null: {}", e),
        );
        return Ok(ActionResult::ErrorReported);
    }
    Ok(ActionResult::Ok)
}

fn execute_set_seek_tolerance(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    let tolerance = action
        .get_f64("tolerance")
        .and_then(seconds_to_duration)
        .ok_or_else(|| {
            Error::action(
                "set-seek-tolerance",
                "'tolerance' must be a non-negative number of seconds",
            )
        })?;
    tracing::debug!("Seek tolerance set to {}", format_clock_time(tolerance));
    ctx.set_seek_tolerance(tolerance);
    Ok(ActionResult::Ok)
}

fn execute_description(ctx: &mut ActionContext<'_>, action: &Action) -> Result<ActionResult> {
    if let Some(summary) = action.get_str("summary") {
        ctx.set_description(summary);
    }
    Ok(ActionResult::Ok)
}

/// Every built-in action type
pub fn builtin_action_types() -> Vec<ActionType> {
    vec![
        ActionType::new("seek", execute_seek)
            .description("Seeks into the stream, landing within the seek tolerance of the target")
            .flags(ActionTypeFlags::ASYNC)
            .parameter(ActionParameter::mandatory(
                "start",
                "double",
                "The starting value of the seek, in seconds",
            ))
            .parameter(ActionParameter::optional(
                "rate",
                "double",
                "The rate value of the seek",
                Some("1.0"),
            ))
            .parameter(
                ActionParameter::optional("flags", "string", "The flags to use", Some("accurate+flush"))
                    .possible_variables(SEEK_FLAG_NICKS),
            )
            .parameter(
                ActionParameter::optional("format", "string", "The format of the seek", Some("time"))
                    .possible_variables("default, bytes, time, buffers, percent"),
            )
            .parameter(
                ActionParameter::optional("start_type", "string", "The type of seek start", Some("set"))
                    .possible_variables("none, set, end"),
            )
            .parameter(ActionParameter::optional(
                "stop",
                "double",
                "The stop value of the seek, in seconds",
                None,
            ))
            .parameter(
                ActionParameter::optional("stop_type", "string", "The type of seek stop", Some("set"))
                    .possible_variables("none, set, end"),
            ),
        ActionType::new("pause", execute_pause)
            .description("Sets the pipeline to paused, optionally resuming playback after a delay")
            .parameter(ActionParameter::optional(
                "duration",
                "double",
                "The duration during which the stream will be paused, in seconds",
                Some("0.0"),
            )),
        ActionType::new("play", execute_play).description("Sets the pipeline state to playing"),
        ActionType::new("eos", execute_eos).description("Sends an end-of-stream through the pipeline"),
        ActionType::new("stop", execute_stop).description("Sets the pipeline state to null"),
        ActionType::new("set-seek-tolerance", execute_set_seek_tolerance)
            .description("Sets the accepted distance between a seek target and the landing position")
            .flags(ActionTypeFlags::CONFIG)
            .parameter(ActionParameter::mandatory(
                "tolerance",
                "double",
                "The tolerance, in seconds",
            )),
        ActionType::new("description", execute_description)
            .description("Free-form metadata about the scenario")
            .flags(ActionTypeFlags::CONFIG)
            .parameter(ActionParameter::optional(
                "summary",
                "string",
                "What the scenario exercises",
                None,
            )),
    ]
}
