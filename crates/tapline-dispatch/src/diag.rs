//! Fault-tolerant diagnostics.
//!
//! Every error path in the engine funnels through [`report`] /
//! [`report_with`], which always emit at error level and never panic.
//! [`filter_stack`] trims a captured backtrace down to the frames that
//! belong to module code, so surfaced diagnostics point at the offending
//! module rather than engine plumbing.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tapline_core::error::DispatchError;

/// Emit one or more message lines at error level.
///
/// Lines are joined with line breaks so multi-line context stays one log
/// record.
pub fn report(lines: &[&str]) {
    tracing::error!(target: "tapline::diag", "{}", lines.join("\n"));
}

/// Emit message lines plus an inspectable payload at error level.
pub fn report_with(lines: &[&str], payload: &dyn fmt::Debug) {
    tracing::error!(target: "tapline::diag", payload = ?payload, "{}", lines.join("\n"));
}

/// Run third-party callback code with full fault isolation.
///
/// A panic is caught and converted into an error value; nothing raised by
/// the callback unwinds past this function.
pub fn isolate<T>(f: impl FnOnce() -> Result<T, DispatchError>) -> Result<T, DispatchError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(DispatchError::module(format!(
            "callback panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Extract a printable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Capture the current call stack, filtered down to module frames.
pub fn filtered_stack() -> String {
    filter_stack(&Backtrace::force_capture().to_string())
}

/// Filter a rendered backtrace so it points at module code.
///
/// Trailing frames without a recognizable `at <path>` source location
/// (host-runtime internals) are stripped first, then trailing and leading
/// frames belonging to the engine's own implementation.
pub fn filter_stack(raw: &str) -> String {
    let frames = parse_frames(raw);
    if frames.is_empty() {
        return raw.trim_end().to_string();
    }

    let mut start = 0;
    let mut end = frames.len();

    while end > start && !frames[end - 1].has_location {
        end -= 1;
    }
    while end > start && is_internal(&frames[end - 1].symbol) {
        end -= 1;
    }
    while start < end && (is_internal(&frames[start].symbol) || !frames[start].has_location) {
        start += 1;
    }

    if start >= end {
        return raw.trim_end().to_string();
    }

    frames[start..end]
        .iter()
        .flat_map(|f| f.lines.iter())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

struct Frame<'a> {
    symbol: &'a str,
    has_location: bool,
    lines: Vec<&'a str>,
}

/// Split a `std::backtrace::Backtrace` rendering into frames. A frame is a
/// `N: symbol` line plus any continuation lines (`at path:line:col`).
fn parse_frames(raw: &str) -> Vec<Frame<'_>> {
    let mut frames: Vec<Frame<'_>> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim_start();
        let is_frame_start = trimmed
            .split_once(':')
            .is_some_and(|(idx, _)| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()));

        if is_frame_start {
            let symbol = trimmed
                .split_once(':')
                .map(|(_, rest)| rest.trim())
                .unwrap_or("");
            frames.push(Frame {
                symbol,
                has_location: false,
                lines: vec![line],
            });
        } else if let Some(frame) = frames.last_mut() {
            if trimmed.starts_with("at ") {
                frame.has_location = true;
            }
            frame.lines.push(line);
        }
    }
    frames
}

fn is_internal(symbol: &str) -> bool {
    const INTERNAL_PREFIXES: &[&str] = &[
        "tapline_dispatch",
        "tapline_core",
        "std::",
        "core::",
        "alloc::",
        "rust_begin_unwind",
        "__rust",
        "backtrace",
        "<tapline_dispatch",
        "<std::",
        "<core::",
        "<alloc::",
    ];
    INTERNAL_PREFIXES.iter().any(|p| symbol.starts_with(p))
}
