//! Throttled progress callbacks and structured stage events.
//!
//! The bus is observed by the walker, the transformation pipeline, and the
//! formatters. Percentages are monotonically non-decreasing, always start
//! at 0 and end at 100, and intermediate updates are throttled. Callbacks
//! may be invoked from any worker thread but never concurrently with
//! themselves.

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The four pipeline stages reported on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Profile and rule resolution.
    Resolve,
    /// Directory walking.
    Walk,
    /// The transformation pipeline.
    Transform,
    /// Output formatting.
    Format,
}

impl Stage {
    /// Stable lowercase name used in event payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Walk => "walk",
            Stage::Transform => "transform",
            Stage::Format => "format",
        }
    }
}

/// A throttled progress update.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// 0..=100, monotonically non-decreasing within a run.
    pub percent: u8,
    /// Human-readable description of what is happening.
    pub message: String,
    /// Stage the update belongs to.
    pub stage: Stage,
}

/// A structured stage boundary event. Not throttled.
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// The stage began.
    Start(Stage),
    /// The stage completed.
    End(Stage),
}

type ProgressFn = dyn Fn(&ProgressEvent) + Send + Sync;
type EventFn = dyn Fn(&StageEvent) + Send + Sync;

/// The observer hub shared by every pipeline stage.
pub struct ProgressBus {
    on_progress: Option<Box<ProgressFn>>,
    on_event: Option<Box<EventFn>>,
    throttle: Duration,
    // Mutex doubles as the no-concurrent-self guarantee for callbacks.
    emit_state: Mutex<EmitState>,
    last_percent: AtomicU8,
}

struct EmitState {
    last_emit: Option<Instant>,
}

impl ProgressBus {
    /// Creates a bus with the given observers and throttle interval.
    pub fn new(
        on_progress: Option<Box<ProgressFn>>,
        on_event: Option<Box<EventFn>>,
        throttle: Duration,
    ) -> Self {
        Self {
            on_progress,
            on_event,
            throttle,
            emit_state: Mutex::new(EmitState { last_emit: None }),
            last_percent: AtomicU8::new(0),
        }
    }

    /// A bus that observes nothing. Used when the caller passed no hooks.
    pub fn disabled() -> Self {
        Self::new(None, None, Duration::from_millis(0))
    }

    /// Emits `percent=0`. Always delivered, never throttled.
    pub fn start(&self, stage: Stage, message: &str) {
        self.emit_forced(0, message, stage);
    }

    /// Emits `percent=100`. Always delivered, never throttled.
    pub fn finish(&self, stage: Stage, message: &str) {
        self.emit_forced(100, message, stage);
    }

    /// Emits an intermediate update, subject to throttling and clamped so
    /// the reported percentage never decreases.
    pub fn update(&self, percent: u8, message: &str, stage: Stage) {
        let Some(on_progress) = &self.on_progress else {
            return;
        };
        let percent = percent.min(99);
        let mut state = match self.emit_state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };
        if let Some(last) = state.last_emit {
            if last.elapsed() < self.throttle {
                return;
            }
        }
        let clamped = percent.max(self.last_percent.load(Ordering::Relaxed));
        self.last_percent.store(clamped, Ordering::Relaxed);
        state.last_emit = Some(Instant::now());
        on_progress(&ProgressEvent {
            percent: clamped,
            message: message.to_string(),
            stage,
        });
    }

    fn emit_forced(&self, percent: u8, message: &str, stage: Stage) {
        let Some(on_progress) = &self.on_progress else {
            return;
        };
        let mut state = match self.emit_state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };
        let clamped = percent.max(self.last_percent.load(Ordering::Relaxed));
        self.last_percent.store(clamped, Ordering::Relaxed);
        state.last_emit = Some(Instant::now());
        on_progress(&ProgressEvent {
            percent: clamped,
            message: message.to_string(),
            stage,
        });
    }

    /// Emits a `stage:start` event.
    pub fn stage_start(&self, stage: Stage) {
        if let Some(on_event) = &self.on_event {
            on_event(&StageEvent::Start(stage));
        }
    }

    /// Emits a `stage:end` event.
    pub fn stage_end(&self, stage: Stage) {
        if let Some(on_event) = &self.on_event {
            on_event(&StageEvent::End(stage));
        }
    }
}

/// A progress sink the CLI can hand to the bus, abstracting over the
/// rendering backend.
pub trait ProgressReporter: Send + Sync {
    /// Renders one update.
    fn report(&self, event: &ProgressEvent);
    /// Finishes and clears the display.
    fn finish(&self);
}

/// A `ProgressReporter` that does nothing; used in non-interactive runs.
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    fn report(&self, _event: &ProgressEvent) {}
    fn finish(&self) {}
}

/// An `indicatif`-backed progress bar on stderr.
#[cfg(feature = "progress")]
pub struct IndicatifProgress {
    bar: ProgressBar,
}

#[cfg(feature = "progress")]
impl IndicatifProgress {
    /// Creates a 0-100 progress bar with a default style.
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

#[cfg(feature = "progress")]
impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "progress")]
impl ProgressReporter for IndicatifProgress {
    fn report(&self, event: &ProgressEvent) {
        self.bar.set_position(event.percent as u64);
        self.bar.set_message(event.message.clone());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
