//! Timing instrumentation for the training pipeline
//!
//! Keeps one running aggregate per pipeline phase rather than an event log:
//! when a span guard drops, its elapsed time folds straight into that
//! phase's call count, total, and longest duration. Disabled by default;
//! while disabled a span is an inert guard and costs one atomic load.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const STEP_COUNT: usize = 5;

/// The instrumented phases of a training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStep {
    /// Forward kernel execution
    Forward,
    /// Backward traversal and gradient accumulation
    Backward,
    /// Matrix multiplication kernel
    Matmul,
    /// Transpose of a backward scratch operand
    Transpose,
    /// Tensor pool allocation
    Alloc,
}

impl TraceStep {
    /// Every step, in pipeline order.
    pub const ALL: [TraceStep; STEP_COUNT] = [
        TraceStep::Forward,
        TraceStep::Backward,
        TraceStep::Matmul,
        TraceStep::Transpose,
        TraceStep::Alloc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TraceStep::Forward => "forward",
            TraceStep::Backward => "backward",
            TraceStep::Matmul => "matmul",
            TraceStep::Transpose => "transpose",
            TraceStep::Alloc => "alloc",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Running aggregate for one step.
#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub calls: u64,
    pub total: Duration,
    pub longest: Duration,
}

impl StepStats {
    const EMPTY: StepStats = StepStats {
        calls: 0,
        total: Duration::ZERO,
        longest: Duration::ZERO,
    };

    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Accumulating tracer. Measurements fold in as they finish; nothing is
/// retained per event.
pub struct Tracer {
    enabled: AtomicBool,
    stats: Mutex<[StepStats; STEP_COUNT]>,
}

/// Global tracer instance.
pub static TRACER: Tracer = Tracer::new();

impl Tracer {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            stats: Mutex::new([StepStats::EMPTY; STEP_COUNT]),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Open a span for `step`; the measurement lands when the guard drops.
    /// A disabled tracer hands back an inert guard.
    #[must_use]
    pub fn span(&self, step: TraceStep) -> SpanGuard<'_> {
        let started = self.is_enabled().then(Instant::now);
        SpanGuard {
            tracer: self,
            step,
            started,
        }
    }

    /// Fold one measured duration into `step`'s aggregate.
    pub fn record(&self, step: TraceStep, elapsed: Duration) {
        let mut stats = self.lock_stats();
        let entry = &mut stats[step.index()];
        entry.calls += 1;
        entry.total += elapsed;
        if elapsed > entry.longest {
            entry.longest = elapsed;
        }
    }

    /// Snapshot of one step's aggregate.
    pub fn stats(&self, step: TraceStep) -> StepStats {
        self.lock_stats()[step.index()]
    }

    /// Forget everything measured so far.
    pub fn reset(&self) {
        *self.lock_stats() = [StepStats::EMPTY; STEP_COUNT];
    }

    /// One line per step that ran, in pipeline order.
    pub fn summary(&self) -> String {
        let snapshot = *self.lock_stats();
        if snapshot.iter().all(|s| s.calls == 0) {
            return "trace: nothing measured (TRACER.enable() first)".to_string();
        }

        let measured: Duration = snapshot.iter().map(|s| s.total).sum();
        let mut out = format!("trace: {measured:.2?} measured\n");
        for step in TraceStep::ALL {
            let s = snapshot[step.index()];
            if s.calls == 0 {
                continue;
            }
            let _ = writeln!(
                out,
                "  {:<9} {:>6} calls  total {:>10.2?}  mean {:>9.2?}  longest {:>9.2?}",
                step.name(),
                s.calls,
                s.total,
                s.mean(),
                s.longest
            );
        }
        out
    }

    fn lock_stats(&self) -> MutexGuard<'_, [StepStats; STEP_COUNT]> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`Tracer::span`].
pub struct SpanGuard<'a> {
    tracer: &'a Tracer,
    step: TraceStep,
    started: Option<Instant>,
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if let Some(started) = self.started.take() {
            self.tracer.record(self.step, started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tracer_hands_out_inert_guards() {
        let tracer = Tracer::new();
        {
            let _span = tracer.span(TraceStep::Matmul);
        }
        assert_eq!(tracer.stats(TraceStep::Matmul).calls, 0);
        assert!(tracer.summary().starts_with("trace: nothing measured"));
    }

    #[test]
    fn dropped_span_folds_into_the_aggregate() {
        let tracer = Tracer::new();
        tracer.enable();
        {
            let _span = tracer.span(TraceStep::Backward);
        }
        let stats = tracer.stats(TraceStep::Backward);
        assert_eq!(stats.calls, 1);
        assert!(tracer.summary().contains("backward"));
    }

    #[test]
    fn record_tracks_count_total_and_longest() {
        let tracer = Tracer::new();
        tracer.enable();
        tracer.record(TraceStep::Alloc, Duration::from_millis(2));
        tracer.record(TraceStep::Alloc, Duration::from_millis(6));

        let stats = tracer.stats(TraceStep::Alloc);
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.total, Duration::from_millis(8));
        assert_eq!(stats.longest, Duration::from_millis(6));
        assert_eq!(stats.mean(), Duration::from_millis(4));
    }

    #[test]
    fn reset_forgets_all_aggregates() {
        let tracer = Tracer::new();
        tracer.enable();
        tracer.record(TraceStep::Forward, Duration::from_millis(1));
        tracer.reset();
        assert_eq!(tracer.stats(TraceStep::Forward).calls, 0);
        assert!(tracer.summary().starts_with("trace: nothing measured"));
    }

    #[test]
    fn steps_without_calls_stay_out_of_the_summary() {
        let tracer = Tracer::new();
        tracer.enable();
        tracer.record(TraceStep::Matmul, Duration::from_millis(3));
        let summary = tracer.summary();
        assert!(summary.contains("matmul"));
        assert!(!summary.contains("transpose"));
    }
}
