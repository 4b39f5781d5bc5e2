//! Terminal progress for the analysis phases.
//!
//! One bar is reused across phases. Each phase shows as `[i/n] name` while it
//! runs and closes with its wall time; the step totals and timings are kept
//! so the command can log them once the run is over.

use elastrain::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SPINNER_TICK_MS: u64 = 80;

/// Work done in one finished phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTiming {
    pub name: &'static str,
    /// Sum of the task lengths announced during the phase (bonds or atoms).
    pub steps: u64,
    pub elapsed: Duration,
}

struct PhaseTracker {
    bar: ProgressBar,
    phases: &'static [&'static str],
    current: Option<(&'static str, Instant)>,
    steps: u64,
    timings: Vec<PhaseTiming>,
}

impl PhaseTracker {
    fn label(&self, name: &str) -> String {
        match self.phases.iter().position(|phase| *phase == name) {
            Some(index) => format!("[{}/{}] {}", index + 1, self.phases.len(), name),
            None => name.to_string(),
        }
    }

    fn handle(&mut self, event: Progress) {
        match event {
            Progress::PhaseStart { name } => {
                self.current = Some((name, Instant::now()));
                self.steps = 0;
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar.set_message(self.label(name));
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.reset();
                self.bar.set_length(total_steps);
                self.bar.set_style(bar_style());
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskAdvance { steps } => self.bar.inc(steps),
            Progress::TaskFinish => {
                let length = self.bar.length().unwrap_or(0);
                self.bar.set_position(length);
                self.steps += length;
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                let Some((name, started)) = self.current.take() else {
                    return;
                };
                let elapsed = started.elapsed();
                debug!(
                    phase = name,
                    steps = self.steps,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Phase finished."
                );
                self.bar
                    .finish_with_message(format!("✓ {} ({:.2?})", self.label(name), elapsed));
                self.timings.push(PhaseTiming {
                    name,
                    steps: self.steps,
                    elapsed,
                });
            }
        }
    }
}

/// Drives an `indicatif` bar from the workflow's [`Progress`] events.
#[derive(Clone)]
pub struct PhaseProgress {
    tracker: Arc<Mutex<PhaseTracker>>,
}

impl PhaseProgress {
    /// `phases` is the workflow's phase list, used to number the bar messages.
    pub fn new(phases: &'static [&'static str], visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(0), target).with_style(spinner_style());

        Self {
            tracker: Arc::new(Mutex::new(PhaseTracker {
                bar,
                phases,
                current: None,
                steps: 0,
                timings: Vec::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let tracker = self.tracker.clone();
        Box::new(move |event: Progress| match tracker.lock() {
            Ok(mut tracker) => tracker.handle(event),
            Err(_) => warn!("Progress tracker mutex was poisoned. Cannot update progress."),
        })
    }

    /// Phases finished so far, in completion order.
    pub fn timings(&self) -> Vec<PhaseTiming> {
        self.tracker
            .lock()
            .map(|tracker| tracker.timings.clone())
            .unwrap_or_default()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<26} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastrain::workflows::elastic_strain::PHASES;
    use std::thread;

    fn message(progress: &PhaseProgress) -> String {
        progress.tracker.lock().unwrap().bar.message()
    }

    #[test]
    fn phases_are_numbered_from_the_workflow_list() {
        let progress = PhaseProgress::new(PHASES, false);
        let callback = progress.get_callback();

        callback(Progress::PhaseStart { name: PHASES[2] });
        assert_eq!(message(&progress), "[3/5] Cluster Graph");

        callback(Progress::PhaseFinish);
        assert!(message(&progress).starts_with("✓ [3/5] Cluster Graph ("));
    }

    #[test]
    fn unknown_phase_keeps_its_plain_name() {
        let progress = PhaseProgress::new(PHASES, false);
        progress.get_callback()(Progress::PhaseStart { name: "Export" });
        assert_eq!(message(&progress), "Export");
    }

    #[test]
    fn batched_advances_and_task_totals_are_tracked() {
        let progress = PhaseProgress::new(PHASES, false);
        let callback = progress.get_callback();

        callback(Progress::PhaseStart { name: PHASES[1] });
        callback(Progress::TaskStart { total_steps: 10_000 });
        callback(Progress::TaskAdvance { steps: 4096 });
        callback(Progress::TaskIncrement);
        {
            let tracker = progress.tracker.lock().unwrap();
            assert_eq!(tracker.bar.length(), Some(10_000));
            assert_eq!(tracker.bar.position(), 4097);
        }
        callback(Progress::TaskFinish);
        assert_eq!(progress.tracker.lock().unwrap().bar.position(), 10_000);
        callback(Progress::PhaseFinish);

        callback(Progress::PhaseStart { name: PHASES[0] });
        callback(Progress::PhaseFinish);

        let timings = progress.timings();
        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].name, "Bond Consistency");
        assert_eq!(timings[0].steps, 10_000);
        assert_eq!(timings[1].name, "Preparation");
        assert_eq!(timings[1].steps, 0);
    }

    #[test]
    fn stray_phase_finish_records_nothing() {
        let progress = PhaseProgress::new(PHASES, false);
        progress.get_callback()(Progress::PhaseFinish);
        assert!(progress.timings().is_empty());
    }

    #[test]
    fn callback_is_usable_from_worker_threads() {
        let progress = PhaseProgress::new(PHASES, false);
        let callback = progress.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: PHASES[3] });
            callback(Progress::TaskStart { total_steps: 2 });
            callback(Progress::TaskIncrement);
            callback(Progress::TaskFinish);
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        let timings = progress.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].name, "Deformation Fit");
        assert_eq!(timings[0].steps, 2);
    }
}
