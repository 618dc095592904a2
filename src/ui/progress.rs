use crate::errors::StageError;
use crate::ui::icons::{CHECK, CROSS, RUNNING, SKIP};
use crate::workflow::{Stage, StageObserver};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Terminal progress for one pipeline run, rendered via `indicatif`.
///
/// Each stage gets its own line: a spinner while the request is in flight,
/// replaced by a check, cross, or skip marker once it settles. Backend
/// stages can take minutes, so the spinner shows elapsed time.
pub struct StageProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<Stage, ProgressBar>>,
    verbose: bool,
}

impl StageProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            verbose,
        }
    }

    /// Progress that draws nothing, for `--quiet` style callers and tests.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            bars: Mutex::new(HashMap::new()),
            verbose: false,
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<Stage, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn take_bar(&self, stage: Stage) -> Option<ProgressBar> {
        self.bars().remove(&stage)
    }

    /// Print a line through the multiplexer so it does not tear a spinner.
    fn println(&self, line: String) {
        if self.multi.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }
}

impl StageObserver for StageProgress {
    fn stage_skipped(&self, stage: Stage) {
        if self.verbose {
            self.println(format!(
                "{}{} {}",
                SKIP,
                style(stage.label()).dim(),
                style("(already done)").dim()
            ));
        }
    }

    fn stage_started(&self, stage: Stage) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_message(format!("{}{}...", RUNNING, stage.label()));
        bar.enable_steady_tick(Duration::from_millis(120));
        self.bars().insert(stage, bar);
    }

    fn stage_finished(&self, stage: Stage) {
        if let Some(bar) = self.take_bar(stage) {
            bar.finish_with_message(format!("{}{}", CHECK, style(stage.label()).green()));
        }
    }

    fn stage_failed(&self, stage: Stage, error: &StageError) {
        let message = format!(
            "{}{}: {}",
            CROSS,
            style(stage.label()).red().bold(),
            error
        );
        match self.take_bar(stage) {
            Some(bar) => bar.abandon_with_message(message),
            None => self.println(message),
        }
    }
}
