//! Progress bars for task evaluation

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mfbench_eval::TaskKind;
use mfbench_eval::runner::{ProgressCallback, ProgressEvent, RunProgress, RunState};

const BAR_TEMPLATE: &str = "{prefix:>26.bold} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// One progress bar per task, driven by runner progress events
#[derive(Clone, Default)]
pub struct TaskProgressBars {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<TaskKind, ProgressBar>>>,
}

impl TaskProgressBars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to the orchestrator
    pub fn callback(&self) -> ProgressCallback {
        let bars = self.clone();
        Arc::new(move |update: RunProgress| bars.update(update))
    }

    fn update(&self, update: RunProgress) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };

        if let ProgressEvent::Started { resumed_from } = update.event {
            let bar = self.multi.add(ProgressBar::new(update.total as u64));
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.set_prefix(update.task.display_name());
            bar.set_position(update.processed as u64);
            if let Some(offset) = resumed_from {
                bar.set_message(format!("resumed at {}", offset));
            }
            bars.insert(update.task, bar);
            return;
        }

        let Some(bar) = bars.get(&update.task) else {
            return;
        };
        match update.event {
            ProgressEvent::ItemScored => bar.set_position(update.processed as u64),
            ProgressEvent::Checkpoint { offset } => bar.set_message(format!("checkpoint {}", offset)),
            ProgressEvent::Finished { state } => {
                let message = match state {
                    RunState::Complete => "done".to_string(),
                    other => other.to_string(),
                };
                bar.finish_with_message(message);
            }
            ProgressEvent::Started { .. } => {}
        }
    }
}
