//! Console progress display built on indicatif.

use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use kboot_lib::progress::{
    ProgressCallback, ProgressCallbackArc, ProgressId, ProgressInfo, no_op_progress_callback,
};

const TICK: Duration = Duration::from_millis(100);

fn spinner_style(prefix: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(" [{prefix}] {{spinner}} {{msg}}"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Draws one spinner per running device step.
pub struct ConsoleProgress {
    lines: MultiProgress,
    active: Mutex<HashMap<ProgressId, ProgressBar>>,
    last_id: AtomicU64,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            lines: MultiProgress::new(),
            active: Mutex::new(HashMap::new()),
            last_id: AtomicU64::new(0),
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = ProgressId(self.last_id.fetch_add(1, Ordering::Relaxed) + 1);

        let bar = self
            .lines
            .add(ProgressBar::new_spinner().with_style(spinner_style(&info.prefix)));
        bar.set_message(info.message);
        bar.enable_steady_tick(TICK);

        if let Ok(mut active) = self.active.lock() {
            active.insert(id, bar);
        }
        id
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        let bar = self.active.lock().ok().and_then(|mut active| active.remove(&id));
        if let Some(bar) = bar {
            let message = format!("{} {}", bar.message(), final_message);
            bar.finish_with_message(message);
        }
    }
}

/// Spinners on a terminal, nothing when the output is redirected.
pub fn create_progress_callback() -> ProgressCallbackArc {
    if io::stdout().is_terminal() {
        Arc::new(ConsoleProgress::new())
    } else {
        no_op_progress_callback()
    }
}
