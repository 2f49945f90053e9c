//! Terminal adapters for the executor's progress and confirmation seams

use deployplan::{ConfirmCallback, PhaseName, ProgressCallback, Task};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Progress bar over every task of a plan, with one line per finished task
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_phase_start(&mut self, phase: PhaseName, tasks: usize) {
        if tasks > 0 {
            self.bar.suspend(|| ui::phase(phase, tasks));
        }
    }

    fn on_task_start(&mut self, task: &Task) {
        self.bar.set_message(task.name.clone());
    }

    fn on_task_complete(&mut self, task: &Task) {
        self.bar.inc(1);
        self.bar.suspend(|| ui::task(task));
    }

    fn on_phase_complete(&mut self, _phase: PhaseName) {}
}

/// Interactive yes/no prompt
pub struct DialoguerConfirm;

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(std::io::Error::other)
    }
}
