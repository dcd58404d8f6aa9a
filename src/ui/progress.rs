use crate::output::is_quiet;
use crate::ui::progress_message::ProgressMessage;
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

fn show_progress() -> bool {
    console::Term::stdout().is_term() && !is_quiet()
}

fn table_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg:<28} [{bar:30}] {pos}/{len} rows")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// One progress bar per table, driven by loader events
pub struct ProgressManager {
    mp: MultiProgress,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        if !show_progress() {
            mp.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mp_clone = mp.clone();
        let handle = thread::spawn(move || {
            let mut bars: HashMap<String, ProgressBar> = HashMap::new();
            for msg in rx {
                match msg {
                    ProgressMessage::TableStarted { table, total } => {
                        let pb = mp_clone.add(ProgressBar::new(total as u64));
                        pb.set_style(table_style());
                        pb.set_message(format!("Loading {}", table));
                        pb.enable_steady_tick(Duration::from_millis(100));
                        bars.insert(table, pb);
                    }
                    ProgressMessage::Progress { table, current } => {
                        if let Some(pb) = bars.get(&table) {
                            pb.set_position(current as u64);
                        }
                    }
                    ProgressMessage::TableFinished { table, ok } => {
                        if let Some(pb) = bars.remove(&table) {
                            if ok {
                                pb.finish_with_message(format!("{} done", table));
                            } else {
                                pb.abandon_with_message(format!("{} failed", table));
                            }
                        }
                    }
                    ProgressMessage::Error(e) => {
                        mp_clone.println(format!("{} {}", Icons::WARN, e)).ok();
                    }
                    ProgressMessage::Exit => break,
                }
            }
        });

        (
            Self {
                mp,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the event thread (it stops on `Exit` or when every sender
    /// is dropped) and clear the bars
    pub fn finish(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
        self.mp.clear().ok();
    }

    pub fn finish_with_summary(&mut self, duration: Duration, tables: usize, rows: usize) {
        self.finish();
        if is_quiet() {
            return;
        }
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}",
            Icons::FILE.style(theme().info.clone()),
            tables,
            Icons::ROWS.style(theme().info.clone()),
            rows
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if show_progress() {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message.to_string());
        Self { pb }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_drains_events_until_exit() {
        let (mut pm, tx) = ProgressManager::new();
        tx.send(ProgressMessage::TableStarted { table: "issues".into(), total: 2 }).unwrap();
        tx.send(ProgressMessage::Progress { table: "issues".into(), current: 2 }).unwrap();
        tx.send(ProgressMessage::TableFinished { table: "issues".into(), ok: true }).unwrap();
        tx.send(ProgressMessage::Exit).unwrap();
        pm.finish();
        assert!(pm.handle.is_none());
    }
}
