//! Heartbeat display for long remote operations
//!
//! One background thread per phase renders a once-per-second status line:
//! the phase message, the current size of the growing staging file when a
//! probe is supplied, and a dot trail that resets every 30 ticks. The
//! channel doubles as tick timer and stop signal; `stop` joins the thread
//! after its final render, so no reporter output can land after control
//! returns to the caller.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Re-reads the current size of the artifact being produced.
pub type SizeProbe = Box<dyn Fn() -> u64 + Send>;

const DOT_RESET: usize = 30;
const TICK: Duration = Duration::from_secs(1);

pub struct Reporter {
    stop_tx: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Reporter {
    pub fn start(message: &str, probe: Option<SizeProbe>) -> Reporter {
        let (stop_tx, stop_rx) = mpsc::channel();
        let message = message.to_string();
        let handle = thread::spawn(move || run(&message, probe, &stop_rx));
        Reporter { stop_tx, handle }
    }

    /// Signal the thread and wait for its final render. Purely
    /// observability: a dead reporter thread is ignored.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

fn run(message: &str, probe: Option<SizeProbe>, stop_rx: &mpsc::Receiver<()>) {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut dots = String::new();
    loop {
        let stopped = !matches!(stop_rx.recv_timeout(TICK), Err(RecvTimeoutError::Timeout));
        if stopped {
            let final_msg = match &probe {
                Some(probe) => format!("{} ({})", message, human_bytes(probe())),
                None => message.to_string(),
            };
            bar.finish_with_message(final_msg);
            return;
        }

        if dots.len() >= DOT_RESET {
            dots.clear();
        }
        dots.push('.');

        let msg = match &probe {
            Some(probe) => format!("{} ({}) {}", message, human_bytes(probe()), dots),
            None => format!("{} {}", message, dots),
        };
        bar.set_message(msg);
        bar.tick();
    }
}

pub fn human_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
