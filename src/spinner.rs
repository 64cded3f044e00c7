//! Progress line for the job currently running, drawn on stderr.

use std::io::Write;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::consts::format_duration;

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const TICK: Duration = Duration::from_millis(100);

/// Redraws `<frame> <label> (<elapsed>)` until stopped.
pub struct Spinner {
    task: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

impl Spinner {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        let (stop, mut stopped) = oneshot::channel::<()>();
        let started = Instant::now();

        let task = tokio::spawn(async move {
            for frame in FRAMES.iter().cycle() {
                eprint!("\x1b[2K\r{} {}", frame, line(&label, started.elapsed()));
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(TICK) => {}
                    _ = &mut stopped => break,
                }
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self { task, stop }
    }

    /// Clear the line and wait for the drawing task to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

fn line(label: &str, elapsed: Duration) -> String {
    format!("{} ({})", label, format_duration(elapsed))
}
