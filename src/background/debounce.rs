use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// How a wait on the [`Debouncer`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiet {
    /// This was the last call of the burst
    Trailing,
    /// A later call came in while this one was waiting
    Superseded,
}

impl Quiet {
    pub fn is_trailing(self) -> bool {
        self == Quiet::Trailing
    }
}

struct Timer {
    /// Id of the most recent call
    generation: u64,
    /// When the quiet window of the most recent call elapses
    deadline: Instant,
}

/// Trailing-edge debounce shared by every caller
///
/// Each call to [`wait_for_quiet`](Self::wait_for_quiet) pushes the single
/// shared deadline back by `delay`. All pending calls resolve together once
/// the deadline passes with no newer call, and only the newest one is told
/// it was the trailing call.
pub struct Debouncer {
    delay: Duration,
    timer: Mutex<Timer>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timer: Mutex::new(Timer {
                generation: 0,
                deadline: Instant::now(),
            }),
        }
    }

    /// Wait until no call has been made for `delay`
    pub async fn wait_for_quiet(&self) -> Quiet {
        let (ticket, mut deadline) = {
            let mut timer = self.lock();
            timer.generation += 1;
            timer.deadline = Instant::now() + self.delay;
            (timer.generation, timer.deadline)
        };

        loop {
            sleep_until(deadline).await;

            let timer = self.lock();
            if Instant::now() >= timer.deadline {
                return if timer.generation == ticket {
                    Quiet::Trailing
                } else {
                    Quiet::Superseded
                };
            }
            // Pushed back by a newer call
            deadline = timer.deadline;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Timer> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
