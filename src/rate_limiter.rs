use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};

/// Google's default per-user write quota is 100 requests / 100 s; stay under it.
pub const DEFAULT_MAX_REQUESTS: usize = 90;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100_000);
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_millis(100);

/// Snapshot of the limiter, see [`RateLimiter::usage`].
#[derive(Clone, Debug, PartialEq)]
pub struct Usage {
    pub current: usize,
    pub max: usize,
    pub percentage: f64,
    pub queue_length: usize,
    pub time_until_reset: Duration,
    pub draining: bool,
}

struct QuotaWindow {
    granted: VecDeque<Instant>,
    waiting: VecDeque<oneshot::Sender<()>>,
    draining: bool,
}

struct Inner {
    max_requests: usize,
    window: Duration,
    margin: Duration,
    state: Mutex<QuotaWindow>,
}

/// Sliding-window admission gate shared by every call a client makes.
///
/// At most `max_requests` admissions are granted inside any trailing
/// `window`, and callers are served strictly in the order they called
/// [`admit`](Self::admit). Clones share the same quota.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_margin(max_requests, window, DEFAULT_SAFETY_MARGIN)
    }

    pub fn with_margin(max_requests: usize, window: Duration, margin: Duration) -> Self {
        RateLimiter {
            inner: Arc::new(Inner {
                max_requests: max_requests.max(1),
                window,
                margin,
                state: Mutex::new(QuotaWindow {
                    granted: VecDeque::new(),
                    waiting: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Resolves once it is safe to issue one request.
    ///
    /// Must be called from within a tokio runtime: the first caller to find
    /// no drain in progress spawns one, later callers queue behind it.
    pub async fn admit(&self) {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.lock();
            state.waiting.push_back(tx);
            debug!("request queued, queue length {}", state.waiting.len());
            if !state.draining {
                state.draining = true;
                tokio::spawn(Arc::clone(&self.inner).drain());
            }
        }
        // the drain task only drops a sender after sending on it
        let _ = rx.await;
    }

    /// Forgets every recorded admission.
    ///
    /// Used after the server rejected a call with 429 despite local
    /// accounting; the caller then sleeps for the server's retry period.
    pub fn reset(&self) {
        self.inner.lock().granted.clear();
    }

    pub fn usage(&self) -> Usage {
        let now = Instant::now();
        let state = self.inner.lock();
        let live: Vec<&Instant> = state
            .granted
            .iter()
            .filter(|t| now.duration_since(**t) < self.inner.window)
            .collect();
        let time_until_reset = live
            .first()
            .map(|oldest| self.inner.window.saturating_sub(now.duration_since(**oldest)))
            .unwrap_or_default();

        Usage {
            current: live.len(),
            max: self.inner.max_requests,
            percentage: live.len() as f64 / self.inner.max_requests as f64 * 100.0,
            queue_length: state.waiting.len(),
            time_until_reset,
            draining: state.draining,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.inner.max_requests
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QuotaWindow> {
        // the queue stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let wake_at = {
                let mut state = self.lock();
                let now = Instant::now();
                while let Some(oldest) = state.granted.front() {
                    if now.duration_since(*oldest) >= self.window {
                        state.granted.pop_front();
                    } else {
                        break;
                    }
                }

                if state.waiting.is_empty() {
                    state.draining = false;
                    return;
                }

                if state.granted.len() >= self.max_requests {
                    // granted is in admission order, so front() is the oldest
                    state.granted.front().map(|oldest| *oldest + self.window + self.margin)
                } else {
                    while let Some(tx) = state.waiting.pop_front() {
                        if tx.send(()).is_ok() {
                            state.granted.push_back(Instant::now());
                            debug!(
                                "request admitted, usage {}/{}",
                                state.granted.len(),
                                self.max_requests
                            );
                            break;
                        }
                        // caller went away before its turn
                    }
                    None
                }
            };

            if let Some(deadline) = wake_at {
                debug!(
                    "quota exhausted, sleeping {:?}",
                    deadline.saturating_duration_since(Instant::now())
                );
                sleep_until(deadline).await;
            }
        }
    }
}
