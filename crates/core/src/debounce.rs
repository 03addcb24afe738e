//! Keystroke debouncing.
//!
//! A background task collapses a burst of inputs into its last value, which
//! is emitted once no new input has arrived for the configured window. Every
//! new input restarts the window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Default quiescence window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Input side of a debouncer.
///
/// Dropping every handle closes the input; a value still inside its window
/// is emitted when the window ends, then the output closes.
pub struct Debouncer<T> {
    input: mpsc::UnboundedSender<T>,
    window: Duration,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            window: self.window,
        }
    }
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the debounce task. Returns the input handle and the receiver of
    /// settled values.
    pub fn spawn(window: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (input, input_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(input_rx, output, window));

        (Self { input, window }, output_rx)
    }

    /// Feed a new value. Returns false if the debounce task has stopped.
    pub fn push(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

async fn run<T>(
    mut input: mpsc::UnboundedReceiver<T>,
    output: mpsc::UnboundedSender<T>,
    window: Duration,
) {
    let mut pending: Option<(T, Instant)> = None;

    loop {
        let deadline = match pending.as_ref().map(|(_, deadline)| *deadline) {
            Some(deadline) => deadline,
            None => match input.recv().await {
                Some(value) => {
                    pending = Some((value, Instant::now() + window));
                    continue;
                }
                None => break,
            },
        };

        tokio::select! {
            next = input.recv() => match next {
                Some(value) => {
                    trace!("Debounce window restarted");
                    pending = Some((value, Instant::now() + window));
                }
                None => {
                    sleep_until(deadline).await;
                    if let Some((value, _)) = pending.take() {
                        let _ = output.send(value);
                    }
                    break;
                }
            },
            _ = sleep_until(deadline) => {
                if let Some((value, _)) = pending.take() {
                    if output.send(value).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(start_paused = true)]
    async fn test_burst_emits_last_value_once() {
        let (debouncer, mut settled) = Debouncer::spawn(DEFAULT_WINDOW);
        let start = Instant::now();

        for value in ["d", "du", "dun", "dune"] {
            assert!(debouncer.push(value.to_string()));
            sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(settled.recv().await.as_deref(), Some("dune"));
        // Last input at 300ms, window of 500ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(800), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(850), "{:?}", elapsed);

        sleep(Duration::from_secs(2)).await;
        assert!(settled.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_gap_emits_each_value() {
        let (debouncer, mut settled) = Debouncer::spawn(DEFAULT_WINDOW);

        debouncer.push("alien");
        sleep(Duration::from_millis(600)).await;
        debouncer.push("heat");

        assert_eq!(settled.recv().await.as_deref(), Some("alien"));
        assert_eq!(settled.recv().await.as_deref(), Some("heat"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_emitted_inside_window() {
        let (debouncer, mut settled) = Debouncer::spawn(Duration::from_millis(300));

        debouncer.push(1u32);
        sleep(Duration::from_millis(200)).await;
        assert_err!(settled.try_recv());

        debouncer.push(2);
        sleep(Duration::from_millis(200)).await;
        assert_err!(settled.try_recv());

        sleep(Duration::from_millis(150)).await;
        assert_eq!(assert_ok!(settled.try_recv()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_value() {
        let (debouncer, mut settled) = Debouncer::spawn(DEFAULT_WINDOW);
        let start = Instant::now();

        debouncer.push("dune".to_string());
        drop(debouncer);

        assert_eq!(settled.recv().await.as_deref(), Some("dune"));
        assert!(start.elapsed() >= DEFAULT_WINDOW);
        assert_eq!(settled.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_after_output_dropped() {
        let (debouncer, settled) = Debouncer::spawn(Duration::from_millis(10));
        drop(settled);

        debouncer.push(1u8);
        sleep(Duration::from_millis(50)).await;
        assert!(!debouncer.push(2));
    }
}
