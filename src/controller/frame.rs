//! Display-frame tick stream
//!
//! Each frame re-arms a one-shot deadline from the moment the previous tick
//! was delivered. A stalled consumer skips frames instead of receiving a
//! burst of stale ones.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct FrameTick {
    pub seq: u64,
    pub at: Instant,
}

pub struct FramePacer;

impl FramePacer {
    pub fn period(refresh_hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1)))
    }

    /// Starts the pacer; the stream ends when `cancel` fires or the receiver drops
    pub fn spawn(refresh_hz: u32, cancel: CancellationToken) -> mpsc::Receiver<FrameTick> {
        let period = Self::period(refresh_hz);
        let (tx, rx) = mpsc::channel(1);
        info!("Frame pacer at {} Hz ({:?} per frame)", refresh_hz, period);

        tokio::spawn(async move {
            let mut seq: u64 = 0;
            let mut skipped: u64 = 0;
            loop {
                let deadline = tokio::time::Instant::now() + period;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep_until(deadline) => {}
                }

                let tick = FrameTick {
                    seq,
                    at: tokio::time::Instant::now().into_std(),
                };
                match tx.try_send(tick) {
                    Ok(()) => seq += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => skipped += 1,
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            debug!("Frame pacer stopped after {} frames ({} skipped)", seq, skipped);
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_refresh_rate() {
        assert_eq!(FramePacer::period(50), Duration::from_millis(20));
        assert_eq!(FramePacer::period(0), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_sequential_and_spaced() {
        let cancel = CancellationToken::new();
        let mut frames = FramePacer::spawn(50, cancel.clone());

        let first = frames.recv().await.unwrap();
        let second = frames.recv().await.unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert!(second.at.duration_since(first.at) >= Duration::from_millis(20));

        cancel.cancel();
        while frames.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_skips_frames() {
        let cancel = CancellationToken::new();
        let mut frames = FramePacer::spawn(100, cancel.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let buffered = frames.recv().await.unwrap();
        let next = frames.recv().await.unwrap();
        assert_eq!(buffered.seq, 0);
        assert_eq!(next.seq, 1);
        assert!(next.at.duration_since(buffered.at) >= Duration::from_millis(400));

        cancel.cancel();
    }
}
