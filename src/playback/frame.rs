//! Per-frame redraw loop, alive only while playing.

use std::time::Duration;
use tokio::task::JoinHandle;

use super::source::EventSink;

/// Starts recurring frame callbacks for one handle.
pub trait FrameScheduler: Send {
    fn start(&mut self, sink: EventSink) -> Box<dyn FrameTask>;
}

/// A running frame loop. Cancelling twice is harmless.
pub trait FrameTask: Send {
    fn cancel(&mut self);
}

/// Ticks on a tokio interval. Must be started inside a runtime.
#[derive(Debug, Clone)]
pub struct IntervalFrameScheduler {
    period: Duration,
}

impl IntervalFrameScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }
}

impl FrameScheduler for IntervalFrameScheduler {
    fn start(&mut self, sink: EventSink) -> Box<dyn FrameTask> {
        let period = self.period;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !sink.frame() {
                    break;
                }
            }
        });
        Box::new(IntervalFrameTask { task: Some(task) })
    }
}

struct IntervalFrameTask {
    task: Option<JoinHandle<()>>,
}

impl FrameTask for IntervalFrameTask {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for IntervalFrameTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::source::PlayerEvent;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = IntervalFrameScheduler::new(Duration::from_millis(16));
        let mut task = scheduler.start(EventSink::new(9, tx));

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(PlayerEvent::Frame { handle: 9 }));
        }
        task.cancel();
        task.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
