//! Audio source handle contract and the events it pushes to the controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{MediaLoadError, TransportError};

/// Identifies one mounted source handle. Never reused within a controller.
pub type HandleId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Enough data is buffered to know the duration. `peaks` are per-bucket
    /// amplitudes in `[0, 1]` when the source analysed the audio.
    Ready { duration: f64, peaks: Option<Vec<f32>> },
    TimeUpdate(f64),
    Play,
    Pause,
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Source {
        handle: HandleId,
        /// Seek epoch at the time the event was produced.
        epoch: u64,
        event: SourceEvent,
    },
    /// One animation frame elapsed while playing.
    Frame { handle: HandleId },
}

/// Sending half handed to a source handle and its frame loop.
#[derive(Debug, Clone)]
pub struct EventSink {
    handle: HandleId,
    epoch: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EventSink {
    pub fn new(handle: HandleId, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self {
            handle,
            epoch: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Marks every event produced from now on as newer than any in flight.
    pub(crate) fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns false once the controller side is gone.
    pub fn emit(&self, event: SourceEvent) -> bool {
        self.emit_at(self.epoch(), event)
    }

    /// Emit stamped with an epoch read earlier, together with the state the
    /// event describes.
    pub fn emit_at(&self, epoch: u64, event: SourceEvent) -> bool {
        self.tx
            .send(PlayerEvent::Source {
                handle: self.handle,
                epoch,
                event,
            })
            .is_ok()
    }

    pub fn frame(&self) -> bool {
        self.tx.send(PlayerEvent::Frame { handle: self.handle }).is_ok()
    }
}

/// Transport over one remote media resource.
///
/// Commands are fire-and-forget; outcomes arrive as [`SourceEvent`]s through
/// the sink the handle was created with. `seek_to` updates the position
/// immediately. `destroy` must be idempotent and stops all further events.
pub trait AudioSource: Send {
    /// Begin fetching `url`. An `Err` means the load could not even start;
    /// later failures arrive as [`SourceEvent::Error`].
    fn load(&mut self, url: &str) -> Result<(), MediaLoadError>;
    fn play(&mut self) -> Result<(), TransportError>;
    fn pause(&mut self) -> Result<(), TransportError>;
    /// Jump to `fraction` of the duration, clamped to `[0, 1]`.
    fn seek_to(&mut self, fraction: f64) -> Result<(), TransportError>;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn destroy(&mut self);
}

/// Builds one handle per mounted track.
pub trait SourceFactory: Send {
    fn create(&mut self, sink: EventSink) -> Box<dyn AudioSource>;
}

impl<F> SourceFactory for F
where
    F: FnMut(EventSink) -> Box<dyn AudioSource> + Send,
{
    fn create(&mut self, sink: EventSink) -> Box<dyn AudioSource> {
        self(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_handle_and_current_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(3, tx);
        let clone = sink.clone();

        assert!(sink.emit(SourceEvent::TimeUpdate(1.0)));
        assert_eq!(clone.bump_epoch(), 1);
        assert!(sink.emit(SourceEvent::TimeUpdate(2.0)));
        assert!(sink.frame());

        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Source { handle: 3, epoch: 0, event: SourceEvent::TimeUpdate(1.0) }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Source { handle: 3, epoch: 1, event: SourceEvent::TimeUpdate(2.0) }
        );
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::Frame { handle: 3 });
    }

    #[test]
    fn emit_at_keeps_the_captured_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(2, tx);
        let captured = sink.epoch();
        sink.bump_epoch();

        assert!(sink.emit_at(captured, SourceEvent::Ended));
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerEvent::Source { handle: 2, epoch: 0, event: SourceEvent::Ended }
        );
    }

    #[test]
    fn emit_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        drop(rx);
        assert!(!sink.emit(SourceEvent::Play));
        assert!(!sink.frame());
    }
}
