//! Audio source backed by the backend's audio endpoint.
//!
//! The whole file is downloaded, decoded with symphonia and kept in memory.
//! Position comes from a monotonic clock rather than the output device, so
//! the source behaves the same with or without audible output.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::decoder::{self, DecodedTrack};
#[cfg(feature = "audio-output")]
use super::output::CpalOutput;
use super::source::{AudioSource, EventSink, SourceEvent, SourceFactory};
use crate::api::BackendClient;
use crate::error::{MediaLoadError, TransportError};

/// Amplitude buckets reported with `Ready`.
const PEAK_BUCKETS: usize = 512;

#[derive(Debug, Clone, Copy)]
enum PlayClock {
    Paused { at: f64 },
    Running { since: Instant, from: f64 },
}

struct Shared {
    track: Option<Arc<DecodedTrack>>,
    clock: PlayClock,
    destroyed: bool,
}

impl Shared {
    fn duration(&self) -> f64 {
        self.track.as_ref().map_or(0.0, |t| t.duration_secs())
    }

    fn position(&self) -> f64 {
        let pos = match self.clock {
            PlayClock::Paused { at } => at,
            PlayClock::Running { since, from } => from + since.elapsed().as_secs_f64(),
        };
        pos.clamp(0.0, self.duration())
    }
}

/// Creates a [`DecodedAudioSource`] per mounted track.
#[derive(Debug, Clone)]
pub struct NativeSourceFactory {
    client: BackendClient,
    update_interval: Duration,
}

impl NativeSourceFactory {
    pub fn new(client: BackendClient, update_interval: Duration) -> Self {
        Self {
            client,
            update_interval: update_interval.max(Duration::from_millis(10)),
        }
    }
}

impl SourceFactory for NativeSourceFactory {
    fn create(&mut self, sink: EventSink) -> Box<dyn AudioSource> {
        Box::new(DecodedAudioSource::new(self.client.clone(), sink, self.update_interval))
    }
}

pub struct DecodedAudioSource {
    client: BackendClient,
    sink: EventSink,
    update_interval: Duration,
    shared: Arc<Mutex<Shared>>,
    load_task: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    #[cfg(feature = "audio-output")]
    output: Option<CpalOutput>,
}

impl DecodedAudioSource {
    pub fn new(client: BackendClient, sink: EventSink, update_interval: Duration) -> Self {
        Self {
            client,
            sink,
            update_interval,
            shared: Arc::new(Mutex::new(Shared {
                track: None,
                clock: PlayClock::Paused { at: 0.0 },
                destroyed: false,
            })),
            load_task: None,
            ticker: None,
            #[cfg(feature = "audio-output")]
            output: None,
        }
    }

    fn loaded_track(&self) -> Result<Arc<DecodedTrack>, TransportError> {
        let shared = self.shared.lock();
        if shared.destroyed {
            return Err(TransportError::NoSource);
        }
        shared.track.clone().ok_or(TransportError::NoSource)
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        let shared = self.shared.clone();
        let sink = self.sink.clone();
        let period = self.update_interval;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // Epoch and position are read under one lock so a seek
                // cannot slip in between them.
                let (epoch, pos, ended) = {
                    let mut shared = shared.lock();
                    if shared.destroyed {
                        break;
                    }
                    let epoch = sink.epoch();
                    let duration = shared.duration();
                    let pos = shared.position();
                    let ended = pos >= duration;
                    if ended {
                        shared.clock = PlayClock::Paused { at: duration };
                    }
                    (epoch, pos, ended)
                };
                sink.emit_at(epoch, SourceEvent::TimeUpdate(pos));
                if ended {
                    sink.emit_at(epoch, SourceEvent::Ended);
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    #[cfg(feature = "audio-output")]
    fn output_start(&mut self, track: Arc<DecodedTrack>, from_secs: f64) {
        if self.output.is_none() {
            match CpalOutput::spawn() {
                Ok(output) => self.output = Some(output),
                Err(e) => warn!("{}", e),
            }
        }
        if let Some(output) = self.output.as_ref() {
            output.start(track, from_secs);
        }
    }

    #[cfg(not(feature = "audio-output"))]
    fn output_start(&mut self, _track: Arc<DecodedTrack>, _from_secs: f64) {}

    #[cfg(feature = "audio-output")]
    fn output_stop(&mut self) {
        if let Some(output) = self.output.as_ref() {
            output.stop();
        }
    }

    #[cfg(not(feature = "audio-output"))]
    fn output_stop(&mut self) {}
}

impl AudioSource for DecodedAudioSource {
    fn load(&mut self, url: &str) -> Result<(), MediaLoadError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| MediaLoadError::Unreachable(e.to_string()))?;

        let client = self.client.clone();
        let shared = self.shared.clone();
        let sink = self.sink.clone();
        let url = url.to_string();
        let handle = sink.handle();

        self.load_task = Some(runtime.spawn(async move {
            info!("Fetching audio for source {} from {}", handle, url);
            let result = async {
                let download = client
                    .fetch_audio(&url, |done, total| match total {
                        Some(total) => debug!("Audio download {}/{} bytes", done, total),
                        None => debug!("Audio download {} bytes", done),
                    })
                    .await
                    .map_err(|e| MediaLoadError::Unreachable(e.to_string()))?;
                let hint = decoder::format_hint(download.content_type.as_deref(), &url);
                debug!("Decoding {} bytes, format hint {:?}", download.bytes.len(), hint);
                tokio::task::spawn_blocking(move || decoder::decode(download.bytes, hint.as_deref()))
                    .await
                    .map_err(|e| MediaLoadError::Decode(e.to_string()))?
            }
            .await;

            match result {
                Ok(track) => {
                    let track = Arc::new(track);
                    let duration = track.duration_secs();
                    let peaks = track.peaks(PEAK_BUCKETS);
                    {
                        let mut shared = shared.lock();
                        if shared.destroyed {
                            return;
                        }
                        shared.track = Some(track);
                    }
                    info!("Decoded audio for source {}: {:.1}s", handle, duration);
                    sink.emit(SourceEvent::Ready {
                        duration,
                        peaks: Some(peaks),
                    });
                }
                Err(e) => {
                    if shared.lock().destroyed {
                        return;
                    }
                    warn!("Audio load failed for source {}: {}", handle, e);
                    sink.emit(SourceEvent::Error(e.to_string()));
                }
            }
        }));
        Ok(())
    }

    fn play(&mut self) -> Result<(), TransportError> {
        let track = self.loaded_track()?;
        let from = {
            let mut shared = self.shared.lock();
            let mut from = shared.position();
            if from >= shared.duration() {
                from = 0.0;
            }
            shared.clock = PlayClock::Running {
                since: Instant::now(),
                from,
            };
            from
        };
        self.start_ticker();
        self.output_start(track, from);
        self.sink.emit(SourceEvent::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        self.loaded_track()?;
        {
            let mut shared = self.shared.lock();
            let at = shared.position();
            shared.clock = PlayClock::Paused { at };
        }
        self.stop_ticker();
        self.output_stop();
        self.sink.emit(SourceEvent::Pause);
        Ok(())
    }

    fn seek_to(&mut self, fraction: f64) -> Result<(), TransportError> {
        let track = self.loaded_track()?;
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let target = fraction * track.duration_secs();
        let (running, epoch) = {
            let mut shared = self.shared.lock();
            let running = match shared.clock {
                PlayClock::Running { .. } => {
                    shared.clock = PlayClock::Running {
                        since: Instant::now(),
                        from: target,
                    };
                    true
                }
                PlayClock::Paused { .. } => {
                    shared.clock = PlayClock::Paused { at: target };
                    false
                }
            };
            // Anything the ticker read before this point is now stale.
            (running, self.sink.bump_epoch())
        };
        if running {
            self.output_start(track, target);
        }
        self.sink.emit_at(epoch, SourceEvent::TimeUpdate(target));
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.shared.lock().position()
    }

    fn duration(&self) -> f64 {
        self.shared.lock().duration()
    }

    fn destroy(&mut self) {
        {
            let mut shared = self.shared.lock();
            if shared.destroyed {
                return;
            }
            shared.destroyed = true;
            shared.track = None;
            shared.clock = PlayClock::Paused { at: 0.0 };
        }
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.stop_ticker();
        self.output_stop();
        #[cfg(feature = "audio-output")]
        {
            self.output = None;
        }
        debug!("Destroyed audio source {}", self.sink.handle());
    }
}

impl Drop for DecodedAudioSource {
    fn drop(&mut self) {
        self.destroy();
    }
}
