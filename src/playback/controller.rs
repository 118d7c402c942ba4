//! Playback state machine for one mounted transcript.
//!
//! The controller owns at most one [`AudioSource`] at a time together with
//! the frame loop driving the waveform. Commands come from the user, events
//! come back from the handle through the channel the controller was built
//! with. Everything runs on a single task; nothing here locks.

use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::frame::{FrameScheduler, FrameTask};
use super::source::{AudioSource, EventSink, HandleId, PlayerEvent, SourceEvent, SourceFactory};
use super::state::{PlaybackState, PlaybackStatus, PlayerSnapshot};
use super::waveform::{ContainerDimensions, WaveformFrame, WaveformRenderer};
use crate::config::AppConfig;
use crate::error::TransportError;
use crate::listing::format_clock;

struct Mounted {
    sink: EventSink,
    source: Box<dyn AudioSource>,
    frames: Option<Box<dyn FrameTask>>,
}

pub struct PlaybackController {
    factory: Box<dyn SourceFactory>,
    scheduler: Box<dyn FrameScheduler>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    state: PlaybackState,
    renderer: WaveformRenderer,
    seek_step: f64,
    next_handle: HandleId,
    mounted: Option<Mounted>,
}

impl PlaybackController {
    pub fn new(
        factory: Box<dyn SourceFactory>,
        scheduler: Box<dyn FrameScheduler>,
        events: mpsc::UnboundedSender<PlayerEvent>,
        config: &AppConfig,
    ) -> Self {
        Self {
            factory,
            scheduler,
            events,
            state: PlaybackState::default(),
            renderer: WaveformRenderer::new(config.waveform.clone()),
            seek_step: config.seek_step_secs.max(0.0),
            next_handle: 0,
            mounted: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn waveform(&self) -> &WaveformFrame {
        self.renderer.frame()
    }

    /// Id of the mounted handle, if any.
    pub fn handle_id(&self) -> Option<HandleId> {
        self.mounted.as_ref().map(|m| m.sink.handle())
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = &self.state;
        PlayerSnapshot {
            status: state.status().clone(),
            is_playing: state.is_playing(),
            is_loading: state.is_loading(),
            controls_enabled: state.controls_enabled(),
            position_secs: state.position_secs(),
            duration_secs: state.duration_secs(),
            position_label: format_clock(state.position_secs()),
            duration_label: format_clock(state.duration_secs()),
            progress: state.progress(),
            source_url: state.source_url().map(str::to_string),
            waveform: self.renderer.frame().clone(),
        }
    }

    /// Attach a new handle for `url`. Any previous handle is torn down first.
    pub fn mount(&mut self, url: &str) {
        self.unmount();

        self.next_handle += 1;
        let sink = EventSink::new(self.next_handle, self.events.clone());
        let mut source = self.factory.create(sink.clone());
        info!("Mounting audio source {} for {}", sink.handle(), url);

        self.state.begin(url.to_string());
        self.renderer.reset(url);
        let loaded = source.load(url);
        self.mounted = Some(Mounted {
            sink,
            source,
            frames: None,
        });

        if let Err(e) = loaded {
            self.fail(e.to_string());
        }
    }

    /// Cancel the frame loop, destroy the handle, then detach its events.
    pub fn unmount(&mut self) {
        if let Some(mut mounted) = self.mounted.take() {
            if let Some(mut frames) = mounted.frames.take() {
                frames.cancel();
            }
            mounted.source.destroy();
            info!("Unmounted audio source {}", mounted.sink.handle());
        }
        self.state.reset();
        self.renderer.clear();
    }

    pub fn play(&mut self) -> Result<(), TransportError> {
        let status = self.state.status().clone();
        if !status.can_play() {
            return Err(self.reject("play"));
        }
        let at_end = status == PlaybackStatus::Ended && self.state.position_secs() >= self.state.duration_secs();
        let mounted = self.mounted.as_mut().ok_or(TransportError::NoSource)?;

        let started = if at_end {
            mounted.sink.bump_epoch();
            mounted.source.seek_to(0.0).and_then(|_| mounted.source.play())
        } else {
            mounted.source.play()
        };
        if let Err(e) = started {
            self.fail(e.to_string());
            return Err(e);
        }
        if at_end {
            self.state.set_position(0.0);
            self.renderer.set_progress(0.0);
        }
        self.enter_playing();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TransportError> {
        if *self.state.status() != PlaybackStatus::Playing {
            return Err(self.reject("pause"));
        }
        let mounted = self.mounted.as_mut().ok_or(TransportError::NoSource)?;
        if let Err(e) = mounted.source.pause() {
            self.fail(e.to_string());
            return Err(e);
        }
        self.leave_playing(PlaybackStatus::Paused);
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<(), TransportError> {
        if self.state.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Jump to `fraction` of the track. The position updates immediately and
    /// wins over any time update already in flight.
    pub fn seek_fraction(&mut self, fraction: f64) -> Result<(), TransportError> {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.seek(fraction, fraction * self.state.duration_secs())
    }

    /// Seek from a click at `x` on a bar `width` pixels wide.
    pub fn seek_click(&mut self, x: f64, width: f64) -> Result<(), TransportError> {
        if !(width > 0.0) {
            return Err(self.reject("seek"));
        }
        self.seek_fraction(x / width)
    }

    /// Seek from a click at `x` on the waveform container.
    pub fn waveform_click(&mut self, x: f64) -> Result<(), TransportError> {
        let fraction = self.renderer.fraction_at(x);
        self.seek_fraction(fraction)
    }

    pub fn rewind(&mut self) -> Result<(), TransportError> {
        let target = (self.state.position_secs() - self.seek_step).max(0.0);
        self.seek_secs(target)
    }

    pub fn forward(&mut self) -> Result<(), TransportError> {
        let target = (self.state.position_secs() + self.seek_step).min(self.state.duration_secs());
        self.seek_secs(target)
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.renderer.render(ContainerDimensions { width, height });
        self.renderer.set_progress(self.state.progress());
    }

    pub fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Frame { handle } => {
                if self.handle_id() != Some(handle) || !self.state.is_playing() {
                    return;
                }
                if let Some(mounted) = self.mounted.as_ref() {
                    let now = mounted.source.current_time();
                    self.state.set_position(now);
                    self.renderer.set_progress(self.state.progress());
                }
            }
            PlayerEvent::Source { handle, epoch, event } => {
                let current_epoch = match self.mounted.as_ref() {
                    Some(mounted) if mounted.sink.handle() == handle => mounted.sink.epoch(),
                    _ => {
                        debug!("Dropping {:?} from detached source {}", event, handle);
                        return;
                    }
                };
                self.apply(epoch, current_epoch, event);
            }
        }
    }

    fn apply(&mut self, epoch: u64, current_epoch: u64, event: SourceEvent) {
        let status = self.state.status().clone();
        match event {
            SourceEvent::Ready { duration, peaks } => {
                if status != PlaybackStatus::Loading {
                    debug!("Ignoring ready while {}", status);
                    return;
                }
                info!("Audio ready, {:.1}s", duration);
                self.state.set_duration(duration);
                self.state.set_status(PlaybackStatus::Ready);
                self.renderer.set_peaks(peaks);
                self.renderer.set_progress(self.state.progress());
            }
            SourceEvent::TimeUpdate(secs) => {
                if epoch < current_epoch {
                    debug!("Dropping stale time update {:.2}s (epoch {} < {})", secs, epoch, current_epoch);
                    return;
                }
                if status.has_position() {
                    self.state.set_position(secs);
                    self.renderer.set_progress(self.state.progress());
                }
            }
            SourceEvent::Play => {
                if status.can_play() {
                    self.enter_playing();
                }
            }
            SourceEvent::Pause => {
                if status == PlaybackStatus::Playing {
                    self.leave_playing(PlaybackStatus::Paused);
                }
            }
            SourceEvent::Ended => {
                if epoch < current_epoch {
                    debug!("Dropping stale end of track (epoch {} < {})", epoch, current_epoch);
                    return;
                }
                if status == PlaybackStatus::Playing {
                    self.state.set_position(self.state.duration_secs());
                    self.renderer.set_progress(1.0);
                    self.leave_playing(PlaybackStatus::Ended);
                }
            }
            SourceEvent::Error(reason) => self.fail(reason),
        }
    }

    fn seek_secs(&mut self, secs: f64) -> Result<(), TransportError> {
        let duration = self.state.duration_secs();
        let fraction = if duration > 0.0 { secs / duration } else { 0.0 };
        self.seek(fraction, secs)
    }

    fn seek(&mut self, fraction: f64, secs: f64) -> Result<(), TransportError> {
        if !self.state.status().has_position() {
            return Err(self.reject("seek"));
        }
        let mounted = self.mounted.as_mut().ok_or(TransportError::NoSource)?;
        mounted.sink.bump_epoch();
        if let Err(e) = mounted.source.seek_to(fraction) {
            self.fail(e.to_string());
            return Err(e);
        }
        self.state.set_position(secs);
        self.renderer.set_progress(self.state.progress());
        Ok(())
    }

    fn enter_playing(&mut self) {
        self.state.set_status(PlaybackStatus::Playing);
        if let Some(mounted) = self.mounted.as_mut() {
            if mounted.frames.is_none() {
                mounted.frames = Some(self.scheduler.start(mounted.sink.clone()));
            }
        }
    }

    fn leave_playing(&mut self, next: PlaybackStatus) {
        self.stop_frames();
        self.state.set_status(next);
    }

    fn stop_frames(&mut self) {
        if let Some(frames) = self.mounted.as_mut().and_then(|m| m.frames.as_mut()) {
            frames.cancel();
        }
        if let Some(mounted) = self.mounted.as_mut() {
            mounted.frames = None;
        }
    }

    fn fail(&mut self, reason: String) {
        warn!("Playback failed: {}", reason);
        self.stop_frames();
        self.state.set_status(PlaybackStatus::Errored(reason));
    }

    fn reject(&self, command: &'static str) -> TransportError {
        let err = TransportError::InvalidState {
            command,
            status: self.state.status().to_string(),
        };
        debug!("Ignored: {}", err);
        err
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.unmount();
    }
}
