//! Runs one [`PlaybackController`] on its own task.
//!
//! User commands and source events are serialised through a single loop so
//! the controller never needs a lock. After every step the observer gets a
//! fresh [`PlayerSnapshot`] if anything visible changed.

use log::{debug, info};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::controller::PlaybackController;
use super::frame::IntervalFrameScheduler;
use super::native::NativeSourceFactory;
use super::source::PlayerEvent;
use super::state::PlayerSnapshot;
use crate::api::BackendClient;
use crate::config::AppConfig;

#[derive(Debug)]
pub enum PlayerCommand {
    Open { url: String },
    Play,
    Pause,
    Toggle,
    SeekFraction(f64),
    /// Click on the scrub bar.
    SeekClick { x: f64, width: f64 },
    WaveformClick { x: f64 },
    Rewind,
    Forward,
    Resize { width: f64, height: f64 },
    Close,
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    Shutdown,
}

/// Cheap handle for sending commands to a running player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    /// Returns false once the player task has stopped.
    pub fn send(&self, command: PlayerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub async fn snapshot(&self) -> Option<PlayerSnapshot> {
        let (tx, rx) = oneshot::channel();
        if !self.send(PlayerCommand::Snapshot(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(PlayerCommand::Shutdown);
    }
}

/// Spawn the loop. Must be called inside a tokio runtime.
pub fn spawn_player<F>(
    mut controller: PlaybackController,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    mut observer: F,
) -> PlayerHandle
where
    F: FnMut(&PlayerSnapshot) + Send + 'static,
{
    let (tx, mut commands) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut published = controller.snapshot();
        observer(&published);

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    None | Some(PlayerCommand::Shutdown) => break,
                    Some(PlayerCommand::Snapshot(reply)) => {
                        let _ = reply.send(controller.snapshot());
                        continue;
                    }
                    Some(command) => apply(&mut controller, command),
                },
                Some(event) = events.recv() => controller.handle_event(event),
            }

            let snapshot = controller.snapshot();
            if snapshot != published {
                observer(&snapshot);
                published = snapshot;
            }
        }

        controller.unmount();
        info!("Player task stopped");
    });

    PlayerHandle { commands: tx }
}

/// Player wired to the backend audio endpoint and a tokio frame clock.
pub fn spawn_native_player<F>(client: BackendClient, config: &AppConfig, observer: F) -> PlayerHandle
where
    F: FnMut(&PlayerSnapshot) + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let factory = NativeSourceFactory::new(client, Duration::from_millis(config.time_update_interval_ms));
    let frames = IntervalFrameScheduler::new(Duration::from_millis(config.frame_interval_ms));
    let controller = PlaybackController::new(Box::new(factory), Box::new(frames), tx, config);
    spawn_player(controller, rx, observer)
}

fn apply(controller: &mut PlaybackController, command: PlayerCommand) {
    let result = match command {
        PlayerCommand::Open { url } => {
            controller.mount(&url);
            Ok(())
        }
        PlayerCommand::Play => controller.play(),
        PlayerCommand::Pause => controller.pause(),
        PlayerCommand::Toggle => controller.toggle(),
        PlayerCommand::SeekFraction(f) => controller.seek_fraction(f),
        PlayerCommand::SeekClick { x, width } => controller.seek_click(x, width),
        PlayerCommand::WaveformClick { x } => controller.waveform_click(x),
        PlayerCommand::Rewind => controller.rewind(),
        PlayerCommand::Forward => controller.forward(),
        PlayerCommand::Resize { width, height } => {
            controller.resize(width, height);
            Ok(())
        }
        PlayerCommand::Close => {
            controller.unmount();
            Ok(())
        }
        PlayerCommand::Snapshot(_) | PlayerCommand::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        debug!("Command had no effect: {}", e);
    }
}
