// Playback core: source handles, waveform and the controller state machine

pub mod controller;
pub mod decoder;
pub mod driver;
pub mod frame;
pub mod native;
#[cfg(feature = "audio-output")]
pub mod output;
pub mod source;
pub mod state;
pub mod waveform;

pub use controller::PlaybackController;
pub use decoder::DecodedTrack;
pub use driver::{spawn_native_player, spawn_player, PlayerCommand, PlayerHandle};
pub use frame::{FrameScheduler, FrameTask, IntervalFrameScheduler};
pub use native::{DecodedAudioSource, NativeSourceFactory};
pub use source::{AudioSource, EventSink, HandleId, PlayerEvent, SourceEvent, SourceFactory};
pub use state::{PlaybackState, PlaybackStatus, PlayerSnapshot};
pub use waveform::{ContainerDimensions, WaveformBar, WaveformFrame, WaveformRenderer};
