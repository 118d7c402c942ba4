// Audio output using cpal
// A feeder thread resamples the track into a ring buffer; the cpal callback
// drains it. The stream lives on its own thread because cpal streams are not Send

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::{error, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use rubato::{FftFixedIn, Resampler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::decoder::DecodedTrack;

/// ~250ms at 48kHz stereo
const RING_BUFFER_SIZE: usize = 48000 * 2 / 4;
/// Source frames handed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

enum OutputCommand {
    Start { track: Arc<DecodedTrack>, from_secs: f64 },
    Stop,
    Shutdown,
}

/// Plays decoded tracks on the default output device.
pub struct CpalOutput {
    commands: mpsc::Sender<OutputCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    pub fn spawn() -> Result<Self, String> {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("saywe-audio-output".to_string())
            .spawn(move || run_output(rx))
            .map_err(|e| format!("Failed to start audio thread: {}", e))?;
        Ok(Self {
            commands: tx,
            thread: Some(thread),
        })
    }

    pub fn start(&self, track: Arc<DecodedTrack>, from_secs: f64) {
        let _ = self.commands.send(OutputCommand::Start { track, from_secs });
    }

    pub fn stop(&self) {
        let _ = self.commands.send(OutputCommand::Stop);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// One running playback: the stream plus the thread filling its buffer.
struct Playback {
    _stream: Stream,
    stop: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
    }
}

fn run_output(commands: mpsc::Receiver<OutputCommand>) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        warn!("No output device available, playback is silent");
        return;
    };
    let config = match device.default_output_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to get default output config: {}", e);
            return;
        }
    };
    let sample_format = config.sample_format();
    let stream_config: StreamConfig = config.into();

    let mut playback: Option<Playback> = None;
    while let Ok(command) = commands.recv() {
        match command {
            OutputCommand::Start { track, from_secs } => {
                playback = None;
                match start_playback(&device, &stream_config, sample_format, track, from_secs) {
                    Ok(p) => playback = Some(p),
                    Err(e) => error!("{}", e),
                }
            }
            OutputCommand::Stop => playback = None,
            OutputCommand::Shutdown => break,
        }
    }
}

fn start_playback(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: cpal::SampleFormat,
    track: Arc<DecodedTrack>,
    from_secs: f64,
) -> Result<Playback, String> {
    let (producer, consumer) = HeapRb::<f32>::new(RING_BUFFER_SIZE).split();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, consumer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, consumer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, consumer)?,
        format => return Err(format!("Unsupported sample format: {:?}", format)),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let feeder_stop = stop.clone();
    let device_rate = config.sample_rate.0;
    let channels = config.channels.max(1) as usize;
    let feeder = std::thread::Builder::new()
        .name("saywe-audio-feeder".to_string())
        .spawn(move || {
            if let Err(e) = feed(&track, from_secs, device_rate, channels, producer, &feeder_stop) {
                error!("Audio feeder stopped: {}", e);
            }
        })
        .map_err(|e| format!("Failed to start feeder thread: {}", e))?;

    stream.play().map_err(|e| format!("Failed to start stream: {}", e))?;

    Ok(Playback {
        _stream: stream,
        stop,
        feeder: Some(feeder),
    })
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: RingConsumer,
) -> Result<Stream, String> {
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = T::from_sample(consumer.try_pop().unwrap_or(0.0));
                }
            },
            move |err| {
                error!("Audio output error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build output stream: {}", e))
}

/// Resample the mono track from `from_secs` to the device rate and push it,
/// duplicated across channels, until the track ends or `stop` is set.
fn feed(
    track: &DecodedTrack,
    from_secs: f64,
    device_rate: u32,
    channels: usize,
    mut producer: RingProducer,
    stop: &AtomicBool,
) -> Result<(), String> {
    let source = &track.samples[track.frame_at(from_secs)..];

    let mut resampler = if track.sample_rate == device_rate {
        None
    } else {
        let resampler = FftFixedIn::<f32>::new(
            track.sample_rate as usize,
            device_rate as usize,
            RESAMPLE_CHUNK,
            2,
            1,
        )
        .map_err(|e| format!("Failed to create resampler: {}", e))?;
        Some(resampler)
    };

    let mut cursor = 0;
    while cursor < source.len() {
        if stop.load(Ordering::SeqCst) {
            return Ok(());
        }
        let block = match resampler.as_mut() {
            Some(resampler) => {
                let needed = resampler.input_frames_next();
                let end = (cursor + needed).min(source.len());
                let chunk = &source[cursor..end];
                let mut out = if chunk.len() == needed {
                    resampler.process(&[chunk], None)
                } else {
                    resampler.process_partial(Some(&[chunk]), None)
                }
                .map_err(|e| format!("Resampling failed: {}", e))?;
                cursor = end;
                out.pop().unwrap_or_default()
            }
            None => {
                let end = (cursor + RESAMPLE_CHUNK).min(source.len());
                let block = source[cursor..end].to_vec();
                cursor = end;
                block
            }
        };

        let interleaved: Vec<f32> = block
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(channels))
            .collect();
        let mut remaining = interleaved.as_slice();
        while !remaining.is_empty() {
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
            let written = producer.push_slice(remaining);
            if written > 0 {
                remaining = &remaining[written..];
            } else {
                // Buffer full, wait for the callback to drain it
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }
    Ok(())
}
