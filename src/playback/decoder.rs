// Audio decoder using Symphonia
// Decodes a downloaded audio body to mono f32 samples

use log::debug;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MediaLoadError;

/// Fully decoded track, downmixed to one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedTrack {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Peak absolute amplitude of each of `buckets` equal slices.
    pub fn peaks(&self, buckets: usize) -> Vec<f32> {
        if buckets == 0 || self.samples.is_empty() {
            return Vec::new();
        }
        let len = self.samples.len();
        (0..buckets)
            .map(|i| {
                let start = i * len / buckets;
                let end = ((i + 1) * len / buckets).max(start + 1).min(len);
                self.samples[start..end].iter().fold(0.0f32, |m, s| m.max(s.abs()))
            })
            .collect()
    }

    /// Sample index for a position in seconds, clamped to the track.
    pub fn frame_at(&self, secs: f64) -> usize {
        ((secs.max(0.0) * self.sample_rate as f64) as usize).min(self.samples.len())
    }
}

/// Extension hinting format detection, taken from the response media type
/// or, failing that, from the last path segment of `url`.
pub fn format_hint(content_type: Option<&str>, url: &str) -> Option<String> {
    let from_mime = content_type.and_then(|ct| {
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let ext = match mime.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => "wav",
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" | "video/mp4" => "mp4",
            "audio/aac" | "audio/x-aac" => "aac",
            "audio/ogg" | "application/ogg" | "audio/vorbis" => "ogg",
            "audio/flac" | "audio/x-flac" => "flac",
            _ => return None,
        };
        Some(ext.to_string())
    });
    from_mime.or_else(|| {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let name = path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    })
}

/// Decode a whole audio file held in memory. `extension` hints the format.
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedTrack, MediaLoadError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MediaLoadError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MediaLoadError::UnsupportedFormat("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MediaLoadError::UnsupportedFormat(e.to_string()))?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(MediaLoadError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(MediaLoadError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() * channels;
        if buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend(
            buf.samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if samples.is_empty() {
        return Err(MediaLoadError::Decode("no audio frames decoded".to_string()));
    }
    Ok(DecodedTrack { samples, sample_rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                // loud first half, quiet second half
                let amp = if i < frames / 2 { 16000.0 } else { 2000.0 };
                let s = (amp * (i as f32 * 0.05).sin()) as i16;
                for _ in 0..channels {
                    writer.write_sample(s).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_wav_to_mono() {
        let track = decode(wav_bytes(8000, 2, 16000), Some("wav")).unwrap();
        assert_eq!(track.sample_rate, 8000);
        assert_eq!(track.samples.len(), 16000);
        assert!((track.duration_secs() - 2.0).abs() < 1e-9);
        assert_eq!(track.frame_at(1.0), 8000);
        assert_eq!(track.frame_at(99.0), 16000);
    }

    #[test]
    fn peaks_follow_loudness() {
        let track = decode(wav_bytes(8000, 1, 8000), None).unwrap();
        let peaks = track.peaks(4);
        assert_eq!(peaks.len(), 4);
        assert!(peaks[0] > 0.4 && peaks[1] > 0.4);
        assert!(peaks[2] < 0.1 && peaks[3] < 0.1);
    }

    #[test]
    fn format_hint_prefers_media_type_then_url() {
        assert_eq!(format_hint(Some("audio/mpeg"), "http://h/a").as_deref(), Some("mp3"));
        assert_eq!(
            format_hint(Some("Audio/X-WAV; charset=binary"), "http://h/a.mp3").as_deref(),
            Some("wav")
        );
        assert_eq!(
            format_hint(Some("application/octet-stream"), "http://h/files/talk.FLAC?sig=1").as_deref(),
            Some("flac")
        );
        assert_eq!(format_hint(None, "http://h/transcription/7/audio"), None);
        assert_eq!(format_hint(None, "http://h.example/audio"), None);
    }

    #[test]
    fn garbage_is_unsupported() {
        let err = decode(b"definitely not audio".to_vec(), None).unwrap_err();
        assert!(matches!(err, MediaLoadError::UnsupportedFormat(_)));
    }
}
