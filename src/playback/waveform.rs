//! Bar waveform with a progress overlay.
//!
//! Bars come from decoded peaks when the source provides them. Otherwise a
//! placeholder pattern seeded from the source URL is drawn; it is a visual
//! stand-in and says nothing about the audio.

use serde::Serialize;

use crate::config::WaveformConfig;

/// Shortest bar drawn, as a fraction of the container height.
const MIN_BAR_FRACTION: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContainerDimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformBar {
    pub x: f64,
    pub width: f64,
    pub height: f64,
    pub played: bool,
}

/// One fully redrawn picture of the waveform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformFrame {
    pub width: f64,
    pub height: f64,
    pub bar_radius: f64,
    /// Right edge of the played region.
    pub progress_px: f64,
    pub cursor_width: f64,
    pub wave_color: String,
    pub progress_color: String,
    pub placeholder: bool,
    pub bars: Vec<WaveformBar>,
}

pub struct WaveformRenderer {
    config: WaveformConfig,
    dimensions: ContainerDimensions,
    peaks: Option<Vec<f32>>,
    seed: u64,
    /// No track mounted; nothing is drawn.
    blank: bool,
    amplitudes: Vec<f64>,
    progress: f64,
    frame: WaveformFrame,
}

impl WaveformRenderer {
    pub fn new(config: WaveformConfig) -> Self {
        let frame = WaveformFrame {
            width: 0.0,
            height: config.min_height,
            bar_radius: config.bar_radius,
            progress_px: 0.0,
            cursor_width: config.cursor_width,
            wave_color: config.wave_color.clone(),
            progress_color: config.progress_color.clone(),
            placeholder: true,
            bars: Vec::new(),
        };
        Self {
            dimensions: ContainerDimensions {
                width: 0.0,
                height: config.min_height,
            },
            config,
            peaks: None,
            seed: 0,
            blank: true,
            amplitudes: Vec::new(),
            progress: 0.0,
            frame,
        }
    }

    /// Start over for a new track; nothing from the previous one survives.
    pub fn reset(&mut self, source_url: &str) {
        self.peaks = None;
        self.seed = seed_from(source_url);
        self.blank = false;
        self.progress = 0.0;
        self.rebuild();
    }

    /// Drop the track; bars disappear until the next `reset`.
    pub fn clear(&mut self) {
        self.peaks = None;
        self.seed = 0;
        self.blank = true;
        self.progress = 0.0;
        self.rebuild();
    }

    /// Use real amplitudes. Values are normalised so the loudest bucket is 1.
    pub fn set_peaks(&mut self, peaks: Option<Vec<f32>>) {
        self.peaks = peaks.filter(|p| !p.is_empty()).map(normalize);
        self.rebuild();
    }

    /// Lay out bars for the container. A narrower container gets fewer bars.
    pub fn render(&mut self, dimensions: ContainerDimensions) -> &WaveformFrame {
        self.dimensions = ContainerDimensions {
            width: dimensions.width.max(0.0),
            height: dimensions.height.max(self.config.min_height),
        };
        self.rebuild();
        &self.frame
    }

    /// Full redraw with `[0, fraction * width)` painted as played.
    pub fn set_progress(&mut self, fraction: f64) -> &WaveformFrame {
        self.progress = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.redraw();
        &self.frame
    }

    pub fn bar_count(&self) -> usize {
        let block = self.config.bar_width + self.config.bar_gap;
        if block <= 0.0 || self.dimensions.width <= 0.0 {
            return 0;
        }
        (self.dimensions.width / block).floor() as usize
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Width covered by played bars, including their trailing gaps.
    pub fn played_width(&self) -> f64 {
        let played = self.frame.bars.iter().filter(|b| b.played).count();
        played as f64 * (self.config.bar_width + self.config.bar_gap)
    }

    /// Fraction of the track under horizontal offset `x`.
    pub fn fraction_at(&self, x: f64) -> f64 {
        if self.dimensions.width <= 0.0 {
            return 0.0;
        }
        (x / self.dimensions.width).clamp(0.0, 1.0)
    }

    pub fn is_placeholder(&self) -> bool {
        self.peaks.is_none()
    }

    pub fn frame(&self) -> &WaveformFrame {
        &self.frame
    }

    fn rebuild(&mut self) {
        let count = self.bar_count();
        self.amplitudes = match &self.peaks {
            _ if self.blank => Vec::new(),
            Some(peaks) => resample(peaks, count),
            None => placeholder(self.seed, count),
        };
        self.redraw();
    }

    fn redraw(&mut self) {
        let block = self.config.bar_width + self.config.bar_gap;
        let height = self.dimensions.height;
        let progress_px = self.progress * self.dimensions.width;
        self.frame = WaveformFrame {
            width: self.dimensions.width,
            height,
            bar_radius: self.config.bar_radius,
            progress_px,
            cursor_width: self.config.cursor_width,
            wave_color: self.config.wave_color.clone(),
            progress_color: self.config.progress_color.clone(),
            placeholder: self.peaks.is_none(),
            bars: self
                .amplitudes
                .iter()
                .enumerate()
                .map(|(i, amp)| {
                    let x = i as f64 * block;
                    WaveformBar {
                        x,
                        width: self.config.bar_width,
                        height: (amp.max(MIN_BAR_FRACTION) * height).round(),
                        played: x < progress_px,
                    }
                })
                .collect(),
        };
    }
}

fn normalize(peaks: Vec<f32>) -> Vec<f32> {
    let max = peaks.iter().copied().fold(0.0f32, |a, b| a.max(b.abs()));
    if max <= f32::EPSILON {
        return peaks.iter().map(|_| 0.0).collect();
    }
    peaks.iter().map(|p| p.abs() / max).collect()
}

/// Averages the peaks that fall into each bar; repeats when there are fewer
/// peaks than bars.
fn resample(peaks: &[f32], count: usize) -> Vec<f64> {
    if count == 0 || peaks.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let start = i * peaks.len() / count;
            let end = ((i + 1) * peaks.len() / count).max(start + 1).min(peaks.len());
            let slice = &peaks[start..end];
            slice.iter().map(|&p| p as f64).sum::<f64>() / slice.len() as f64
        })
        .collect()
}

// FNV-1a
fn seed_from(url: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in url.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn placeholder(seed: u64, count: usize) -> Vec<f64> {
    // xorshift64 never leaves zero
    let mut state = seed | 1;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            0.2 + 0.8 * ((state >> 11) as f64 / (1u64 << 53) as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(width: f64) -> WaveformRenderer {
        let mut r = WaveformRenderer::new(WaveformConfig::default());
        r.reset("http://host/transcription/1/audio");
        r.render(ContainerDimensions { width, height: 58.0 });
        r
    }

    #[test]
    fn bar_count_follows_width() {
        assert_eq!(renderer(800.0).bar_count(), 100);
        assert_eq!(renderer(403.0).bar_count(), 50);
        assert_eq!(renderer(7.0).bar_count(), 0);
        let wide = renderer(800.0);
        let narrow = renderer(400.0);
        assert_eq!(wide.frame().bars[0].width, narrow.frame().bars[0].width);
    }

    #[test]
    fn progress_width_tracks_fraction_within_one_bar() {
        let width = 803.0;
        let mut r = renderer(width);
        let block = 8.0;
        for i in 0..=40 {
            let f = i as f64 / 40.0;
            let frame = r.set_progress(f).clone();
            assert!((frame.progress_px - f * width).abs() < 1e-9);
            let diff = (r.played_width() - f * width).abs();
            assert!(diff <= block, "f={} played={} expected={}", f, r.played_width(), f * width);
        }
    }

    #[test]
    fn progress_is_clamped() {
        let mut r = renderer(100.0);
        assert_eq!(r.set_progress(1.7).progress_px, 100.0);
        assert_eq!(r.set_progress(-0.2).progress_px, 0.0);
        assert!(r.frame().bars.iter().all(|b| !b.played));
    }

    #[test]
    fn placeholder_is_stable_per_url_and_changes_on_reset() {
        let a = renderer(400.0).frame().bars.clone();
        let b = renderer(400.0).frame().bars.clone();
        assert_eq!(a, b);

        let mut other = renderer(400.0);
        other.set_progress(0.5);
        other.reset("http://host/transcription/2/audio");
        assert_eq!(other.progress(), 0.0);
        assert!(other.is_placeholder());
        assert_ne!(other.frame().bars, a);
    }

    #[test]
    fn peaks_replace_placeholder_and_are_normalised() {
        let mut r = renderer(32.0);
        r.set_peaks(Some(vec![0.1, 0.2, 0.4, 0.2, 0.1, 0.0, 0.0, 0.2]));
        assert!(!r.is_placeholder());
        let heights: Vec<f64> = r.frame().bars.iter().map(|b| b.height).collect();
        assert_eq!(heights.len(), 4);
        // buckets average to 0.375, 0.75, 0.125, 0.25 of the max
        assert_eq!(heights, vec![22.0, 44.0, 7.0, 15.0]);
    }

    #[test]
    fn clear_removes_bars_until_next_track() {
        let mut r = renderer(400.0);
        r.set_progress(0.3);
        r.clear();
        assert!(r.frame().bars.is_empty());
        assert_eq!(r.frame().progress_px, 0.0);
        r.reset("http://host/transcription/3/audio");
        assert_eq!(r.frame().bars.len(), 50);
    }

    #[test]
    fn click_position_maps_to_fraction() {
        let r = renderer(500.0);
        assert_eq!(r.fraction_at(125.0), 0.25);
        assert_eq!(r.fraction_at(900.0), 1.0);
        assert_eq!(r.fraction_at(-1.0), 0.0);
    }
}
