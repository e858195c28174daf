use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::VisualizerConfig, PlayerError, Result, SampleTap};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

/// Number of bars painted per render tick.
pub const FRAME_LEN: usize = 11;

/// One render tick worth of per-band magnitudes in the `0..=255` domain.
pub type FrequencyFrame = [u8; FRAME_LEN];

pub(crate) fn validate_fft_size(size: usize) -> Result<()> {
    if !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) || !size.is_power_of_two() {
        return Err(PlayerError::InvalidInput(
            "fft_size must be a power of two between 32 and 32768",
        ));
    }
    Ok(())
}

/// Frequency-domain analyser fed by a [`SampleTap`].
///
/// Each read windows the latest `fft_size` samples (Blackman), transforms
/// them, smooths the magnitudes against the previous read and maps the
/// decibel range onto bytes.
pub struct FrequencyAnalyzer {
    tap: SampleTap,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl FrequencyAnalyzer {
    pub fn new(tap: SampleTap, fft_size: usize) -> Result<Self> {
        let defaults = VisualizerConfig::default();
        Self::with_settings(
            tap,
            fft_size,
            defaults.smoothing,
            defaults.min_decibels,
            defaults.max_decibels,
        )
    }

    pub fn from_config(tap: SampleTap, config: &VisualizerConfig) -> Result<Self> {
        Self::with_settings(
            tap,
            config.fft_size,
            config.smoothing,
            config.min_decibels,
            config.max_decibels,
        )
    }

    pub fn with_settings(
        tap: SampleTap,
        fft_size: usize,
        smoothing: f32,
        min_decibels: f32,
        max_decibels: f32,
    ) -> Result<Self> {
        validate_fft_size(fft_size)?;
        if min_decibels >= max_decibels {
            return Err(PlayerError::InvalidInput(
                "min_decibels must be below max_decibels",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        };

        Ok(Self {
            tap,
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Fills `out` with the current byte magnitudes of the lowest bins.
    /// Entries beyond the bin count are zeroed.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        self.update_spectrum()?;

        let range = self.max_decibels - self.min_decibels;
        let bins = out.len().min(self.smoothed.len());
        for (slot, magnitude) in out.iter_mut().zip(&self.smoothed[..bins]) {
            let decibels = if *magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = (255.0 / range) * (decibels - self.min_decibels);
            *slot = scaled.clamp(0.0, 255.0).floor() as u8;
        }
        out[bins..].fill(0);
        Ok(())
    }

    /// Reads one [`FrequencyFrame`].
    pub fn read_frame(&mut self) -> Result<FrequencyFrame> {
        let mut frame = [0u8; FRAME_LEN];
        self.byte_frequency_data(&mut frame)?;
        Ok(frame)
    }

    fn update_spectrum(&mut self) -> Result<()> {
        let fft = &mut self.fft;
        self.tap.copy_latest(&mut fft.input)?;
        for (sample, weight) in fft.input.iter_mut().zip(&self.window) {
            *sample *= weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (previous, bin) in self.smoothed.iter_mut().zip(&fft.spectrum) {
            let magnitude = bin.norm() * scale;
            let next = tau * *previous + (1.0 - tau) * magnitude;
            *previous = if next.is_finite() { next } else { 0.0 };
        }
        Ok(())
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let x = index as f32 / len as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.01 * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_reads_as_zero() {
        let tap = SampleTap::new(48_000);
        let mut analyzer = FrequencyAnalyzer::new(tap, 256).unwrap();
        assert_eq!(analyzer.read_frame().unwrap(), [0u8; FRAME_LEN]);
    }

    #[test]
    fn tone_lights_up_its_bin() {
        // 256-point transform at 25.6 kHz gives 100 Hz bins; 500 Hz lands on bin 5.
        let tap = SampleTap::new(25_600);
        tap.push(&quiet_sine(500.0, 25_600, 256)).unwrap();
        let mut analyzer = FrequencyAnalyzer::with_settings(tap, 256, 0.0, -100.0, -30.0).unwrap();

        let frame = analyzer.read_frame().unwrap();
        assert!(frame[5] > 150);
        assert!(frame[5] > frame[4]);
        assert!(frame[5] > frame[6]);
        assert!(frame[4] > frame[3]);
        assert_eq!(frame[10], 0);
    }

    #[test]
    fn smoothing_blends_with_previous_read() {
        let tap = SampleTap::new(25_600);
        tap.push(&quiet_sine(500.0, 25_600, 256)).unwrap();
        let mut smoothed = FrequencyAnalyzer::with_settings(tap.clone(), 256, 0.8, -100.0, -30.0).unwrap();
        let mut raw = FrequencyAnalyzer::with_settings(tap, 256, 0.0, -100.0, -30.0).unwrap();

        let first = smoothed.read_frame().unwrap();
        let second = smoothed.read_frame().unwrap();
        let reference = raw.read_frame().unwrap();

        assert!(first[5] < reference[5]);
        assert!(second[5] > first[5]);
    }

    #[test]
    fn buffers_longer_than_bin_count_are_zero_filled() {
        let tap = SampleTap::new(25_600);
        tap.push(&vec![0.7; 64]).unwrap();
        let mut analyzer = FrequencyAnalyzer::with_settings(tap, 32, 0.0, -100.0, -30.0).unwrap();

        let mut out = [7u8; 20];
        analyzer.byte_frequency_data(&mut out).unwrap();
        assert_eq!(analyzer.frequency_bin_count(), 16);
        assert!(out[16..].iter().all(|value| *value == 0));
    }

    #[test]
    fn rejects_invalid_sizes() {
        let tap = SampleTap::new(48_000);
        assert!(FrequencyAnalyzer::new(tap.clone(), 100).is_err());
        assert!(FrequencyAnalyzer::new(tap.clone(), 16).is_err());
        assert!(FrequencyAnalyzer::new(tap, 65_536).is_err());
    }

    #[test]
    fn blackman_window_tapers_edges() {
        assert!(blackman_value(0, 256).abs() < 1e-6);
        assert!((blackman_value(128, 256) - 1.0).abs() < 1e-3);
    }
}
