use std::{
    collections::VecDeque,
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::{PlayerError, Result};

/// Largest analysis window a tap has to be able to serve.
pub const TAP_CAPACITY: usize = 32_768;

/// Asynchronous notifications raised by a [`MediaResource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// A pending start request completed and audio is flowing.
    Started,
    /// A pending start request was rejected.
    StartFailed(String),
    /// A non-looping source reached its end.
    Ended,
    /// The source failed while playing.
    Error(String),
}

/// Playable, seekable audio source identified by a URI.
///
/// Starting is asynchronous: [`MediaResource::request_start`] only queues the
/// request, and the outcome is reported later through
/// [`MediaResource::poll_event`]. A request may also be refused up front, in
/// which case no event follows.
pub trait MediaResource {
    fn uri(&self) -> &str;

    fn is_paused(&self) -> bool;

    fn is_looping(&self) -> bool;

    fn set_looping(&mut self, looping: bool);

    fn request_start(&mut self) -> Result<()>;

    /// Stops playback. Safe to call in any state.
    fn stop(&mut self);

    fn poll_event(&mut self) -> Option<MediaEvent>;

    /// Hands out the feed of played samples. A resource can be tapped once;
    /// later calls fail with [`PlayerError::AlreadyTapped`].
    fn tap(&mut self) -> Result<SampleTap>;
}

/// Shared view over the most recently played samples of a media resource.
#[derive(Clone)]
pub struct SampleTap {
    shared: Arc<Mutex<TapBuffer>>,
}

struct TapBuffer {
    sample_rate: u32,
    samples: VecDeque<f32>,
}

impl SampleTap {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(TapBuffer {
                sample_rate,
                samples: VecDeque::with_capacity(TAP_CAPACITY),
            })),
        }
    }

    pub fn sample_rate(&self) -> Result<u32> {
        Ok(self.lock()?.sample_rate)
    }

    /// Appends played samples, discarding the oldest beyond [`TAP_CAPACITY`].
    pub fn push(&self, samples: &[f32]) -> Result<()> {
        let mut buffer = self.lock()?;
        let incoming = if samples.len() > TAP_CAPACITY {
            &samples[samples.len() - TAP_CAPACITY..]
        } else {
            samples
        };
        let overflow = (buffer.samples.len() + incoming.len()).saturating_sub(TAP_CAPACITY);
        buffer.samples.drain(..overflow);
        buffer.samples.extend(incoming.iter().copied());
        Ok(())
    }

    /// Copies the latest `out.len()` samples into `out`, oldest first. When
    /// fewer samples have been played the front is zero padded.
    pub fn copy_latest(&self, out: &mut [f32]) -> Result<()> {
        let buffer = self.lock()?;
        let available = buffer.samples.len().min(out.len());
        let padding = out.len() - available;
        out[..padding].fill(0.0);
        let start = buffer.samples.len() - available;
        for (slot, sample) in out[padding..]
            .iter_mut()
            .zip(buffer.samples.range(start..))
        {
            *slot = *sample;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.samples.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, TapBuffer>> {
        self.shared
            .lock()
            .map_err(|_| PlayerError::msg("sample tap has been poisoned"))
    }
}

impl fmt::Debug for SampleTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleTap").finish()
    }
}

/// In-memory media resource over decoded mono samples.
///
/// Playback advances only when [`BufferedMedia::advance`] is called, which
/// lets the host pace it against its own clock.
pub struct BufferedMedia {
    uri: String,
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
    paused: bool,
    looping: bool,
    starting: bool,
    rejection: Option<String>,
    events: VecDeque<MediaEvent>,
    tap: Option<SampleTap>,
    tapped: bool,
}

impl BufferedMedia {
    pub fn new(uri: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            uri: uri.into(),
            samples,
            sample_rate: sample_rate.max(1),
            cursor: 0,
            paused: true,
            looping: false,
            starting: false,
            rejection: None,
            events: VecDeque::new(),
            tap: None,
            tapped: false,
        }
    }

    /// Builds a sine tone of the given frequency and length.
    pub fn tone(frequency: f32, length: Duration, sample_rate: u32) -> Self {
        let count = (length.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let step = 2.0 * PI * frequency / sample_rate.max(1) as f32;
        let samples = (0..count)
            .map(|index| (step * index as f32).sin() * 0.5)
            .collect();
        Self::new(format!("tone:{frequency}"), samples, sample_rate)
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.cursor as f64 / f64::from(self.sample_rate))
    }

    /// Makes the next start request fail, the way a platform refuses to
    /// play without a user gesture.
    pub fn reject_next_start(&mut self, reason: impl Into<String>) {
        self.rejection = Some(reason.into());
    }

    /// Aborts playback with a runtime failure.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.events.push_back(MediaEvent::Error(reason.into()));
    }

    /// Plays `elapsed` worth of samples into the tap.
    pub fn advance(&mut self, elapsed: Duration) -> Result<()> {
        if self.paused || self.samples.is_empty() {
            return Ok(());
        }

        let mut remaining = (elapsed.as_secs_f64() * f64::from(self.sample_rate)).round() as usize;
        while remaining > 0 {
            let end = (self.cursor + remaining).min(self.samples.len());
            if let Some(tap) = &self.tap {
                tap.push(&self.samples[self.cursor..end])?;
            }
            remaining -= end - self.cursor;
            self.cursor = end;

            if self.cursor == self.samples.len() {
                self.cursor = 0;
                if !self.looping {
                    self.paused = true;
                    self.events.push_back(MediaEvent::Ended);
                    break;
                }
            }
        }

        Ok(())
    }
}

impl MediaResource for BufferedMedia {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn request_start(&mut self) -> Result<()> {
        if !self.paused || self.starting {
            return Ok(());
        }

        self.starting = true;
        let outcome = if self.samples.is_empty() {
            MediaEvent::StartFailed(format!("no playable audio in `{}`", self.uri))
        } else if let Some(reason) = self.rejection.take() {
            MediaEvent::StartFailed(reason)
        } else {
            MediaEvent::Started
        };
        self.events.push_back(outcome);
        Ok(())
    }

    fn stop(&mut self) {
        self.paused = true;
        if self.starting {
            self.starting = false;
            for event in &mut self.events {
                if *event == MediaEvent::Started {
                    *event = MediaEvent::StartFailed("start interrupted by stop".to_string());
                }
            }
        }
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        let event = self.events.pop_front()?;
        match event {
            MediaEvent::Started => {
                self.starting = false;
                self.paused = false;
            }
            MediaEvent::StartFailed(_) => self.starting = false,
            MediaEvent::Ended | MediaEvent::Error(_) => {}
        }
        Some(event)
    }

    fn tap(&mut self) -> Result<SampleTap> {
        if self.tapped {
            return Err(PlayerError::AlreadyTapped);
        }
        let tap = SampleTap::new(self.sample_rate);
        self.tap = Some(tap.clone());
        self.tapped = true;
        Ok(tap)
    }
}

impl fmt::Debug for BufferedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedMedia")
            .field("uri", &self.uri)
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("cursor", &self.cursor)
            .field("paused", &self.paused)
            .field("looping", &self.looping)
            .field("tapped", &self.tapped)
            .finish()
    }
}
