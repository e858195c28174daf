//! Doubles shared by the unit tests.

use std::{cell::Cell, collections::VecDeque, rc::Rc};

use crate::{
    MediaEvent, MediaResource, PlaybackContext, PlaybackObserver, PlaybackState, PlayerError,
    Result, SampleTap,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Play,
    Pause { media_was_paused: bool },
    Ended,
    Error(String),
    State(PlaybackState, PlaybackState),
}

/// Observer that writes down everything it is told.
#[derive(Debug, Default)]
pub struct Recorder {
    pub notes: Vec<Note>,
    pub transitions: Vec<(PlaybackState, PlaybackState)>,
}

impl Recorder {
    pub fn count(&self, note: &Note) -> usize {
        self.notes.iter().filter(|seen| *seen == note).count()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.transitions.clear();
    }
}

impl PlaybackObserver for Recorder {
    fn on_play(&mut self, _ctx: &mut PlaybackContext<'_>) {
        self.notes.push(Note::Play);
    }

    fn on_pause(&mut self, ctx: &mut PlaybackContext<'_>) {
        let media_was_paused = ctx.media().is_paused();
        self.notes.push(Note::Pause { media_was_paused });
    }

    fn on_ended(&mut self, _ctx: &mut PlaybackContext<'_>) {
        self.notes.push(Note::Ended);
    }

    fn on_error(&mut self, error: &PlayerError, _ctx: &mut PlaybackContext<'_>) {
        self.notes.push(Note::Error(error.to_string()));
    }

    fn on_state_change(&mut self, from: PlaybackState, to: PlaybackState) {
        self.notes.push(Note::State(from, to));
        self.transitions.push((from, to));
    }
}

/// Call counters a [`SpyMedia`] shares with its test.
#[derive(Debug, Default)]
pub struct SpyLog {
    pub starts: Cell<usize>,
    pub stops: Cell<usize>,
    pub taps: Cell<usize>,
}

/// Media resource that counts calls and completes starts on the next poll.
#[derive(Debug)]
pub struct SpyMedia {
    log: Rc<SpyLog>,
    paused: bool,
    looping: bool,
    refusal: Option<String>,
    events: VecDeque<MediaEvent>,
    tap: Option<SampleTap>,
}

impl SpyMedia {
    pub fn new() -> (Self, Rc<SpyLog>) {
        let log = Rc::new(SpyLog::default());
        let media = Self {
            log: log.clone(),
            paused: true,
            looping: false,
            refusal: None,
            events: VecDeque::new(),
            tap: None,
        };
        (media, log)
    }

    /// Media whose start requests are refused synchronously.
    pub fn refusing(reason: &str) -> (Self, Rc<SpyLog>) {
        let (mut media, log) = Self::new();
        media.refusal = Some(reason.to_string());
        (media, log)
    }

    pub fn push_event(&mut self, event: MediaEvent) {
        self.events.push_back(event);
    }

    /// Writes samples into the tap as if they had just been played.
    pub fn play_samples(&self, samples: &[f32]) {
        if let Some(tap) = &self.tap {
            tap.push(samples).expect("tap lock");
        }
    }
}

impl MediaResource for SpyMedia {
    fn uri(&self) -> &str {
        "spy:media"
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
        self.log.starts.set(self.log.starts.get() + 1);
        if let Some(reason) = &self.refusal {
            return Err(PlayerError::msg(reason.clone()));
        }
        self.events.push_back(MediaEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.stops.set(self.log.stops.get() + 1);
        self.paused = true;
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        let event = self.events.pop_front()?;
        if event == MediaEvent::Started {
            self.paused = false;
        }
        Some(event)
    }

    fn tap(&mut self) -> Result<SampleTap> {
        self.log.taps.set(self.log.taps.get() + 1);
        if self.tap.is_some() {
            return Err(PlayerError::AlreadyTapped);
        }
        let tap = SampleTap::new(48_000);
        self.tap = Some(tap.clone());
        Ok(tap)
    }
}
