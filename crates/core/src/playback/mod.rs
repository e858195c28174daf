use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Labels, PlayerConfig},
    MediaEvent, MediaResource, PlayerError,
};

/// Phase of the playback control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    /// Transient: entered when a start fails and left for `Idle` as soon as
    /// the failure has been reported.
    Errored,
}

impl PlaybackState {
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::{Errored, Idle, Loading, Playing};
        matches!(
            (self, next),
            (Idle, Loading) | (Loading, Playing) | (Loading, Errored) | (Errored, Idle) | (Playing, Idle)
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Loading => write!(f, "Loading"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Errored => write!(f, "Errored"),
        }
    }
}

/// What observers get to see of the controller when it notifies them.
pub struct PlaybackContext<'a> {
    media: &'a mut dyn MediaResource,
}

impl<'a> PlaybackContext<'a> {
    pub fn new(media: &'a mut dyn MediaResource) -> Self {
        Self { media }
    }

    pub fn media(&mut self) -> &mut dyn MediaResource {
        &mut *self.media
    }

    pub fn uri(&self) -> &str {
        self.media.uri()
    }
}

impl fmt::Debug for PlaybackContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("uri", &self.media.uri())
            .finish()
    }
}

/// Receives playback notifications from a [`PlaybackController`].
///
/// A natural end of the source is reported through `on_ended`, never through
/// `on_pause`, which is reserved for pauses the user asked for.
pub trait PlaybackObserver {
    fn on_play(&mut self, _ctx: &mut PlaybackContext<'_>) {}

    /// Called before the controller changes state or stops the media.
    fn on_pause(&mut self, _ctx: &mut PlaybackContext<'_>) {}

    fn on_ended(&mut self, _ctx: &mut PlaybackContext<'_>) {}

    fn on_error(&mut self, _error: &PlayerError, _ctx: &mut PlaybackContext<'_>) {}

    fn on_state_change(&mut self, _from: PlaybackState, _to: PlaybackState) {}
}

impl PlaybackObserver for () {}

impl<T: PlaybackObserver + ?Sized> PlaybackObserver for &mut T {
    fn on_play(&mut self, ctx: &mut PlaybackContext<'_>) {
        (**self).on_play(ctx);
    }

    fn on_pause(&mut self, ctx: &mut PlaybackContext<'_>) {
        (**self).on_pause(ctx);
    }

    fn on_ended(&mut self, ctx: &mut PlaybackContext<'_>) {
        (**self).on_ended(ctx);
    }

    fn on_error(&mut self, error: &PlayerError, ctx: &mut PlaybackContext<'_>) {
        (**self).on_error(error, ctx);
    }

    fn on_state_change(&mut self, from: PlaybackState, to: PlaybackState) {
        (**self).on_state_change(from, to);
    }
}

/// Notifies `A` first, then `B`.
impl<A: PlaybackObserver, B: PlaybackObserver> PlaybackObserver for (A, B) {
    fn on_play(&mut self, ctx: &mut PlaybackContext<'_>) {
        self.0.on_play(ctx);
        self.1.on_play(ctx);
    }

    fn on_pause(&mut self, ctx: &mut PlaybackContext<'_>) {
        self.0.on_pause(ctx);
        self.1.on_pause(ctx);
    }

    fn on_ended(&mut self, ctx: &mut PlaybackContext<'_>) {
        self.0.on_ended(ctx);
        self.1.on_ended(ctx);
    }

    fn on_error(&mut self, error: &PlayerError, ctx: &mut PlaybackContext<'_>) {
        self.0.on_error(error, ctx);
        self.1.on_error(error, ctx);
    }

    fn on_state_change(&mut self, from: PlaybackState, to: PlaybackState) {
        self.0.on_state_change(from, to);
        self.1.on_state_change(from, to);
    }
}

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn PlaybackObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn PlaybackObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PlaybackObserver for ObserverSet {
    fn on_play(&mut self, ctx: &mut PlaybackContext<'_>) {
        for observer in &mut self.observers {
            observer.on_play(ctx);
        }
    }

    fn on_pause(&mut self, ctx: &mut PlaybackContext<'_>) {
        for observer in &mut self.observers {
            observer.on_pause(ctx);
        }
    }

    fn on_ended(&mut self, ctx: &mut PlaybackContext<'_>) {
        for observer in &mut self.observers {
            observer.on_ended(ctx);
        }
    }

    fn on_error(&mut self, error: &PlayerError, ctx: &mut PlaybackContext<'_>) {
        for observer in &mut self.observers {
            observer.on_error(error, ctx);
        }
    }

    fn on_state_change(&mut self, from: PlaybackState, to: PlaybackState) {
        for observer in &mut self.observers {
            observer.on_state_change(from, to);
        }
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

type ContextCallback = Box<dyn FnMut(&mut PlaybackContext<'_>)>;
type ErrorCallback = Box<dyn FnMut(&PlayerError, &mut PlaybackContext<'_>)>;

/// Observer assembled from closures.
#[derive(Default)]
pub struct CallbackObserver {
    play: Option<ContextCallback>,
    pause: Option<ContextCallback>,
    ended: Option<ContextCallback>,
    error: Option<ErrorCallback>,
}

impl CallbackObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_play(mut self, callback: impl FnMut(&mut PlaybackContext<'_>) + 'static) -> Self {
        self.play = Some(Box::new(callback));
        self
    }

    pub fn handle_pause(mut self, callback: impl FnMut(&mut PlaybackContext<'_>) + 'static) -> Self {
        self.pause = Some(Box::new(callback));
        self
    }

    pub fn handle_ended(mut self, callback: impl FnMut(&mut PlaybackContext<'_>) + 'static) -> Self {
        self.ended = Some(Box::new(callback));
        self
    }

    pub fn handle_error(
        mut self,
        callback: impl FnMut(&PlayerError, &mut PlaybackContext<'_>) + 'static,
    ) -> Self {
        self.error = Some(Box::new(callback));
        self
    }
}

impl PlaybackObserver for CallbackObserver {
    fn on_play(&mut self, ctx: &mut PlaybackContext<'_>) {
        if let Some(callback) = &mut self.play {
            callback(ctx);
        }
    }

    fn on_pause(&mut self, ctx: &mut PlaybackContext<'_>) {
        if let Some(callback) = &mut self.pause {
            callback(ctx);
        }
    }

    fn on_ended(&mut self, ctx: &mut PlaybackContext<'_>) {
        if let Some(callback) = &mut self.ended {
            callback(ctx);
        }
    }

    fn on_error(&mut self, error: &PlayerError, ctx: &mut PlaybackContext<'_>) {
        if let Some(callback) = &mut self.error {
            callback(error, ctx);
        }
    }
}

impl fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("play", &self.play.is_some())
            .field("pause", &self.pause.is_some())
            .field("ended", &self.ended.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// State handed to child builders when rendering the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub is_paused: bool,
    pub is_looping: bool,
    pub is_loading: bool,
}

/// Toggle control over a single media resource.
pub struct PlaybackController<M: MediaResource> {
    media: Option<M>,
    state: PlaybackState,
    looping: bool,
    labels: Labels,
}

impl<M: MediaResource> PlaybackController<M> {
    /// Takes ownership of `media` and applies the configured loop flag.
    pub fn mount(mut media: M, config: &PlayerConfig) -> Self {
        media.set_looping(config.looping);
        tracing::debug!(uri = media.uri(), looping = config.looping, "mounted media");
        Self {
            media: Some(media),
            state: PlaybackState::Idle,
            looping: config.looping,
            labels: config.labels.clone(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        self.media.is_some()
    }

    pub fn media(&self) -> Option<&M> {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> Option<&mut M> {
        self.media.as_mut()
    }

    pub fn toggle_play_pause(&mut self, observer: &mut dyn PlaybackObserver) {
        if self.media.is_none() {
            tracing::error!(error = %PlayerError::ResourceUnavailable, "toggle ignored");
            return;
        }

        match self.state {
            PlaybackState::Idle | PlaybackState::Errored => self.play(observer),
            PlaybackState::Playing => self.pause(observer),
            PlaybackState::Loading => tracing::debug!("toggle ignored while loading"),
        }
    }

    /// Requests playback. The outcome arrives through [`Self::pump`] unless
    /// the media refuses the request outright.
    pub fn play(&mut self, observer: &mut dyn PlaybackObserver) {
        if self.media.is_none() {
            tracing::error!(error = %PlayerError::ResourceUnavailable, "cannot start playback");
            return;
        }
        if self.state != PlaybackState::Idle {
            tracing::warn!(state = %self.state, "play ignored");
            return;
        }

        transition(&mut self.state, PlaybackState::Loading, observer);
        let requested = match self.media.as_mut() {
            Some(media) => media.request_start(),
            None => Err(PlayerError::ResourceUnavailable),
        };
        if let Err(error) = requested {
            let error = match error {
                PlayerError::PlaybackStart(_) => error,
                other => PlayerError::PlaybackStart(other.to_string()),
            };
            self.report_start_failure(error, observer);
        }
    }

    pub fn pause(&mut self, observer: &mut dyn PlaybackObserver) {
        let Some(media) = self.media.as_mut() else {
            tracing::error!(error = %PlayerError::ResourceUnavailable, "cannot pause playback");
            return;
        };
        if self.state != PlaybackState::Playing {
            tracing::warn!(state = %self.state, "pause ignored");
            return;
        }

        observer.on_pause(&mut PlaybackContext::new(media));
        transition(&mut self.state, PlaybackState::Idle, observer);
        media.stop();
    }

    /// Drains pending media events and applies them. Returns the number of
    /// events handled.
    pub fn pump(&mut self, observer: &mut dyn PlaybackObserver) -> usize {
        let mut handled = 0;
        loop {
            let Some(media) = self.media.as_mut() else {
                break;
            };
            let Some(event) = media.poll_event() else {
                break;
            };
            handled += 1;

            match (event, self.state) {
                (MediaEvent::Started, PlaybackState::Loading) => {
                    transition(&mut self.state, PlaybackState::Playing, observer);
                    observer.on_play(&mut PlaybackContext::new(media));
                }
                (MediaEvent::StartFailed(reason), PlaybackState::Loading)
                | (MediaEvent::Error(reason), PlaybackState::Loading) => {
                    self.report_start_failure(PlayerError::PlaybackStart(reason), observer);
                }
                (MediaEvent::Ended, PlaybackState::Playing) => {
                    tracing::debug!(uri = media.uri(), "playback ended");
                    transition(&mut self.state, PlaybackState::Idle, observer);
                    observer.on_ended(&mut PlaybackContext::new(media));
                }
                (MediaEvent::Error(reason), PlaybackState::Playing) => {
                    let error = PlayerError::Runtime(reason);
                    tracing::error!(%error, uri = media.uri(), "audio playback failed");
                    transition(&mut self.state, PlaybackState::Idle, observer);
                    observer.on_error(&error, &mut PlaybackContext::new(media));
                }
                (event, state) => {
                    tracing::debug!(?event, %state, "dropping stale media event");
                }
            }
        }
        handled
    }

    /// Stops and releases the media regardless of state. Safe to call twice.
    pub fn dispose(&mut self) {
        if let Some(mut media) = self.media.take() {
            media.stop();
            tracing::debug!(uri = media.uri(), "released media");
        }
        self.state = PlaybackState::Idle;
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            is_paused: self.state != PlaybackState::Playing,
            is_looping: self.looping,
            is_loading: self.state == PlaybackState::Loading,
        }
    }

    /// Toggle semantics: checked while playing.
    pub fn is_checked(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn label(&self) -> &str {
        self.labels.label_for(self.state)
    }

    /// Renders the control's content with the caller's builder, or the
    /// default label when there is none.
    pub fn render_children<F>(&self, builder: Option<F>) -> String
    where
        F: FnOnce(PlayerView) -> String,
    {
        match builder {
            Some(builder) => builder(self.view()),
            None => self.label().to_string(),
        }
    }

    fn report_start_failure(&mut self, error: PlayerError, observer: &mut dyn PlaybackObserver) {
        tracing::error!(%error, "failed to start audio playback");
        transition(&mut self.state, PlaybackState::Errored, observer);
        if let Some(media) = self.media.as_mut() {
            observer.on_error(&error, &mut PlaybackContext::new(media));
        }
        transition(&mut self.state, PlaybackState::Idle, observer);
    }
}

impl<M: MediaResource> Drop for PlaybackController<M> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<M: MediaResource> fmt::Debug for PlaybackController<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("uri", &self.media.as_ref().map(|media| media.uri().to_string()))
            .field("state", &self.state)
            .field("looping", &self.looping)
            .finish()
    }
}

fn transition(
    state: &mut PlaybackState,
    next: PlaybackState,
    observer: &mut dyn PlaybackObserver,
) {
    let from = *state;
    debug_assert!(
        from.can_transition_to(next),
        "illegal playback transition {from} -> {next}"
    );
    tracing::debug!(%from, to = %next, "playback state changed");
    *state = next;
    observer.on_state_change(from, next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Note, Recorder, SpyMedia};
    use crate::BufferedMedia;

    fn controller(len: usize) -> PlaybackController<BufferedMedia> {
        let media = BufferedMedia::new("memory:playback", vec![0.2; len], 100);
        PlaybackController::mount(media, &PlayerConfig::default())
    }

    #[test]
    fn play_goes_through_loading() {
        let mut player = controller(100);
        let mut recorder = Recorder::default();

        player.toggle_play_pause(&mut recorder);
        assert_eq!(player.state(), PlaybackState::Loading);
        assert!(recorder.notes.iter().all(|note| *note != Note::Play));

        assert_eq!(player.pump(&mut recorder), 1);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(recorder.count(&Note::Play), 1);
        assert!(!player.media().unwrap().is_paused());
    }

    #[test]
    fn toggle_sequences_follow_allowed_edges() {
        let mut player = controller(30);
        let mut recorder = Recorder::default();

        for round in 0..6 {
            if round == 3 {
                player
                    .media_mut()
                    .unwrap()
                    .reject_next_start("blocked by autoplay policy");
            }
            player.toggle_play_pause(&mut recorder);
            player.pump(&mut recorder);
            player.toggle_play_pause(&mut recorder);
            player.pump(&mut recorder);
        }

        assert!(!recorder.transitions.is_empty());
        for (from, to) in &recorder.transitions {
            assert!(from.can_transition_to(*to), "{from} -> {to}");
        }
        assert!(!recorder
            .transitions
            .contains(&(PlaybackState::Idle, PlaybackState::Playing)));
        assert!(recorder
            .transitions
            .contains(&(PlaybackState::Loading, PlaybackState::Errored)));
    }

    #[test]
    fn rejected_start_reports_and_returns_to_idle() {
        let mut player = controller(100);
        player.media_mut().unwrap().reject_next_start("not allowed");
        let mut recorder = Recorder::default();

        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(recorder.count(&Note::Play), 0);
        assert_eq!(recorder.count(&Note::Error("failed to start playback: not allowed".into())), 1);
        assert_eq!(
            recorder.transitions,
            vec![
                (PlaybackState::Idle, PlaybackState::Loading),
                (PlaybackState::Loading, PlaybackState::Errored),
                (PlaybackState::Errored, PlaybackState::Idle),
            ]
        );
    }

    #[test]
    fn synchronous_refusal_is_a_start_failure() {
        let (media, log) = SpyMedia::refusing("device busy");
        let mut player = PlaybackController::mount(media, &PlayerConfig::default());
        let mut recorder = Recorder::default();

        player.toggle_play_pause(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(recorder.count(&Note::Play), 0);
        assert!(recorder
            .notes
            .iter()
            .any(|note| matches!(note, Note::Error(message) if message.contains("device busy"))));
        assert_eq!(log.starts.get(), 1);
    }

    #[test]
    fn events_that_do_not_fit_the_state_are_dropped() {
        let (media, _log) = SpyMedia::new();
        let mut player = PlaybackController::mount(media, &PlayerConfig::default());
        let mut recorder = Recorder::default();

        let media = player.media_mut().unwrap();
        media.push_event(MediaEvent::Ended);
        media.push_event(MediaEvent::Error("late failure".into()));
        media.push_event(MediaEvent::Started);

        assert_eq!(player.pump(&mut recorder), 3);
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(recorder.notes.is_empty());
        assert!(recorder.transitions.is_empty());
    }

    #[test]
    fn media_error_while_playing_reports_a_runtime_error() {
        let (media, _log) = SpyMedia::new();
        let mut player = PlaybackController::mount(media, &PlayerConfig::default());
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);
        assert_eq!(player.state(), PlaybackState::Playing);

        player
            .media_mut()
            .unwrap()
            .push_event(MediaEvent::Error("device unplugged".into()));
        assert_eq!(player.pump(&mut recorder), 1);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(
            recorder.count(&Note::Error("playback error: device unplugged".into())),
            1
        );
    }

    #[test]
    fn pause_notifies_before_stopping() {
        let mut player = controller(100);
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);
        recorder.clear();

        player.toggle_play_pause(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.media().unwrap().is_paused());
        assert_eq!(
            recorder.notes,
            vec![
                Note::Pause { media_was_paused: false },
                Note::State(PlaybackState::Playing, PlaybackState::Idle),
            ]
        );
    }

    #[test]
    fn natural_end_is_not_a_pause() {
        let mut player = controller(10);
        player.media_mut().unwrap().set_looping(false);
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);

        player
            .media_mut()
            .unwrap()
            .advance(std::time::Duration::from_secs(1))
            .unwrap();
        player.pump(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(recorder.count(&Note::Ended), 1);
        assert!(!recorder
            .notes
            .iter()
            .any(|note| matches!(note, Note::Pause { .. })));
    }

    #[test]
    fn runtime_error_stops_and_reports() {
        let mut player = controller(100);
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);

        player.media_mut().unwrap().fail("decoder crashed");
        player.pump(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(
            recorder.count(&Note::Error("playback error: decoder crashed".into())),
            1
        );
        assert!(recorder
            .transitions
            .contains(&(PlaybackState::Playing, PlaybackState::Idle)));
    }

    #[test]
    fn toggle_while_loading_is_ignored() {
        let mut player = controller(100);
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.toggle_play_pause(&mut recorder);

        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(recorder.transitions.len(), 1);
    }

    #[test]
    fn dispose_stops_media_once_and_is_idempotent() {
        let (media, log) = SpyMedia::new();
        let mut player = PlaybackController::mount(media, &PlayerConfig::default());
        let mut recorder = Recorder::default();
        player.toggle_play_pause(&mut recorder);
        player.pump(&mut recorder);

        player.dispose();
        player.dispose();
        drop(player);

        assert_eq!(log.stops.get(), 1);
    }

    #[test]
    fn dispose_stops_media_even_when_idle() {
        let (media, log) = SpyMedia::new();
        let player = PlaybackController::mount(media, &PlayerConfig::default());
        drop(player);
        assert_eq!(log.stops.get(), 1);
    }

    #[test]
    fn toggle_without_media_is_a_noop() {
        let mut player = controller(100);
        player.dispose();
        let mut recorder = Recorder::default();

        player.toggle_play_pause(&mut recorder);
        player.play(&mut recorder);
        player.pause(&mut recorder);

        assert!(!player.is_mounted());
        assert!(recorder.notes.is_empty());
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn view_and_labels_track_state() {
        let mut player = controller(100);
        assert_eq!(player.label(), "Play");
        assert!(player.view().is_paused);
        assert!(player.view().is_looping);
        assert!(!player.is_checked());

        player.toggle_play_pause(&mut ());
        assert_eq!(player.label(), "Loading…");
        assert!(player.view().is_loading);

        player.pump(&mut ());
        assert_eq!(player.label(), "Pause");
        assert!(!player.view().is_paused);
        assert!(player.is_checked());
    }

    #[test]
    fn children_builder_receives_view() {
        let player = controller(100);
        assert_eq!(player.render_children(None::<fn(PlayerView) -> String>), "Play");

        let rendered = player.render_children(Some(|view: PlayerView| {
            format!("paused={} looping={}", view.is_paused, view.is_looping)
        }));
        assert_eq!(rendered, "paused=true looping=true");
    }

    #[test]
    fn callback_observer_forwards_events() {
        use std::{cell::RefCell, rc::Rc};

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (play_log, pause_log) = (seen.clone(), seen.clone());
        let mut callbacks = CallbackObserver::new()
            .handle_play(move |ctx| play_log.borrow_mut().push(format!("play {}", ctx.uri())))
            .handle_pause(move |_| pause_log.borrow_mut().push("pause".to_string()));

        let mut player = controller(100);
        player.toggle_play_pause(&mut callbacks);
        player.pump(&mut callbacks);
        player.toggle_play_pause(&mut callbacks);

        assert_eq!(
            *seen.borrow(),
            vec!["play memory:playback".to_string(), "pause".to_string()]
        );
    }
}
