use std::fmt;

use crate::{
    config::AppConfig, render::Canvas, MediaResource, ObserverSet, PlaybackController,
    PlaybackObserver, PlaybackState, PlayerView, SpectrumVisualizer,
};

/// Playback control with its spectrum bars attached.
///
/// The visualiser hears about every playback event before any listener
/// registered with [`SpectrumPlayer::subscribe`].
pub struct SpectrumPlayer<M: MediaResource, C: Canvas> {
    controller: PlaybackController<M>,
    visualizer: SpectrumVisualizer<C>,
    listeners: ObserverSet,
}

impl<M: MediaResource, C: Canvas> SpectrumPlayer<M, C> {
    pub fn new(controller: PlaybackController<M>, visualizer: SpectrumVisualizer<C>) -> Self {
        Self {
            controller,
            visualizer,
            listeners: ObserverSet::new(),
        }
    }

    /// Mounts `media` and `canvas` with the given configuration, using the
    /// process-wide audio host.
    pub fn mount(media: M, canvas: C, config: &AppConfig) -> Self {
        Self::new(
            PlaybackController::mount(media, &config.player),
            SpectrumVisualizer::new(canvas, config.visualizer.clone()),
        )
    }

    pub fn subscribe(&mut self, observer: impl PlaybackObserver + 'static) {
        self.listeners.subscribe(Box::new(observer));
    }

    /// The user pressed the control.
    pub fn toggle(&mut self) {
        let mut observers = (&mut self.visualizer, &mut self.listeners);
        self.controller.toggle_play_pause(&mut observers);
    }

    /// Applies pending media events. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut observers = (&mut self.visualizer, &mut self.listeners);
        self.controller.pump(&mut observers)
    }

    /// Runs the frame due on this display refresh.
    pub fn run_due_frame(&mut self) -> bool {
        self.visualizer.run_due_frame()
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn label(&self) -> &str {
        self.controller.label()
    }

    pub fn view(&self) -> PlayerView {
        self.controller.view()
    }

    pub fn is_collapsed(&self) -> bool {
        self.visualizer.is_collapsed()
    }

    pub fn controller(&self) -> &PlaybackController<M> {
        &self.controller
    }

    pub fn visualizer(&self) -> &SpectrumVisualizer<C> {
        &self.visualizer
    }

    pub fn visualizer_mut(&mut self) -> &mut SpectrumVisualizer<C> {
        &mut self.visualizer
    }

    pub fn media_mut(&mut self) -> Option<&mut M> {
        self.controller.media_mut()
    }

    pub fn canvas_mut(&mut self) -> Option<&mut C> {
        self.visualizer.canvas_mut()
    }

    /// Tears down the bars first, then the media. Safe to call twice.
    pub fn dispose(&mut self) {
        self.visualizer.dispose();
        self.controller.dispose();
    }
}

impl<M: MediaResource, C: Canvas> Drop for SpectrumPlayer<M, C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<M: MediaResource, C: Canvas> fmt::Debug for SpectrumPlayer<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumPlayer")
            .field("controller", &self.controller)
            .field("visualizer", &self.visualizer)
            .field("listeners", &self.listeners)
            .finish()
    }
}
