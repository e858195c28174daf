use std::fmt;

use crate::{
    config::VisualizerConfig,
    render::{layout_bars, Bar, Canvas},
    theme::{resolve_color, StaticTheme, ThemeLookup},
    AnalysisGraph, AudioHost, FrameHandle, FrameScheduler, GraphSlot, PlaybackContext,
    PlaybackObserver, PlayerError,
};

/// Row of spectrum bars that runs while playback runs.
///
/// The analysis graph is built on the first play and then kept across pauses,
/// because a media resource cannot be routed into a second graph. It is
/// released only by [`SpectrumVisualizer::dispose`].
pub struct SpectrumVisualizer<C: Canvas> {
    config: VisualizerConfig,
    host: AudioHost,
    graph: GraphSlot,
    frames: FrameScheduler,
    pending: Option<FrameHandle>,
    canvas: Option<C>,
    theme: Box<dyn ThemeLookup>,
    collapsed: bool,
    last_bars: Vec<Bar>,
    frames_painted: u64,
}

impl<C: Canvas> SpectrumVisualizer<C> {
    pub fn new(canvas: C, config: VisualizerConfig) -> Self {
        Self {
            config,
            host: AudioHost::global(),
            graph: GraphSlot::Absent,
            frames: FrameScheduler::new(),
            pending: None,
            canvas: Some(canvas),
            theme: Box::new(StaticTheme::new()),
            collapsed: true,
            last_bars: Vec::new(),
            frames_painted: 0,
        }
    }

    pub fn with_host(mut self, host: AudioHost) -> Self {
        self.host = host;
        self
    }

    pub fn with_theme(mut self, theme: impl ThemeLookup + 'static) -> Self {
        self.theme = Box::new(theme);
        self
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Whether a frame is scheduled.
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Frame requests queued on the scheduler. Never more than one.
    pub fn outstanding_frames(&self) -> usize {
        self.frames.pending()
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_present()
    }

    pub fn is_disposed(&self) -> bool {
        self.graph.is_released()
    }

    pub fn canvas(&self) -> Option<&C> {
        self.canvas.as_ref()
    }

    pub fn canvas_mut(&mut self) -> Option<&mut C> {
        self.canvas.as_mut()
    }

    pub fn attach_canvas(&mut self, canvas: C) -> Option<C> {
        self.canvas.replace(canvas)
    }

    pub fn detach_canvas(&mut self) -> Option<C> {
        self.canvas.take()
    }

    /// Bars painted by the most recent frame.
    pub fn last_bars(&self) -> &[Bar] {
        &self.last_bars
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    /// Fires the frame that is due on this refresh, if any. Returns whether
    /// bars were painted.
    pub fn run_due_frame(&mut self) -> bool {
        match self.frames.take_due() {
            Some(handle) => self.run_frame(handle),
            None => false,
        }
    }

    /// Paints one frame and schedules the next. Handles other than the
    /// outstanding one are ignored. A missing canvas or graph makes the frame
    /// a silent no-op that does not reschedule.
    pub fn run_frame(&mut self, handle: FrameHandle) -> bool {
        if self.pending != Some(handle) {
            tracing::debug!(frame = handle.id(), "ignoring stale frame");
            return false;
        }
        self.pending = None;

        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        let Some(graph) = self.graph.graph_mut() else {
            return false;
        };
        let frame = match graph.read_frame() {
            Ok(frame) => frame,
            Err(error) => {
                tracing::debug!(%error, "analyser unavailable, skipping frame");
                return false;
            }
        };

        let width = canvas.width();
        let height = canvas.height();
        canvas.clear_rect(0.0, 0.0, width, height);
        canvas.set_image_smoothing(true);

        let color = resolve_color(
            &*self.theme,
            &self.config.color_variable,
            &self.config.fallback_color,
        );
        canvas.set_fill_style(&color);

        let bars = layout_bars(&frame, width, height, &self.config);
        for bar in &bars {
            canvas.fill_rect(bar.x, bar.y, bar.width, bar.height);
        }
        self.last_bars = bars;
        self.frames_painted += 1;

        self.schedule_next();
        true
    }

    /// Cancels the running loop, releases the analysis graph and drops the
    /// canvas. Calling it again does nothing.
    pub fn dispose(&mut self) {
        self.cancel_pending();
        if self.graph.release() {
            tracing::debug!(frames = self.frames_painted, "released analysis graph");
        }
        self.canvas = None;
        self.collapsed = true;
    }

    fn schedule_next(&mut self) {
        self.cancel_pending();
        let handle = self.frames.request();
        tracing::trace!(frame = handle.id(), "scheduled frame");
        self.pending = Some(handle);
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.frames.cancel(handle);
        }
    }

    fn collapse(&mut self) {
        self.cancel_pending();
        self.collapsed = true;
    }
}

impl<C: Canvas> PlaybackObserver for SpectrumVisualizer<C> {
    fn on_play(&mut self, ctx: &mut PlaybackContext<'_>) {
        let host = &self.host;
        let config = &self.config;
        let connected = self
            .graph
            .get_or_connect(|| AnalysisGraph::connect(host, ctx.media(), config))
            .map(|_| ());

        match connected {
            Ok(_) => {
                self.collapsed = false;
                self.schedule_next();
            }
            Err(PlayerError::GraphReleased) => {
                tracing::warn!("visualizer has been disposed, ignoring play");
            }
            Err(error) => {
                tracing::error!(%error, uri = ctx.uri(), "could not build analysis graph");
            }
        }
    }

    fn on_pause(&mut self, _ctx: &mut PlaybackContext<'_>) {
        self.collapse();
    }

    fn on_ended(&mut self, _ctx: &mut PlaybackContext<'_>) {
        self.collapse();
    }

    fn on_error(&mut self, _error: &PlayerError, _ctx: &mut PlaybackContext<'_>) {
        self.collapse();
    }
}

impl<C: Canvas> Drop for SpectrumVisualizer<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<C: Canvas> fmt::Debug for SpectrumVisualizer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumVisualizer")
            .field("graph", &self.graph)
            .field("pending", &self.pending)
            .field("has_canvas", &self.canvas.is_some())
            .field("collapsed", &self.collapsed)
            .field("frames_painted", &self.frames_painted)
            .finish()
    }
}
