//! Core library for the Spectrum Player.
//!
//! A [`PlaybackController`] toggles a single [`MediaResource`] and reports
//! what happened to its observers. A [`SpectrumVisualizer`] is one such
//! observer: on play it routes the media through an [`AnalysisGraph`] and
//! runs a frame loop that paints a row of frequency bars; on pause it stops
//! the loop and collapses. [`SpectrumPlayer`] wires the two together.

pub mod analysis;
pub mod config;
pub mod error;
pub mod graph;
pub mod media;
pub mod playback;
pub mod player;
pub mod render;
pub mod theme;
pub mod timeline;
pub mod visualizer;

#[cfg(test)]
mod testing;

pub use analysis::{FrequencyAnalyzer, FrequencyFrame, FRAME_LEN};
pub use config::{AppConfig, Labels, PlayerConfig, VisualizerConfig};
pub use error::{PlayerError, Result};
pub use graph::{AnalysisGraph, AudioHost, AudioSession, GraphSlot};
pub use media::{BufferedMedia, MediaEvent, MediaResource, SampleTap};
pub use playback::{
    CallbackObserver, ObserverSet, PlaybackContext, PlaybackController, PlaybackObserver,
    PlaybackState, PlayerView,
};
pub use player::SpectrumPlayer;
pub use render::{layout_bars, Bar, Canvas, Rgba, SoftwareCanvas};
pub use theme::{resolve_color, StaticTheme, ThemeLookup};
pub use timeline::{FrameHandle, FramePacer, FrameScheduler};
pub use visualizer::SpectrumVisualizer;
