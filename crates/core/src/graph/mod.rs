use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
};

use crate::{
    config::VisualizerConfig, FrequencyAnalyzer, FrequencyFrame, MediaResource, PlayerError,
    Result,
};

/// Number of processing sessions a host keeps alive at once unless told
/// otherwise.
pub const DEFAULT_SESSION_LIMIT: usize = 6;

/// Process-scoped audio processing host. Sessions are scarce, so the host
/// caps how many may be open at the same time.
#[derive(Clone)]
pub struct AudioHost {
    shared: Arc<HostCounters>,
}

struct HostCounters {
    limit: usize,
    live: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl AudioHost {
    pub fn new(limit: usize) -> Self {
        Self {
            shared: Arc::new(HostCounters {
                limit,
                live: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    /// Host shared by every player in the process.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<AudioHost> = OnceLock::new();
        GLOBAL
            .get_or_init(|| AudioHost::new(DEFAULT_SESSION_LIMIT))
            .clone()
    }

    pub fn open_session(&self) -> Result<AudioSession> {
        let counters = &self.shared;
        counters
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < counters.limit).then_some(live + 1)
            })
            .map_err(|_| PlayerError::SessionLimit {
                limit: counters.limit,
            })?;
        counters.opened.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(live = self.live_sessions(), "opened audio session");

        Ok(AudioSession {
            host: self.clone(),
            open: true,
        })
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn live_sessions(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Total number of sessions ever opened on this host.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::Acquire)
    }

    /// Total number of sessions ever closed on this host.
    pub fn sessions_closed(&self) -> usize {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for AudioHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioHost")
            .field("limit", &self.limit())
            .field("live", &self.live_sessions())
            .finish()
    }
}

/// Live processing context. Closing is idempotent and also happens on drop.
#[derive(Debug)]
pub struct AudioSession {
    host: AudioHost,
    open: bool,
}

impl AudioSession {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let counters = &self.host.shared;
        counters.live.fetch_sub(1, Ordering::AcqRel);
        counters.closed.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(live = self.host.live_sessions(), "closed audio session");
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Source tap, analyser and output wired together inside one session.
#[derive(Debug)]
pub struct AnalysisGraph {
    session: AudioSession,
    analyzer: FrequencyAnalyzer,
}

impl AnalysisGraph {
    /// Opens a session and routes `media` through a new analyser. Fails if
    /// the media already feeds another graph or the host is out of sessions.
    pub fn connect(
        host: &AudioHost,
        media: &mut dyn MediaResource,
        config: &VisualizerConfig,
    ) -> Result<Self> {
        let session = host.open_session()?;
        let tap = media.tap()?;
        let analyzer = FrequencyAnalyzer::from_config(tap, config)?;
        tracing::debug!(uri = media.uri(), fft_size = config.fft_size, "connected analysis graph");
        Ok(Self { session, analyzer })
    }

    pub fn analyzer(&self) -> &FrequencyAnalyzer {
        &self.analyzer
    }

    pub fn read_frame(&mut self) -> Result<FrequencyFrame> {
        self.analyzer.read_frame()
    }

    pub fn close(mut self) {
        self.session.close();
    }
}

/// Ownership slot for the single graph a visualiser may build.
#[derive(Debug, Default)]
pub enum GraphSlot {
    #[default]
    Absent,
    Present(AnalysisGraph),
    Released,
}

impl GraphSlot {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }

    pub fn graph_mut(&mut self) -> Option<&mut AnalysisGraph> {
        match self {
            Self::Present(graph) => Some(graph),
            Self::Absent | Self::Released => None,
        }
    }

    /// Returns the graph, building it on first use. A released slot never
    /// builds again.
    pub fn get_or_connect(
        &mut self,
        connect: impl FnOnce() -> Result<AnalysisGraph>,
    ) -> Result<&mut AnalysisGraph> {
        if self.is_released() {
            return Err(PlayerError::GraphReleased);
        }
        if !self.is_present() {
            *self = Self::Present(connect()?);
        }
        self.graph_mut().ok_or(PlayerError::GraphReleased)
    }

    /// Closes the graph if one was built and marks the slot released.
    /// Returns whether a graph was closed by this call.
    pub fn release(&mut self) -> bool {
        match std::mem::replace(self, Self::Released) {
            Self::Present(graph) => {
                graph.close();
                true
            }
            Self::Absent | Self::Released => false,
        }
    }
}
