use std::time::Duration;

/// Token for a frame callback requested from a [`FrameScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Queue of requested frame callbacks, fired once per display refresh.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    requested: Vec<FrameHandle>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.requested.push(handle);
        handle
    }

    /// Cancels a request. Unknown or already fired handles are ignored.
    pub fn cancel(&mut self, handle: FrameHandle) {
        self.requested.retain(|requested| *requested != handle);
    }

    /// Pops the oldest request that is due on this refresh.
    pub fn take_due(&mut self) -> Option<FrameHandle> {
        if self.requested.is_empty() {
            None
        } else {
            Some(self.requested.remove(0))
        }
    }

    pub fn pending(&self) -> usize {
        self.requested.len()
    }
}

/// Turns elapsed wall time into display refreshes at a fixed rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    accumulated: Duration,
    time_seconds: f32,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::with_rate(60)
    }
}

impl FramePacer {
    pub fn with_rate(frames_per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / frames_per_second.clamp(1, 1000),
            accumulated: Duration::ZERO,
            time_seconds: 0.0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Seconds of wall time fed into the pacer so far.
    pub fn time_seconds(&self) -> f32 {
        self.time_seconds
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.time_seconds = 0.0;
    }

    /// Adds elapsed time and reports whether a refresh happened. Refreshes
    /// that fell behind collapse into one.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.time_seconds += delta.as_secs_f32();
        self.accumulated += delta;
        if self.accumulated < self.interval {
            return false;
        }
        self.accumulated = Duration::from_nanos(
            (self.accumulated.as_nanos() % self.interval.as_nanos()) as u64,
        );
        true
    }
}
