//! Decoded slices of a study, slice navigation and cine playback

use crate::dicom::Slice;
use crate::viewport::ViewportState;
use std::time::Duration;

/// How an index step behaves at the ends of the series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Stop at the first/last slice
    Clamp,
    /// Continue from the other end (cine)
    Wrap,
}

/// Ordered slots for every attempted file; failed decodes stay `None`
#[derive(Debug, Clone, Default)]
pub struct SliceStore {
    slots: Vec<Option<Slice>>,
}

impl SliceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `count` empty slots
    #[must_use]
    pub fn with_slots(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    #[must_use]
    pub fn from_slices(slices: Vec<Slice>) -> Self {
        Self {
            slots: slices.into_iter().map(Some).collect(),
        }
    }

    /// Fill slot `index`, growing the store if needed
    pub fn insert(&mut self, index: usize, slice: Slice) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(slice);
    }

    /// Append an empty slot (a file that could not be loaded)
    pub fn push_missing(&mut self) {
        self.slots.push(None);
    }

    pub fn push(&mut self, slice: Slice) {
        self.slots.push(Some(slice));
    }

    /// Number of slots, loaded or not; navigation ranges over these
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots holding a decoded slice
    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Slice> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Loaded slices in slot order with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Slice)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    /// Indices of slots without a slice
    #[must_use]
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_none().then_some(i))
            .collect()
    }

    /// Index reached from `current` after `delta` steps
    #[must_use]
    pub fn step(&self, current: usize, delta: i64, navigation: Navigation) -> usize {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        let count_i = count as i64;
        let current = (current.min(count - 1)) as i64;
        let next = match navigation {
            Navigation::Clamp => current.saturating_add(delta).clamp(0, count_i - 1),
            Navigation::Wrap => (current + delta.rem_euclid(count_i)).rem_euclid(count_i),
        };
        next as usize
    }

    /// Move `viewports[viewport_index]` by `delta` slices
    pub fn advance(
        &self,
        viewports: &mut [ViewportState],
        viewport_index: usize,
        delta: i64,
        navigation: Navigation,
    ) {
        if let Some(viewport) = viewports.get_mut(viewport_index) {
            let next = self.step(viewport.slice_index(), delta, navigation);
            viewport.set_slice(next, self.count());
        }
    }
}

/// Fixed-rate ticker driving cine playback
///
/// Time is fed in by the host event loop; the ticker reports how many frame
/// periods have elapsed since the last call.
#[derive(Debug, Clone, PartialEq)]
pub struct CineTicker {
    fps: f64,
    accumulated: Duration,
    running: bool,
}

impl Default for CineTicker {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl CineTicker {
    /// Upper bound on the frame rate
    pub const MAX_FPS: f64 = 60.0;

    #[must_use]
    pub fn new(fps: f64) -> Self {
        Self {
            fps: Self::clamp_fps(fps),
            accumulated: Duration::ZERO,
            running: false,
        }
    }

    fn clamp_fps(fps: f64) -> f64 {
        if fps.is_finite() {
            fps.clamp(0.1, Self::MAX_FPS)
        } else {
            5.0
        }
    }

    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time between two frames
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Start or restart from a fresh period
    pub fn start(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running = false;
    }

    /// Change the rate; a running ticker restarts its current period
    pub fn set_fps(&mut self, fps: f64) {
        self.fps = Self::clamp_fps(fps);
        self.accumulated = Duration::ZERO;
    }

    /// Account for `elapsed` time and return the whole frames it completed
    pub fn tick(&mut self, elapsed: Duration) -> u64 {
        if !self.running {
            return 0;
        }
        let accumulated = self.accumulated.saturating_add(elapsed).as_nanos();
        let period = self.period().as_nanos().max(1);
        // The remainder is below one period, so it fits
        self.accumulated = Duration::from_nanos(u64::try_from(accumulated % period).unwrap_or(u64::MAX));
        u64::try_from(accumulated / period).unwrap_or(u64::MAX)
    }
}
