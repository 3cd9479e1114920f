//! Window resize coordination
//!
//! Resizes and stale-surface reports funnel into one state machine so
//! that window-extent-dependent state is rebuilt exactly once per
//! resize, never mid-frame, and only after every in-flight frame has
//! drained. The renderer polls the coordinator at the top of each frame
//! and drives the drain/rebuild itself; window callbacks only ever call
//! [`ResizeCoordinator::notify_resize`].

use super::handles::Extent2d;

/// Where the pipeline is in the resize lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    /// Frames render normally
    Normal,
    /// A rebuild is pending; in-flight frames are being drained
    Draining,
    /// Extent-dependent state is being destroyed and recreated
    Rebuilding,
}

/// Serializes resize events against the frame loop
#[derive(Debug)]
pub struct ResizeCoordinator {
    state: ResizeState,
    // Extent reported by the window system; None when the rebuild was
    // triggered by a stale surface and the device must be asked.
    pending_extent: Option<Extent2d>,
}

impl ResizeCoordinator {
    /// Start in the normal state with no pending rebuild
    pub fn new() -> Self {
        Self {
            state: ResizeState::Normal,
            pending_extent: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ResizeState {
        self.state
    }

    /// Whether a rebuild is pending or underway
    pub fn rebuild_pending(&self) -> bool {
        self.state != ResizeState::Normal
    }

    /// Record a window-system resize report
    ///
    /// Repeated reports before the rebuild runs coalesce; only the last
    /// extent matters.
    pub fn notify_resize(&mut self, extent: Extent2d) {
        log::debug!("resize reported: {}x{}", extent.width, extent.height);
        self.pending_extent = Some(extent);
        if self.state == ResizeState::Normal {
            self.state = ResizeState::Draining;
        }
    }

    /// Record a stale surface (out-of-date acquire or present)
    ///
    /// The new extent is unknown here; the rebuild queries the device.
    pub fn notify_stale(&mut self) {
        if self.state == ResizeState::Normal {
            log::warn!("stale surface; scheduling target rebuild");
            self.state = ResizeState::Draining;
        }
    }

    /// The extent to rebuild at, falling back to what the device reports
    pub fn target_extent(&self, surface_extent: Extent2d) -> Extent2d {
        self.pending_extent.unwrap_or(surface_extent)
    }

    /// Mark the drain complete and the rebuild underway
    ///
    /// Only valid from `Draining`; the renderer calls this after the
    /// ledger's fences have all signaled.
    pub fn begin_rebuild(&mut self) {
        debug_assert_eq!(self.state, ResizeState::Draining);
        self.state = ResizeState::Rebuilding;
    }

    /// Mark the rebuild complete and resume normal rendering
    pub fn finish_rebuild(&mut self) {
        self.pending_extent = None;
        self.state = ResizeState::Normal;
    }
}

impl Default for ResizeCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_enters_draining() {
        let mut coordinator = ResizeCoordinator::new();
        assert_eq!(coordinator.state(), ResizeState::Normal);
        coordinator.notify_resize(Extent2d::new(800, 600));
        assert_eq!(coordinator.state(), ResizeState::Draining);
    }

    #[test]
    fn test_repeated_resizes_coalesce_to_last_extent() {
        let mut coordinator = ResizeCoordinator::new();
        coordinator.notify_resize(Extent2d::new(800, 600));
        coordinator.notify_resize(Extent2d::new(1024, 768));
        let fallback = Extent2d::new(1, 1);
        assert_eq!(coordinator.target_extent(fallback), Extent2d::new(1024, 768));
    }

    #[test]
    fn test_stale_surface_queries_device_extent() {
        let mut coordinator = ResizeCoordinator::new();
        coordinator.notify_stale();
        assert_eq!(coordinator.state(), ResizeState::Draining);
        let surface = Extent2d::new(640, 480);
        assert_eq!(coordinator.target_extent(surface), surface);
    }

    #[test]
    fn test_full_lifecycle_returns_to_normal() {
        let mut coordinator = ResizeCoordinator::new();
        coordinator.notify_resize(Extent2d::new(800, 600));
        coordinator.begin_rebuild();
        assert_eq!(coordinator.state(), ResizeState::Rebuilding);
        coordinator.finish_rebuild();
        assert_eq!(coordinator.state(), ResizeState::Normal);
        assert_eq!(
            coordinator.target_extent(Extent2d::new(1, 1)),
            Extent2d::new(1, 1)
        );
    }
}
