use log::debug;

/// Coalesces overlay redraw requests to at most one redraw per tick.
///
/// Requests made between ticks replace one another; only the fact that a
/// redraw is pending survives.
#[derive(Clone, Debug, Default)]
pub struct RedrawScheduler {
    pending: bool,
    /// Requests made while a redraw was already pending.
    coalesced: u64,
    /// Redraws granted so far.
    fired: u64,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Default::default()
    }

    /// Asks for a redraw on the next tick.
    pub fn request(&mut self) {
        if self.pending {
            self.coalesced += 1;
        }
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Called once per rendering tick. Returns whether to redraw.
    pub fn tick(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.fired += 1;
        if self.coalesced > 0 && self.fired % 600 == 0 {
            debug!(
                "{} redraws, {} requests coalesced",
                self.fired, self.coalesced
            );
        }
        true
    }

    /// The number of requests absorbed by an already pending redraw.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// The number of redraws granted.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_redraw_per_tick() {
        let mut scheduler = RedrawScheduler::new();
        assert!(!scheduler.tick());
        for _ in 0..5 {
            scheduler.request();
        }
        assert!(scheduler.tick());
        assert!(!scheduler.tick());
        assert_eq!(scheduler.fired(), 1);
        assert_eq!(scheduler.coalesced(), 4);
    }

    #[test]
    fn requests_after_tick_fire_again() {
        let mut scheduler = RedrawScheduler::new();
        scheduler.request();
        assert!(scheduler.tick());
        scheduler.request();
        assert!(scheduler.is_pending());
        assert!(scheduler.tick());
        assert_eq!(scheduler.coalesced(), 0);
    }
}
