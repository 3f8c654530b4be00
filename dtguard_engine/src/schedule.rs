/// Browser lifecycle events that warrant an opportunistic recheck. Geometry
/// and console state settle asynchronously after these, hence the delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Resize,
    FocusGained,
    FocusLost,
    VisibilityVisible,
    VisibilityHidden,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SchedulerCfg {
    /// Periodic re-evaluation interval.
    pub interval_ms: u64,
    pub resize_debounce_ms: u64,
    pub focus_delay_ms: u64,
    pub visibility_delay_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval_ms: 800,
            resize_debounce_ms: 150,
            focus_delay_ms: 300,
            visibility_delay_ms: 500,
        }
    }
}

impl SchedulerCfg {
    pub fn aggressive() -> Self {
        Self {
            interval_ms: 200,
            ..Self::default()
        }
    }
}

/// Deadline bookkeeping for the single "re-evaluate now" funnel.
///
/// One periodic deadline plus at most one pending opportunistic recheck.
/// Firing re-arms the periodic deadline at the end of the same poll, so
/// ticks never overlap or re-enter.
#[derive(Debug)]
pub struct Scheduler {
    cfg: SchedulerCfg,
    next_poll_ms: u64,
    pending_ms: Option<u64>,
    armed: bool,
}

impl Scheduler {
    pub fn new(cfg: SchedulerCfg, now_ms: u64) -> Self {
        Self {
            cfg,
            next_poll_ms: now_ms.saturating_add(cfg.interval_ms),
            pending_ms: None,
            armed: true,
        }
    }

    pub fn cfg(&self) -> &SchedulerCfg {
        &self.cfg
    }

    /// Record a lifecycle event. Repeated resizes push the pending deadline
    /// back (debounce); hidden pages schedule nothing.
    pub fn note_event(&mut self, ev: LifecycleEvent, now_ms: u64) {
        if !self.armed {
            return;
        }
        let delay = match ev {
            LifecycleEvent::Resize => self.cfg.resize_debounce_ms,
            LifecycleEvent::FocusGained | LifecycleEvent::FocusLost => self.cfg.focus_delay_ms,
            LifecycleEvent::VisibilityVisible => self.cfg.visibility_delay_ms,
            LifecycleEvent::VisibilityHidden => return,
        };
        self.pending_ms = Some(now_ms.saturating_add(delay));
    }

    /// True when a recheck is due. Consumes the pending slot and re-arms the
    /// periodic deadline.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.armed {
            return false;
        }
        let periodic_due = now_ms >= self.next_poll_ms;
        let pending_due = self.pending_ms.is_some_and(|t| now_ms >= t);
        if !periodic_due && !pending_due {
            return false;
        }
        if pending_due {
            self.pending_ms = None;
        }
        self.next_poll_ms = now_ms.saturating_add(self.cfg.interval_ms);
        true
    }

    /// Drop all deadlines. Used on shutdown.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.pending_ms = None;
    }
}
