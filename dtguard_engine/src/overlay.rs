use crate::events::{TamperEvent, TamperKind};
use crate::reaction::ReactionSink;

/// Supervised overlay resource.
///
/// Invariant enforced by `reconcile`: the overlay exists iff the belief is
/// open. External removal is reported once per removal and the overlay is
/// remounted after `self_heal_delay_ms`.
#[derive(Debug)]
pub struct OverlayGuard {
    desired: bool,
    self_heal_delay_ms: u64,
    missing_since: Option<u64>,
    reported: bool,
}

impl OverlayGuard {
    pub fn new(self_heal_delay_ms: u64) -> Self {
        Self {
            desired: false,
            self_heal_delay_ms,
            missing_since: None,
            reported: false,
        }
    }

    pub fn desired(&self) -> bool {
        self.desired
    }

    /// Set the desired state and immediately converge. Mounting twice is a
    /// no-op at this layer; the sink is only called on an actual change.
    pub fn set_desired(&mut self, desired: bool, sink: &mut dyn ReactionSink) {
        self.desired = desired;
        self.missing_since = None;
        self.reported = false;
        if desired {
            if !sink.overlay_mounted() {
                sink.mount_overlay();
            }
        } else if sink.overlay_mounted() {
            sink.remove_overlay();
        }
    }

    /// Reconcile actual DOM state to desired state. Returns a tamper event
    /// the first time an externally-removed overlay is observed.
    pub fn reconcile(
        &mut self,
        sink: &mut dyn ReactionSink,
        now_ms: u64,
    ) -> Option<TamperEvent> {
        if !self.desired {
            self.missing_since = None;
            self.reported = false;
            if sink.overlay_mounted() {
                sink.remove_overlay();
            }
            return None;
        }

        if sink.overlay_mounted() {
            self.missing_since = None;
            self.reported = false;
            return None;
        }

        // Desired but missing: someone tore it out.
        let since = *self.missing_since.get_or_insert(now_ms);
        let event = if !self.reported {
            self.reported = true;
            Some(TamperEvent {
                kind: TamperKind::OverlayRemoved,
                detail: None,
                at_ms: now_ms,
            })
        } else {
            None
        };

        if now_ms.saturating_sub(since) >= self.self_heal_delay_ms {
            sink.mount_overlay();
            self.missing_since = None;
            self.reported = false;
        }

        event
    }
}
