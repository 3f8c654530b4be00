use crate::cfg::GuardCfg;

/// Reason stamped on a hysteresis-confirmed close.
pub const QUIET_REASON: &str = "confirmed-quiet";

/// Emitted on every belief flip, and only on a flip.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transition {
    pub open: bool,
    pub reason: String,
    pub at_ms: u64,
}

/// The single mutable record of detection status.
///
/// Opening is immediate on a positive decision; closing requires
/// `close_confirmations` quiet passes, each spaced by `close_delay_ms`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct BeliefState {
    pub open: bool,
    pub reason: String,
    pub last_changed_ms: u64,
    /// Confirming quiet passes counted so far while open.
    pub close_streak: u32,
    /// Timestamp of the last counted confirming pass.
    pub last_confirm_ms: u64,
}

impl BeliefState {
    /// Apply one fusion decision. Returns a transition only on an actual flip;
    /// a repeated identical decision is a no-op, except that a non-empty
    /// reason always re-stamps `reason`.
    pub fn apply(
        &mut self,
        open: bool,
        reason: &str,
        confirmed_quiet: bool,
        now_ms: u64,
        cfg: &GuardCfg,
    ) -> Option<Transition> {
        if open {
            // Any positive decision resets the closing streak.
            self.close_streak = 0;
            self.last_confirm_ms = 0;
            if self.open {
                if !reason.is_empty() {
                    self.reason = reason.to_string();
                }
                return None;
            }
            return Some(self.flip(true, reason, now_ms));
        }

        if !self.open {
            return None;
        }

        if !confirmed_quiet {
            // A probe still fired, just below the opening bar.
            self.close_streak = 0;
            return None;
        }

        if cfg.hyst_disable {
            return Some(self.flip(false, reason, now_ms));
        }

        // Count this pass only if enough time separates it from the last
        // counted one; earlier passes neither count nor reset.
        if self.close_streak == 0
            || now_ms.saturating_sub(self.last_confirm_ms) >= cfg.close_delay_ms
        {
            self.close_streak += 1;
            self.last_confirm_ms = now_ms;
        }

        if self.close_streak >= cfg.close_confirmations {
            return Some(self.flip(false, reason, now_ms));
        }
        None
    }

    /// Explicit override. Same event contract: a non-empty reason always
    /// re-stamps, an event fires only on a value flip.
    pub fn force(&mut self, open: bool, reason: &str, now_ms: u64) -> Option<Transition> {
        if self.open == open {
            if !reason.is_empty() {
                self.reason = reason.to_string();
            }
            return None;
        }
        self.close_streak = 0;
        self.last_confirm_ms = 0;
        Some(self.flip(open, reason, now_ms))
    }

    fn flip(&mut self, open: bool, reason: &str, now_ms: u64) -> Transition {
        self.open = open;
        self.reason = if !reason.is_empty() {
            reason.to_string()
        } else if open {
            String::new()
        } else {
            QUIET_REASON.to_string()
        };
        self.last_changed_ms = now_ms;
        self.close_streak = 0;
        self.last_confirm_ms = 0;
        Transition {
            open,
            reason: self.reason.clone(),
            at_ms: now_ms,
        }
    }
}
