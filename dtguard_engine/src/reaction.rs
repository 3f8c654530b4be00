use dtguard_core::Transition;

use crate::events::TamperEvent;
use crate::overlay::OverlayGuard;

/// Which reactions the guard drives. Supplied once at initialization.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ReactionConfig {
    pub blur_on_open: bool,
    pub show_banner: bool,
    pub show_badge: bool,
    pub block_network_on_open: bool,
    pub overlay_on_open: bool,
    pub block_mode: BlockMode,
    pub self_heal_delay_ms: u64,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            blur_on_open: true,
            show_banner: true,
            show_badge: true,
            block_network_on_open: false,
            overlay_on_open: false,
            block_mode: BlockMode::SynthesizedError,
            self_heal_delay_ms: 250,
        }
    }
}

/// What a gated request receives while the inspector is believed open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlockMode {
    /// Resolve with a synthesized error response.
    SynthesizedError,
    /// Reject the dispatch outright.
    Reject,
}

/// The DOM-ish seam. Implementations toggle real page state; tests record.
pub trait ReactionSink {
    fn set_blur(&mut self, on: bool);
    fn set_banner(&mut self, on: bool);
    fn set_badge(&mut self, on: bool);
    fn mount_overlay(&mut self);
    fn remove_overlay(&mut self);
    fn overlay_mounted(&self) -> bool;
}

/// Sink that does nothing. Used when the host applies effects itself and
/// only consumes status/events.
#[derive(Debug, Default)]
pub struct NullSink {
    mounted: bool,
}

impl ReactionSink for NullSink {
    fn set_blur(&mut self, _on: bool) {}
    fn set_banner(&mut self, _on: bool) {}
    fn set_badge(&mut self, _on: bool) {}
    fn mount_overlay(&mut self) {
        self.mounted = true;
    }
    fn remove_overlay(&mut self) {
        self.mounted = false;
    }
    fn overlay_mounted(&self) -> bool {
        self.mounted
    }
}

/// Applies belief transitions to the sink and supervises the overlay.
///
/// Explicit blur/badge calls override the automatic reaction until the next
/// transition, which clears the overrides and reapplies config-driven state.
pub struct Reactor {
    cfg: ReactionConfig,
    sink: Box<dyn ReactionSink>,
    overlay: OverlayGuard,
    blur_override: Option<bool>,
    badge_override: Option<bool>,
}

impl Reactor {
    pub fn new(cfg: ReactionConfig, sink: Box<dyn ReactionSink>) -> Self {
        let overlay = OverlayGuard::new(cfg.self_heal_delay_ms);
        Self {
            cfg,
            sink,
            overlay,
            blur_override: None,
            badge_override: None,
        }
    }

    pub fn config(&self) -> &ReactionConfig {
        &self.cfg
    }

    /// Initial visual state, applied once at start.
    pub fn apply_initial(&mut self) {
        self.sink.set_badge(self.cfg.show_badge);
    }

    /// Apply one belief transition. Runs synchronously, before any
    /// subscriber is notified.
    pub fn apply_transition(&mut self, t: &Transition) {
        self.blur_override = None;
        self.badge_override = None;

        if self.cfg.blur_on_open {
            self.sink.set_blur(t.open);
        }
        if self.cfg.show_banner {
            self.sink.set_banner(t.open);
        }
        if self.cfg.overlay_on_open {
            self.overlay.set_desired(t.open, self.sink.as_mut());
        }
        if !t.open {
            // Closing clears every restriction regardless of config.
            self.sink.set_blur(false);
            self.sink.set_banner(false);
            self.overlay.set_desired(false, self.sink.as_mut());
        }
    }

    /// Explicit, state-independent blur toggle.
    pub fn set_blur(&mut self, on: bool) {
        self.blur_override = Some(on);
        self.sink.set_blur(on);
    }

    /// Explicit, state-independent badge toggle.
    pub fn set_badge(&mut self, on: bool) {
        self.badge_override = Some(on);
        self.sink.set_badge(on);
    }

    /// Converge actual state to desired state. Called every tick: re-asserts
    /// automatic visuals (unless explicitly overridden) and supervises the
    /// overlay.
    pub fn reconcile(&mut self, open: bool, now_ms: u64) -> Option<TamperEvent> {
        if self.cfg.blur_on_open && self.blur_override.is_none() {
            self.sink.set_blur(open);
        }
        if self.badge_override.is_none() {
            self.sink.set_badge(self.cfg.show_badge);
        }
        if self.cfg.overlay_on_open && self.overlay.desired() != open {
            self.overlay.set_desired(open, self.sink.as_mut());
        }
        self.overlay.reconcile(self.sink.as_mut(), now_ms)
    }

    /// Tear down every visual restriction (shutdown path).
    pub fn clear_all(&mut self) {
        self.blur_override = None;
        self.badge_override = None;
        self.sink.set_blur(false);
        self.sink.set_banner(false);
        self.sink.set_badge(false);
        self.overlay.set_desired(false, self.sink.as_mut());
    }
}
