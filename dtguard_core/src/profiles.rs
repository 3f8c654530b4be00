use std::collections::HashMap;

use crate::probe::{ProbeKind, TickReport};

// ---------------------------------------------------------------------
// Probe profiles: control how much each probe can influence the weighted
// tally, without trusting per-result weights blindly.
// ---------------------------------------------------------------------

/// Per-probe trust band: a default weight plus hard bounds.
#[derive(Clone, Copy, Debug)]
pub struct ProbeProfile {
    /// Weight used when a result doesn't specify one or specifies 0.
    pub base_weight: f32,
    pub min_weight: f32,
    pub max_weight: f32,
}

impl ProbeProfile {
    pub fn new(base_weight: f32, min_weight: f32, max_weight: f32) -> Self {
        Self {
            base_weight,
            min_weight,
            max_weight,
        }
    }

    /// Clamp a requested weight into this profile's band, falling back to
    /// `base_weight` when the request is 0.
    pub fn clamp(&self, requested: f32) -> f32 {
        let w = if requested == 0.0 { self.base_weight } else { requested };
        w.clamp(self.min_weight, self.max_weight)
    }
}

pub type ProbeProfiles = HashMap<ProbeKind, ProbeProfile>;

/// Apply probe profiles to all results in a report. Only `weight` changes.
pub fn apply_probe_profiles(report: &mut TickReport, profiles: &ProbeProfiles) {
    for r in &mut report.results {
        if let Some(p) = profiles.get(&r.kind) {
            r.weight = p.clamp(r.weight);
        } else {
            // Unknown probe: soft hint with low influence.
            let default_profile = ProbeProfile::new(0.2, 0.1, 0.4);
            r.weight = default_profile.clamp(r.weight);
        }
    }
}

/// Relative trust defaults. Timing is the strongest signal (an attached
/// debugger is hard to fake away); console coercion the weakest.
pub fn default_probe_profiles() -> ProbeProfiles {
    let mut m = ProbeProfiles::new();
    m.insert(ProbeKind::DebuggerTiming, ProbeProfile::new(1.0, 0.5, 1.0));
    m.insert(ProbeKind::ViewportGap, ProbeProfile::new(0.8, 0.3, 0.9));
    m.insert(ProbeKind::ConsoleCoercion, ProbeProfile::new(0.4, 0.1, 0.6));
    m.insert(ProbeKind::GlobalInventory, ProbeProfile::new(0.7, 0.3, 0.9));
    m
}
