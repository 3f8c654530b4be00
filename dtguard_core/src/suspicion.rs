use crate::signal::ViewportSample;

// ---------------------------------------------------------------------
// Suspicion score: how unusual the raw measurements look against rolling
// per-environment baselines. Diagnostic only; not a fusion input.
// ---------------------------------------------------------------------

/// Rolling baselines for the numeric signals on this host/environment.
/// Populate from telemetry or keep defaults for a cold start.
#[derive(Clone, Copy, Debug)]
pub struct SignalBaselines {
    pub timing_mu: f64,
    pub timing_sigma: f64,
    /// Baseline for the larger viewport axis gap.
    pub gap_mu: f64,
    pub gap_sigma: f64,
}

impl Default for SignalBaselines {
    fn default() -> Self {
        Self {
            timing_mu: 5.0,
            timing_sigma: 10.0,
            gap_mu: 60.0,
            gap_sigma: 40.0,
        }
    }
}

/// Parameters turning per-metric z-scores into a single score in [0,1].
#[derive(Clone, Copy, Debug)]
pub struct SuspicionParams {
    /// z at which a metric counts as surprising.
    pub z_thresh: f64,
    /// Weight on the fraction-of-surprising-metrics term.
    pub alpha: f64,
    /// Scale factor in the magnitude term's exponential.
    pub mag_scale: f64,
}

impl Default for SuspicionParams {
    fn default() -> Self {
        Self {
            z_thresh: 1.5,
            alpha: 0.66,
            mag_scale: 2.0,
        }
    }
}

/// Score this tick's raw measurements in [0,1]: a blend of how many metrics
/// look surprising and how far off they are in aggregate.
pub fn compute_suspicion(
    trials_ms: &[f64],
    viewport: Option<&ViewportSample>,
    baselines: &SignalBaselines,
    params: &SuspicionParams,
) -> f32 {
    let mut surprising = 0u32;
    let mut total = 0u32;
    let mut sum_z2 = 0.0f64;

    let eps = 1e-3f64;

    for t in trials_ms {
        if !t.is_finite() {
            continue;
        }
        let z = (t - baselines.timing_mu) / baselines.timing_sigma.abs().max(eps);
        total += 1;
        if z >= params.z_thresh {
            surprising += 1;
        }
        sum_z2 += z * z;
    }

    if let Some(v) = viewport {
        let gap_w = (v.outer_w - v.inner_w).abs();
        let gap_h = (v.outer_h - v.inner_h).abs();
        let gap = gap_w.max(gap_h);
        if gap.is_finite() {
            let z = (gap - baselines.gap_mu) / baselines.gap_sigma.abs().max(eps);
            total += 1;
            if z >= params.z_thresh {
                surprising += 1;
            }
            sum_z2 += z * z;
        }
    }

    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    let fraction = (surprising as f64 / total_f).clamp(0.0, 1.0);

    let avg_z2 = sum_z2 / total_f;
    let magnitude = 1.0 - (-avg_z2 / params.mag_scale).exp();

    let alpha = params.alpha.clamp(0.0, 1.0);
    let score = alpha * fraction + (1.0 - alpha) * magnitude;

    score.clamp(0.0, 1.0) as f32
}
