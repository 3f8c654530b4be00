use crate::cfg::GuardCfg;

/// Window geometry snapshot. Unknown screen dimensions are reported as 0.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ViewportSample {
    pub inner_w: f64,
    pub inner_h: f64,
    pub outer_w: f64,
    pub outer_h: f64,
    pub screen_w: f64,
    pub screen_h: f64,
}

/// Console-coercion observation for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSample {
    /// The logged object's coercion hook fired after the log call.
    pub coercion_forced: bool,
    /// Console output is disabled entirely; the flag carries no information.
    pub log_suppressed: bool,
}

/// Timing heuristic: any trial past the threshold triggers. A trap instruction
/// is a no-op without an attached debugger, so a slow trial is evidence of one.
#[inline]
pub fn timing_signal(trials_ms: &[f64], threshold_ms: f64) -> bool {
    if !threshold_ms.is_finite() {
        return false;
    }
    trials_ms
        .iter()
        .any(|t| t.is_finite() && *t > threshold_ms)
}

/// Viewport heuristic. Simple mode triggers on either axis gap past `gap_px`.
/// Ratio refinement additionally requires the inner/screen ratio to drop below
/// `ratio_min`, which filters normal browser chrome and zoom; it falls back to
/// simple mode when screen dimensions are unknown.
pub fn viewport_signal(v: &ViewportSample, cfg: &GuardCfg) -> bool {
    let finite = [v.inner_w, v.inner_h, v.outer_w, v.outer_h]
        .iter()
        .all(|x| x.is_finite());
    if !finite {
        return false;
    }

    let gap_w = (v.outer_w - v.inner_w).abs();
    let gap_h = (v.outer_h - v.inner_h).abs();
    let gap = gap_w.max(gap_h);

    let screen_known =
        v.screen_w.is_finite() && v.screen_h.is_finite() && v.screen_w > 0.0 && v.screen_h > 0.0;

    if cfg.use_ratio_refinement && screen_known {
        let ratio_w = v.inner_w / v.screen_w;
        let ratio_h = v.inner_h / v.screen_h;
        let low_ratio = ratio_w < cfg.ratio_min || ratio_h < cfg.ratio_min;
        return low_ratio && gap > cfg.ratio_gap_px;
    }

    gap > cfg.gap_px
}

/// Console heuristic. `None` when logging is suppressed: absence of the flag
/// is non-evidence, not proof of a closed console.
#[inline]
pub fn console_signal(s: &ConsoleSample) -> Option<bool> {
    if s.log_suppressed {
        return None;
    }
    Some(s.coercion_forced)
}

/// Inventory heuristic: enough native inspector-injected globals present.
#[inline]
pub fn inventory_signal(native_hooks: u32, min_hooks: u32) -> bool {
    min_hooks > 0 && native_hooks >= min_hooks
}
