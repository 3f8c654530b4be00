#![allow(clippy::missing_safety_doc)]

use std::os::raw::c_void;
use std::ptr;

use dtguard_core::{ConsoleSample, FusionMode, GuardCfg, ProbeKind, ViewportSample};
use dtguard_engine::{
    DevToolsGuard, GuardOptions, LifecycleEvent, RawSample, ReactionConfig, ReactionSink,
    SchedulerCfg, BlockMode,
};

/// FFI ABI version for dtguard_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function
/// signature changes.
pub const DTGUARD_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn dtg_ffi_version() -> u32 {
    DTGUARD_FFI_VERSION
}

// Snapshot wire format identification.
const SNAP_MAGIC: u32 = 0x3147_5444; // "DTG1" little-endian
const SNAP_VERSION: u32 = 1;

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DtgStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl DtgStr {
    pub fn null() -> Self {
        Self {
            ptr: ptr::null(),
            len: 0,
        }
    }

    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }
}

/// Owned byte buffer returned over FFI. Free with `dtg_bytes_free`.
#[repr(C)]
pub struct DtgBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl DtgBytes {
    fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vec(v: Vec<u8>) -> Self {
        let mut boxed = v.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        let len = boxed.len();
        std::mem::forget(boxed);
        Self { ptr, len }
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_bytes_free(b: DtgBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Detection cfg for FFI (flat mirror of `GuardCfg`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DtgCfg {
    pub timing_threshold_ms: f64,
    pub timing_trials: u32,
    pub gap_px: f64,
    pub use_ratio_refinement: u8,
    pub ratio_min: f64,
    pub ratio_gap_px: f64,
    pub inventory_min_hooks: u32,
    /// 0 = soft, 1 = quorum, 2 = weighted.
    pub mode: u8,
    pub open_quorum: u32,
    pub close_quorum: u32,
    pub close_confirmations: u32,
    pub close_delay_ms: u64,
    pub min_suspicion: f32,
    pub hyst_disable: u8,
}

fn cfg_to_ffi(c: &GuardCfg) -> DtgCfg {
    DtgCfg {
        timing_threshold_ms: c.timing_threshold_ms,
        timing_trials: c.timing_trials,
        gap_px: c.gap_px,
        use_ratio_refinement: c.use_ratio_refinement as u8,
        ratio_min: c.ratio_min,
        ratio_gap_px: c.ratio_gap_px,
        inventory_min_hooks: c.inventory_min_hooks,
        mode: match c.mode {
            FusionMode::Soft => 0,
            FusionMode::Quorum => 1,
            FusionMode::Weighted => 2,
        },
        open_quorum: c.open_quorum,
        close_quorum: c.close_quorum,
        close_confirmations: c.close_confirmations,
        close_delay_ms: c.close_delay_ms,
        min_suspicion: c.min_suspicion,
        hyst_disable: c.hyst_disable as u8,
    }
}

fn cfg_from_ffi(c: DtgCfg) -> GuardCfg {
    GuardCfg {
        timing_threshold_ms: c.timing_threshold_ms,
        timing_trials: c.timing_trials,
        gap_px: c.gap_px,
        use_ratio_refinement: c.use_ratio_refinement != 0,
        ratio_min: c.ratio_min,
        ratio_gap_px: c.ratio_gap_px,
        inventory_min_hooks: c.inventory_min_hooks,
        mode: match c.mode {
            1 => FusionMode::Quorum,
            2 => FusionMode::Weighted,
            _ => FusionMode::Soft,
        },
        open_quorum: c.open_quorum,
        close_quorum: c.close_quorum,
        close_confirmations: c.close_confirmations,
        close_delay_ms: c.close_delay_ms,
        min_suspicion: c.min_suspicion,
        hyst_disable: c.hyst_disable != 0,
    }
}

#[no_mangle]
pub extern "C" fn dtg_cfg_default() -> DtgCfg {
    cfg_to_ffi(&GuardCfg::default())
}

#[no_mangle]
pub extern "C" fn dtg_cfg_aggressive() -> DtgCfg {
    cfg_to_ffi(&GuardCfg::aggressive())
}

/// Reaction cfg for FFI.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DtgReactions {
    pub blur_on_open: u8,
    pub show_banner: u8,
    pub show_badge: u8,
    pub block_network_on_open: u8,
    pub overlay_on_open: u8,
    /// 0 = synthesized error response, 1 = reject.
    pub block_mode: u8,
    pub self_heal_delay_ms: u64,
}

#[no_mangle]
pub extern "C" fn dtg_reactions_default() -> DtgReactions {
    let d = ReactionConfig::default();
    DtgReactions {
        blur_on_open: d.blur_on_open as u8,
        show_banner: d.show_banner as u8,
        show_badge: d.show_badge as u8,
        block_network_on_open: d.block_network_on_open as u8,
        overlay_on_open: d.overlay_on_open as u8,
        block_mode: match d.block_mode {
            BlockMode::SynthesizedError => 0,
            BlockMode::Reject => 1,
        },
        self_heal_delay_ms: d.self_heal_delay_ms,
    }
}

fn reactions_from_ffi(r: DtgReactions) -> ReactionConfig {
    ReactionConfig {
        blur_on_open: r.blur_on_open != 0,
        show_banner: r.show_banner != 0,
        show_badge: r.show_badge != 0,
        block_network_on_open: r.block_network_on_open != 0,
        overlay_on_open: r.overlay_on_open != 0,
        block_mode: if r.block_mode == 1 {
            BlockMode::Reject
        } else {
            BlockMode::SynthesizedError
        },
        self_heal_delay_ms: r.self_heal_delay_ms,
    }
}

/// Reaction sink as a C callback table. Null callbacks degrade to no-ops;
/// when `overlay_mounted` is null an internal mounted flag mirrors the
/// mount/remove calls.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DtgSinkVtable {
    pub ctx: *mut c_void,
    pub set_blur: Option<extern "C" fn(ctx: *mut c_void, on: u8)>,
    pub set_banner: Option<extern "C" fn(ctx: *mut c_void, on: u8)>,
    pub set_badge: Option<extern "C" fn(ctx: *mut c_void, on: u8)>,
    pub mount_overlay: Option<extern "C" fn(ctx: *mut c_void)>,
    pub remove_overlay: Option<extern "C" fn(ctx: *mut c_void)>,
    pub overlay_mounted: Option<extern "C" fn(ctx: *mut c_void) -> u8>,
}

impl DtgSinkVtable {
    pub fn null() -> Self {
        Self {
            ctx: ptr::null_mut(),
            set_blur: None,
            set_banner: None,
            set_badge: None,
            mount_overlay: None,
            remove_overlay: None,
            overlay_mounted: None,
        }
    }
}

struct CSink {
    vt: DtgSinkVtable,
    mounted: bool,
}

impl ReactionSink for CSink {
    fn set_blur(&mut self, on: bool) {
        if let Some(f) = self.vt.set_blur {
            f(self.vt.ctx, on as u8);
        }
    }
    fn set_banner(&mut self, on: bool) {
        if let Some(f) = self.vt.set_banner {
            f(self.vt.ctx, on as u8);
        }
    }
    fn set_badge(&mut self, on: bool) {
        if let Some(f) = self.vt.set_badge {
            f(self.vt.ctx, on as u8);
        }
    }
    fn mount_overlay(&mut self) {
        self.mounted = true;
        if let Some(f) = self.vt.mount_overlay {
            f(self.vt.ctx);
        }
    }
    fn remove_overlay(&mut self) {
        self.mounted = false;
        if let Some(f) = self.vt.remove_overlay {
            f(self.vt.ctx);
        }
    }
    fn overlay_mounted(&self) -> bool {
        match self.vt.overlay_mounted {
            Some(f) => f(self.vt.ctx) != 0,
            None => self.mounted,
        }
    }
}

/// Flat raw-sample record. `kind` selects which fields are read:
/// 0 timing, 1 viewport, 2 console, 3 inventory, 4 fault.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DtgSample {
    pub kind: u8,

    // timing
    pub trials_ptr: *const f64,
    pub trials_len: usize,

    // viewport
    pub inner_w: f64,
    pub inner_h: f64,
    pub outer_w: f64,
    pub outer_h: f64,
    pub screen_w: f64,
    pub screen_h: f64,

    // console
    pub coercion_forced: u8,
    pub log_suppressed: u8,

    // inventory
    pub native_hooks: u32,

    // fault: 0 timing, 1 viewport, 2 console, 3 inventory
    pub fault_probe: u8,
    pub fault_detail: DtgStr,
}

fn probe_from_u8(v: u8) -> ProbeKind {
    match v {
        1 => ProbeKind::ViewportGap,
        2 => ProbeKind::ConsoleCoercion,
        3 => ProbeKind::GlobalInventory,
        _ => ProbeKind::DebuggerTiming,
    }
}

unsafe fn sample_from_ffi(s: &DtgSample) -> Option<RawSample> {
    match s.kind {
        0 => {
            let trials_ms = if s.trials_ptr.is_null() || s.trials_len == 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(s.trials_ptr, s.trials_len).to_vec()
            };
            Some(RawSample::Timing { trials_ms })
        }
        1 => Some(RawSample::Viewport(ViewportSample {
            inner_w: s.inner_w,
            inner_h: s.inner_h,
            outer_w: s.outer_w,
            outer_h: s.outer_h,
            screen_w: s.screen_w,
            screen_h: s.screen_h,
        })),
        2 => Some(RawSample::Console(ConsoleSample {
            coercion_forced: s.coercion_forced != 0,
            log_suppressed: s.log_suppressed != 0,
        })),
        3 => Some(RawSample::Inventory {
            native_hooks: s.native_hooks,
        }),
        4 => Some(RawSample::Fault {
            probe: probe_from_u8(s.fault_probe),
            detail: s
                .fault_detail
                .as_str()
                .map(str::to_string)
                .unwrap_or_default(),
        }),
        _ => None,
    }
}

/// Opaque handle exposed over FFI.
#[repr(C)]
pub struct DtgGuard {
    inner: DevToolsGuard,
}

/// Create a guard handle. `query` is the page query string (may be null);
/// the opt-out flag is honored before anything is installed.
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_new(
    cfg: DtgCfg,
    reactions: DtgReactions,
    sink: DtgSinkVtable,
    query: DtgStr,
    now_ms: u64,
) -> *mut DtgGuard {
    let mut opts = match query.as_str() {
        Some(q) => GuardOptions::from_query(q),
        None => GuardOptions::default(),
    };
    opts.cfg = cfg_from_ffi(cfg);
    opts.reactions = reactions_from_ffi(reactions);
    opts.scheduler = SchedulerCfg::default();

    let guard = DevToolsGuard::new(
        opts,
        Box::new(CSink {
            vt: sink,
            mounted: false,
        }),
        now_ms,
    );
    Box::into_raw(Box::new(DtgGuard { inner: guard }))
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_free(h: *mut DtgGuard) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_start(h: *mut DtgGuard, now_ms: u64) {
    if let Some(g) = h.as_mut() {
        g.inner.start(now_ms);
    }
}

/// Tick outcome. `reason` is an owned buffer (free with `dtg_bytes_free`);
/// null when no transition fired.
#[repr(C)]
pub struct DtgTick {
    pub changed: u8,
    pub open: u8,
    pub reason: DtgBytes,
}

/// Evaluate one batch of samples.
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_tick(
    h: *mut DtgGuard,
    samples_ptr: *const DtgSample,
    samples_len: usize,
    now_ms: u64,
) -> DtgTick {
    let none = DtgTick {
        changed: 0,
        open: 0,
        reason: DtgBytes::empty(),
    };
    let Some(g) = h.as_mut() else {
        return none;
    };

    let mut samples: Vec<RawSample> = Vec::with_capacity(samples_len);
    if !samples_ptr.is_null() && samples_len > 0 {
        for s in std::slice::from_raw_parts(samples_ptr, samples_len) {
            if let Some(rs) = sample_from_ffi(s) {
                samples.push(rs);
            }
        }
    }

    match g.inner.tick(&samples, now_ms) {
        Some(t) => DtgTick {
            changed: 1,
            open: t.open as u8,
            reason: DtgBytes::from_vec(t.reason.into_bytes()),
        },
        None => DtgTick {
            changed: 0,
            open: g.inner.is_open() as u8,
            reason: DtgBytes::empty(),
        },
    }
}

/// Lifecycle events: 0 resize, 1 focus gained, 2 focus lost,
/// 3 visibility visible, 4 visibility hidden.
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_note_event(h: *mut DtgGuard, event: u8, now_ms: u64) {
    let Some(g) = h.as_mut() else {
        return;
    };
    let ev = match event {
        0 => LifecycleEvent::Resize,
        1 => LifecycleEvent::FocusGained,
        2 => LifecycleEvent::FocusLost,
        3 => LifecycleEvent::VisibilityVisible,
        4 => LifecycleEvent::VisibilityHidden,
        _ => return,
    };
    g.inner.handle_event(ev, now_ms);
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_is_open(h: *const DtgGuard) -> u8 {
    match h.as_ref() {
        Some(g) => g.inner.is_open() as u8,
        None => 0,
    }
}

/// Point-in-time status.
#[repr(C)]
pub struct DtgStatus {
    pub active: u8,
    pub open: u8,
    pub network_blocked: u8,
    pub timestamp_ms: u64,
    pub suspicion: f32,
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_status(h: *const DtgGuard, now_ms: u64) -> DtgStatus {
    match h.as_ref() {
        Some(g) => {
            let s = g.inner.status(now_ms);
            DtgStatus {
                active: s.active as u8,
                open: s.open as u8,
                network_blocked: s.network_blocked as u8,
                timestamp_ms: s.timestamp_ms,
                suspicion: s.suspicion,
            }
        }
        None => DtgStatus {
            active: 0,
            open: 0,
            network_blocked: 0,
            timestamp_ms: now_ms,
            suspicion: 0.0,
        },
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_set_badge(h: *mut DtgGuard, show: u8) {
    if let Some(g) = h.as_mut() {
        g.inner.set_badge_visible(show != 0);
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_set_blur(h: *mut DtgGuard, show: u8) {
    if let Some(g) = h.as_mut() {
        g.inner.set_blur(show != 0);
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_force(
    h: *mut DtgGuard,
    open: u8,
    reason: DtgStr,
    now_ms: u64,
) -> u8 {
    let Some(g) = h.as_mut() else {
        return 0;
    };
    let reason = reason.as_str().unwrap_or("");
    g.inner.force_state(open != 0, reason, now_ms).is_some() as u8
}

/// Register a change callback. The reason view is only valid during the call.
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_on_change(
    h: *mut DtgGuard,
    ctx: *mut c_void,
    cb: extern "C" fn(ctx: *mut c_void, open: u8, reason: DtgStr),
) -> u64 {
    let Some(g) = h.as_mut() else {
        return 0;
    };
    // The host owns `ctx` and guarantees validity for the subscription's
    // lifetime.
    let ctx = ctx as usize;
    g.inner.on_change(move |t| {
        let reason = DtgStr {
            ptr: t.reason.as_ptr(),
            len: t.reason.len(),
        };
        cb(ctx as *mut c_void, t.open as u8, reason);
    })
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_unsubscribe(h: *mut DtgGuard, id: u64) -> u8 {
    match h.as_mut() {
        Some(g) => g.inner.unsubscribe(id) as u8,
        None => 0,
    }
}

/// Register a tamper callback: kind 0 overlay-removed, 1 integrity-mismatch.
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_on_tamper(
    h: *mut DtgGuard,
    ctx: *mut c_void,
    cb: extern "C" fn(ctx: *mut c_void, kind: u8, detail: DtgStr),
) -> u64 {
    let Some(g) = h.as_mut() else {
        return 0;
    };
    let ctx = ctx as usize;
    g.inner.on_tamper(move |ev| {
        let kind = match ev.kind {
            dtguard_engine::TamperKind::OverlayRemoved => 0u8,
            dtguard_engine::TamperKind::IntegrityMismatch => 1u8,
        };
        let detail = match &ev.detail {
            Some(d) => DtgStr {
                ptr: d.as_ptr(),
                len: d.len(),
            },
            None => DtgStr::null(),
        };
        cb(ctx as *mut c_void, kind, detail);
    })
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_unsubscribe_tamper(h: *mut DtgGuard, id: u64) -> u8 {
    match h.as_mut() {
        Some(g) => g.inner.unsubscribe_tamper(id) as u8,
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_shutdown(h: *mut DtgGuard, now_ms: u64) {
    if let Some(g) = h.as_mut() {
        g.inner.shutdown(now_ms);
    }
}

/// Snapshot format (binary):
/// [u32 magic = "DTG1"][u32 version = 1]
/// [u8 open][u32 close_streak][u64 last_changed_ms][u64 last_confirm_ms]
/// [u32 reason_len][reason bytes...]
#[no_mangle]
pub unsafe extern "C" fn dtg_guard_snapshot(h: *const DtgGuard) -> DtgBytes {
    let Some(g) = h.as_ref() else {
        return DtgBytes::empty();
    };
    let snap = g.inner.snapshot();
    let b = &snap.belief;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&SNAP_MAGIC.to_le_bytes());
    buf.extend_from_slice(&SNAP_VERSION.to_le_bytes());
    buf.push(b.open as u8);
    buf.extend_from_slice(&b.close_streak.to_le_bytes());
    buf.extend_from_slice(&b.last_changed_ms.to_le_bytes());
    buf.extend_from_slice(&b.last_confirm_ms.to_le_bytes());
    let rb = b.reason.as_bytes();
    buf.extend_from_slice(&(rb.len() as u32).to_le_bytes());
    buf.extend_from_slice(rb);

    DtgBytes::from_vec(buf)
}

#[no_mangle]
pub unsafe extern "C" fn dtg_guard_restore(
    h: *mut DtgGuard,
    bytes: *const u8,
    len: usize,
) -> i32 {
    let Some(g) = h.as_mut() else {
        return -1;
    };
    if bytes.is_null() || len < 8 {
        return -1;
    }
    let data = std::slice::from_raw_parts(bytes, len);

    let mut i = 0usize;
    let read_u32 = |data: &[u8], i: &mut usize| -> Option<u32> {
        if *i + 4 > data.len() {
            return None;
        }
        let v = u32::from_le_bytes(data[*i..*i + 4].try_into().ok()?);
        *i += 4;
        Some(v)
    };
    let read_u64 = |data: &[u8], i: &mut usize| -> Option<u64> {
        if *i + 8 > data.len() {
            return None;
        }
        let v = u64::from_le_bytes(data[*i..*i + 8].try_into().ok()?);
        *i += 8;
        Some(v)
    };

    let magic = match read_u32(data, &mut i) {
        Some(v) => v,
        None => return -2,
    };
    if magic != SNAP_MAGIC {
        return -8;
    }
    let ver = match read_u32(data, &mut i) {
        Some(v) => v,
        None => return -2,
    };
    if ver != SNAP_VERSION {
        return -9;
    }

    if i >= data.len() {
        return -3;
    }
    let open = data[i] != 0;
    i += 1;

    let close_streak = match read_u32(data, &mut i) {
        Some(v) => v,
        None => return -3,
    };
    let last_changed_ms = match read_u64(data, &mut i) {
        Some(v) => v,
        None => return -4,
    };
    let last_confirm_ms = match read_u64(data, &mut i) {
        Some(v) => v,
        None => return -5,
    };
    let rlen = match read_u32(data, &mut i) {
        Some(v) => v as usize,
        None => return -6,
    };
    if i + rlen > data.len() {
        return -6;
    }
    let reason = match std::str::from_utf8(&data[i..i + rlen]) {
        Ok(s) => s.to_string(),
        Err(_) => return -7,
    };

    let belief = dtguard_core::BeliefState {
        open,
        reason,
        last_changed_ms,
        close_streak,
        last_confirm_ms,
    };
    g.inner.restore(dtguard_engine::GuardSnapshot { belief });
    0
}
