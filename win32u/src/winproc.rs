//! Window Procedure Thunk Table
//!
//! Applications hand the subsystem raw window-procedure callbacks in one of
//! two text encodings (ANSI or wide). Rather than track those pointers per
//! window or per class, every callback is parked once in a fixed-capacity
//! table and addressed through a compact tagged handle from then on.
//!
//! Allocated thunks are never freed: an application only ever has a small
//! number of distinct window procedures, so the table stays small, and a
//! grow-only table removes any need to track thunk lifetime against windows
//! and classes. The capacity cap is a backstop, not a budget.
//!
//! # References
//!
//! Based on the Windows USER window-procedure handle scheme
//! (`ntuser/kernel/class.c`).

use core::sync::atomic::{AtomicUsize, Ordering};

use log::{trace, warn};
use spin::Mutex;

use crate::client::ClientProcs;

// ============================================================================
// Constants
// ============================================================================

/// Maximum window procedure thunks per process
pub const MAX_WINPROCS: usize = 4096;

/// Tag identifying a thunk handle, stored in bits 16..32
const WINPROC_HANDLE: usize = 0xFFFF;

/// Built-in procedures that match on either encoding during lookup
pub const NB_BUILTIN_AW_WINPROCS: usize = BuiltinProc::Desktop as usize;

/// Total built-in procedures seeded at bootstrap
pub const NB_BUILTIN_WINPROCS: usize = BuiltinProc::Message as usize + 1;

// ============================================================================
// Procedure Values
// ============================================================================

/// An opaque pointer-sized window-procedure value.
///
/// Either a raw native callback supplied by the application, or an encoded
/// thunk handle minted by [`WinProcTable::alloc_winproc`]. The two share one
/// value space on purpose: a caller that gets back something it cannot
/// decode simply calls it as a native procedure.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WndProc(usize);

impl WndProc {
    pub const NULL: WndProc = WndProc(0);

    pub const fn from_raw(raw: usize) -> Self {
        WndProc(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Built-in control-class procedures, occupying the reserved low indices
/// of the thunk table.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProc {
    Button = 0,
    ComboBox,
    DefWindow,
    Dialog,
    Edit,
    ListBox,
    MdiClient,
    ScrollBar,
    Static,
    Ime,
    // Procedures below never cross-match encodings
    Desktop,
    IconTitle,
    PopupMenu,
    Message,
}

impl BuiltinProc {
    pub const ALL: [BuiltinProc; NB_BUILTIN_WINPROCS] = [
        BuiltinProc::Button,
        BuiltinProc::ComboBox,
        BuiltinProc::DefWindow,
        BuiltinProc::Dialog,
        BuiltinProc::Edit,
        BuiltinProc::ListBox,
        BuiltinProc::MdiClient,
        BuiltinProc::ScrollBar,
        BuiltinProc::Static,
        BuiltinProc::Ime,
        BuiltinProc::Desktop,
        BuiltinProc::IconTitle,
        BuiltinProc::PopupMenu,
        BuiltinProc::Message,
    ];

    /// Thunk handle for this built-in procedure
    pub const fn handle(self) -> WndProc {
        encode(self as usize)
    }
}

/// Result of decoding a [`WndProc`] value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcSlot {
    /// Not a thunk handle; treat the value as a native procedure
    Invalid,
    /// Placeholder for a 16-bit procedure this table does not model
    Proc16,
    /// A live thunk at this table index
    Index(usize),
}

/// Combine a table index with the reserved tag. Pure; capacity is enforced
/// by the allocator, not here.
const fn encode(index: usize) -> WndProc {
    WndProc((WINPROC_HANDLE << 16) | index)
}

// ============================================================================
// Thunk Table
// ============================================================================

/// One thunk record: the same logical procedure reachable via up to two
/// encodings. Fields are written at most once each; readers that observe a
/// still-zero field fall back to the raw handle value.
struct WinProcEntry {
    proc_a: AtomicUsize,
    proc_w: AtomicUsize,
}

impl WinProcEntry {
    const fn new() -> Self {
        Self {
            proc_a: AtomicUsize::new(0),
            proc_w: AtomicUsize::new(0),
        }
    }
}

/// Process-wide window-procedure thunk table.
///
/// The mutex serializes allocation only. Resolution is lock-free: entries
/// are append-only and the allocator publishes the procedure field before
/// advancing the watermark, so readers see either a complete record or a
/// handle that still decodes as invalid.
pub struct WinProcTable {
    entries: [WinProcEntry; MAX_WINPROCS],
    /// Allocation watermark; slots below it are live
    used: AtomicUsize,
    alloc_lock: Mutex<()>,
}

impl WinProcTable {
    pub const fn new() -> Self {
        Self {
            entries: [const { WinProcEntry::new() }; MAX_WINPROCS],
            used: AtomicUsize::new(NB_BUILTIN_WINPROCS),
            alloc_lock: Mutex::new(()),
        }
    }

    /// Seed the built-in control procedures, both encodings at once.
    ///
    /// One bootstrap call from the windowing client layer; writes the
    /// reserved low indices directly rather than going through the
    /// allocation path.
    pub fn init_client_procs(&self, procs_a: &ClientProcs, procs_w: &ClientProcs) {
        for builtin in BuiltinProc::ALL {
            let entry = &self.entries[builtin as usize];
            entry.proc_a.store(procs_a.proc(builtin).raw(), Ordering::Release);
            entry.proc_w.store(procs_w.proc(builtin).raw(), Ordering::Release);
        }
        trace!("seeded {} builtin winprocs", NB_BUILTIN_WINPROCS);
    }

    /// Decode a procedure value into a table slot
    pub fn decode(&self, handle: WndProc) -> ProcSlot {
        if handle.raw() >> 16 != WINPROC_HANDLE {
            return ProcSlot::Invalid;
        }
        let index = handle.raw() & 0xFFFF;
        if index >= MAX_WINPROCS {
            return ProcSlot::Proc16;
        }
        if index >= self.used.load(Ordering::Acquire) {
            return ProcSlot::Invalid;
        }
        ProcSlot::Index(index)
    }

    /// Find an existing thunk for a given procedure and encoding.
    /// Caller holds the allocation lock.
    fn find(&self, func: WndProc, ansi: bool) -> Option<usize> {
        let used = self.used.load(Ordering::Acquire);
        for i in 0..NB_BUILTIN_AW_WINPROCS {
            // match either encoding, some apps confuse A and W
            let entry = &self.entries[i];
            if entry.proc_a.load(Ordering::Acquire) != func.raw()
                && entry.proc_w.load(Ordering::Acquire) != func.raw()
            {
                continue;
            }
            return Some(i);
        }
        for i in NB_BUILTIN_AW_WINPROCS..used {
            let entry = &self.entries[i];
            let slot = if ansi { &entry.proc_a } else { &entry.proc_w };
            if slot.load(Ordering::Acquire) == func.raw() {
                return Some(i);
            }
        }
        None
    }

    /// Allocate a thunk handle for a window or class procedure.
    ///
    /// Idempotent: a value that already decodes as a thunk handle is
    /// returned unchanged, and identical `(func, ansi)` requests reuse the
    /// same record. When the table is full the raw procedure value itself
    /// is returned so the caller keeps working without a thunk.
    pub fn alloc_winproc(&self, func: WndProc, ansi: bool) -> WndProc {
        if func.is_null() {
            return WndProc::NULL;
        }
        if !matches!(self.decode(func), ProcSlot::Invalid) {
            return func;
        }

        let _guard = self.alloc_lock.lock();

        if let Some(index) = self.find(func, ansi) {
            trace!("reusing winproc {:#x} for {:#x}", encode(index).raw(), func.raw());
            return encode(index);
        }

        let used = self.used.load(Ordering::Acquire);
        if used >= MAX_WINPROCS {
            warn!("too many winprocs, cannot allocate one for {:#x}", func.raw());
            return func;
        }

        let entry = &self.entries[used];
        let slot = if ansi { &entry.proc_a } else { &entry.proc_w };
        slot.store(func.raw(), Ordering::Release);
        // the slot must be visible before the handle decodes as live
        self.used.store(used + 1, Ordering::Release);

        trace!(
            "allocated winproc {:#x} for {} {:#x} ({}/{} used)",
            encode(used).raw(),
            if ansi { 'A' } else { 'W' },
            func.raw(),
            used + 1,
            MAX_WINPROCS
        );
        encode(used)
    }

    /// Resolve a procedure value for a calling convention.
    ///
    /// Values that are not live thunk handles pass through unchanged, as
    /// does a thunk whose requested encoding was never filled in.
    pub fn get_winproc(&self, proc: WndProc, ansi: bool) -> WndProc {
        let index = match self.decode(proc) {
            ProcSlot::Invalid | ProcSlot::Proc16 => return proc,
            ProcSlot::Index(index) => index,
        };
        let entry = &self.entries[index];
        let slot = if ansi { &entry.proc_a } else { &entry.proc_w };
        match slot.load(Ordering::Acquire) {
            0 => proc,
            raw => WndProc::from_raw(raw),
        }
    }

    /// Current allocation watermark
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

impl Default for WinProcTable {
    fn default() -> Self {
        Self::new()
    }
}
