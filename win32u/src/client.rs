//! Windowing Client Interface
//!
//! The class registry does not own windows, icons, or device contexts; it
//! reaches back into the windowing client layer for those through a small
//! callback table, mirroring how the rest of the subsystem registers its
//! client entry points.

use crate::atom::Atom;
use crate::handle::{HBRUSH, HICON, HWND, ModuleHandle};
use crate::winproc::{BuiltinProc, WndProc};

// ============================================================================
// Built-in Procedure Table
// ============================================================================

/// Native procedures for the built-in control classes, one encoding per
/// instance. The client layer supplies one ANSI and one wide table at
/// bootstrap.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientProcs {
    pub button: WndProc,
    pub combo: WndProc,
    pub def_window: WndProc,
    pub dialog: WndProc,
    pub edit: WndProc,
    pub listbox: WndProc,
    pub mdi_client: WndProc,
    pub scrollbar: WndProc,
    pub static_ctrl: WndProc,
    pub ime: WndProc,
    pub desktop: WndProc,
    pub icon_title: WndProc,
    pub popup_menu: WndProc,
    pub message: WndProc,
}

impl ClientProcs {
    /// Procedure for a built-in slot
    pub const fn proc(&self, which: BuiltinProc) -> WndProc {
        match which {
            BuiltinProc::Button => self.button,
            BuiltinProc::ComboBox => self.combo,
            BuiltinProc::DefWindow => self.def_window,
            BuiltinProc::Dialog => self.dialog,
            BuiltinProc::Edit => self.edit,
            BuiltinProc::ListBox => self.listbox,
            BuiltinProc::MdiClient => self.mdi_client,
            BuiltinProc::ScrollBar => self.scrollbar,
            BuiltinProc::Static => self.static_ctrl,
            BuiltinProc::Ime => self.ime,
            BuiltinProc::Desktop => self.desktop,
            BuiltinProc::IconTitle => self.icon_title,
            BuiltinProc::PopupMenu => self.popup_menu,
            BuiltinProc::Message => self.message,
        }
    }
}

// ============================================================================
// Window Lookup
// ============================================================================

/// What the window table knows about a window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinPtr {
    /// A live window in this process, instantiated from the given class
    Window(Atom),
    /// The window belongs to another process
    OtherProcess,
    /// The window is the desktop
    Desktop,
    /// Not a window
    None,
}

// ============================================================================
// Client Callbacks
// ============================================================================

/// Services the class registry consumes from the windowing client layer.
pub trait UserCallbacks: Send + Sync {
    /// Create the desktop window if it does not exist yet; registering the
    /// desktop triggers built-in class registration as a side effect.
    fn create_desktop_window(&self);

    /// Image base of the calling module, used when a registration leaves
    /// the owning module unspecified.
    fn image_base(&self) -> ModuleHandle;

    /// Produce a copy of `icon` scaled to the system small-icon size.
    fn copy_icon_scaled_small(&self, icon: HICON) -> HICON;

    /// Release a class device-context cache.
    fn free_dce(&self, dce: usize, flags: u32);

    /// Delete a GDI object such as a background brush.
    fn delete_gdi_object(&self, handle: HBRUSH) -> bool;

    /// Destroy a cursor or icon.
    fn destroy_cursor(&self, cursor: HICON, flags: u32) -> bool;

    /// Look up a window handle in the window table.
    fn get_win_ptr(&self, hwnd: HWND) -> WinPtr;

    /// Whether the handle names a live window anywhere on the desktop.
    fn is_window(&self, hwnd: HWND) -> bool;
}
