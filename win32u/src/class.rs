//! Window Class Registry
//!
//! Window classes define the behavior and appearance of windows; each
//! window is an instance of a class. The authoritative class list lives in
//! the broker; this module keeps the process-local cache, performs the
//! broker exchanges, and exposes the registration and introspection
//! operations.
//!
//! # References
//!
//! Based on Windows Server 2003:
//! - `windows/core/ntuser/kernel/class.c`

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::{debug, trace, warn};
use spin::{Mutex, MutexGuard};

use crate::atom::{parse_integer_atom, Atom, AtomService, ATOM_INTEGER_MAX, MAX_ATOM_LEN};
use crate::client::{ClientProcs, UserCallbacks, WinPtr};
use crate::error::UserError;
use crate::handle::{ModuleHandle, HBRUSH, HCURSOR, HICON, HWND};
use crate::server::{BaseClassInfoRequest, ClassBroker, CreateClassRequest, DestroyClassRequest};
use crate::winproc::{WinProcTable, WndProc};

// ============================================================================
// Constants
// ============================================================================

/// Maximum class name length, bounded by the atom name limit
pub const MAX_CLASS_NAME: usize = MAX_ATOM_LEN;

/// Extra class/window bytes beyond this draw a warning but are honored
pub const MAX_EXTRA_BYTES: i32 = 40;

/// Well-known atom of the desktop class, present from session start
pub const DESKTOP_CLASS_ATOM: Atom = 0x8001;

// ============================================================================
// Class Styles
// ============================================================================

bitflags::bitflags! {
    /// Class styles (CS_*)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClassStyle: u32 {
        /// Redraw if width changes
        const HREDRAW = 0x0002;
        /// Redraw if height changes
        const VREDRAW = 0x0001;
        /// Send double-click messages
        const DBLCLKS = 0x0008;
        /// Own device context
        const OWNDC = 0x0020;
        /// Class device context
        const CLASSDC = 0x0040;
        /// Parent device context
        const PARENTDC = 0x0080;
        /// No close button
        const NOCLOSE = 0x0200;
        /// Save bits under window
        const SAVEBITS = 0x0800;
        /// Byte-align client area
        const BYTEALIGNCLIENT = 0x1000;
        /// Byte-align window
        const BYTEALIGNWINDOW = 0x2000;
        /// Global class
        const GLOBALCLASS = 0x4000;
        /// Drop shadow
        const DROPSHADOW = 0x00020000;
    }
}

// ============================================================================
// Class Identity
// ============================================================================

/// A class named either by text or by numeric token. Text of the form
/// `#number` is a token in disguise and always compares as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId<'a> {
    Name(&'a str),
    Atom(Atom),
}

impl ClassId<'_> {
    /// Numeric token for this identity, when it has one
    fn resolve_atom(self) -> Option<Atom> {
        match self {
            ClassId::Atom(atom) if atom != 0 => Some(atom),
            ClassId::Atom(_) => None,
            ClassId::Name(name) => {
                parse_integer_atom(name).filter(|&a| a != 0 && a <= ATOM_INTEGER_MAX)
            }
        }
    }
}

/// Menu name as an externally-owned name-or-token pair, one per encoding.
/// Held by value; never dereferenced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MenuNameRef {
    pub ansi: usize,
    pub wide: usize,
}

/// Class visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassScope {
    /// Visible only to the registering module
    Local,
    /// Visible desktop-wide
    Global,
}

// ============================================================================
// Class Record
// ============================================================================

/// A registered window class as cached in this process
#[derive(Debug)]
pub struct Class {
    /// Canonical token assigned by the broker
    pub atom: Atom,
    /// Full class name, possibly carrying a version prefix
    pub name: String,
    /// Offset into `name` where the display name starts
    pub basename_offset: usize,
    pub style: ClassStyle,
    pub scope: ClassScope,
    /// Extra class bytes as requested (soft-limited, never clamped)
    pub cls_extra: i32,
    /// Extra window bytes as requested
    pub wnd_extra: i32,
    /// Module that registered the class
    pub instance: ModuleHandle,
    pub icon: HICON,
    pub icon_sm: HICON,
    /// Small icon synthesized from `icon` when none was supplied
    pub icon_sm_intern: HICON,
    pub cursor: HCURSOR,
    pub background: HBRUSH,
    /// Thunk handle for the class window procedure
    pub winproc: WndProc,
    pub menu_name: MenuNameRef,
    /// Class device-context cache token, owned by the windowing client
    pub dce: usize,
    /// Zero-initialized extra class bytes
    pub extra: Vec<u8>,
    /// Back-reference the broker round-trips at destroy time
    client_token: u64,
}

impl Class {
    /// Display name with any version prefix stripped
    pub fn basename(&self) -> &str {
        self.name.get(self.basename_offset..).unwrap_or(&self.name)
    }
}

/// Registration descriptor, the caller-supplied image of a class
#[derive(Debug, Clone, Copy)]
pub struct ClassDescriptor<'a> {
    /// Must equal the size of this structure
    pub cb_size: usize,
    pub style: ClassStyle,
    pub win_proc: WndProc,
    pub cls_extra: i32,
    pub wnd_extra: i32,
    /// Registering module; defaults to the caller's image base when null
    pub instance: ModuleHandle,
    pub icon: HICON,
    pub icon_sm: HICON,
    pub cursor: HCURSOR,
    pub background: HBRUSH,
    pub menu_name: MenuNameRef,
    pub name: ClassId<'a>,
    /// Characters of version prefix to strip for the display name
    pub basename_offset: usize,
    /// Encoding of `win_proc`
    pub ansi: bool,
    /// Built-in control registration from the windowing client itself
    pub builtin: bool,
}

/// Class fields copied out by [`UserSession::get_class_info`]
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub style: ClassStyle,
    /// Procedure resolved for the requested encoding
    pub win_proc: WndProc,
    pub cls_extra: i32,
    pub wnd_extra: i32,
    /// Owning module, null when it is the windowing client's own
    pub instance: ModuleHandle,
    pub icon: HICON,
    pub icon_sm: HICON,
    pub cursor: HCURSOR,
    pub background: HBRUSH,
    /// Menu reference for the requested encoding
    pub menu_name: usize,
    /// Display name
    pub name: String,
    pub atom: Atom,
}

// ============================================================================
// Lookup Guard
// ============================================================================

/// A class found in the local cache, holding the class-list lock for as
/// long as it lives. Dropping the guard releases the lock; there is no way
/// to keep the record without it.
pub struct FoundClass<'a> {
    guard: MutexGuard<'a, VecDeque<Class>>,
    index: usize,
}

impl Deref for FoundClass<'_> {
    type Target = Class;

    fn deref(&self) -> &Class {
        &self.guard[self.index]
    }
}

impl DerefMut for FoundClass<'_> {
    fn deref_mut(&mut self) -> &mut Class {
        &mut self.guard[self.index]
    }
}

/// Case-insensitive comparison bounded at the class-name limit
fn class_name_matches(stored: &str, query: &str) -> bool {
    let a = stored.chars().take(MAX_CLASS_NAME).map(|c| c.to_ascii_lowercase());
    let b = query.chars().take(MAX_CLASS_NAME).map(|c| c.to_ascii_lowercase());
    a.eq(b)
}

/// Copy a name into a byte buffer, NUL-terminated. Truncation is silent;
/// the return value is the number of bytes copied.
fn copy_name(name: &str, buf: &mut [u8]) -> usize {
    let n = name.len().min(buf.len() - 1);
    buf[..n].copy_from_slice(&name.as_bytes()[..n]);
    buf[n] = 0;
    n
}

// ============================================================================
// User Session
// ============================================================================

/// Per-process view of the USER subsystem: the thunk table, the local
/// class cache, and the connections to the broker and the windowing client.
pub struct UserSession {
    winprocs: WinProcTable,
    /// Local class cache; Local classes sit at the head, Global at the tail
    classes: Mutex<VecDeque<Class>>,
    broker: Arc<dyn ClassBroker>,
    atoms: Arc<dyn AtomService>,
    callbacks: Arc<dyn UserCallbacks>,
    /// Module base of the windowing client layer, set at bootstrap
    user32_module: AtomicUsize,
    next_client_token: AtomicU64,
}

impl UserSession {
    pub fn new(
        broker: Arc<dyn ClassBroker>,
        atoms: Arc<dyn AtomService>,
        callbacks: Arc<dyn UserCallbacks>,
    ) -> Self {
        Self {
            winprocs: WinProcTable::new(),
            classes: Mutex::new(VecDeque::new()),
            broker,
            atoms,
            callbacks,
            user32_module: AtomicUsize::new(0),
            next_client_token: AtomicU64::new(1),
        }
    }

    /// One-time bootstrap: seed the built-in procedure thunks and record
    /// which module the windowing client layer lives in.
    pub fn init_client_procs(
        &self,
        procs_a: &ClientProcs,
        procs_w: &ClientProcs,
        user32: ModuleHandle,
    ) {
        self.winprocs.init_client_procs(procs_a, procs_w);
        self.user32_module.store(user32.raw(), Ordering::Release);
    }

    /// The process thunk table
    pub fn winprocs(&self) -> &WinProcTable {
        &self.winprocs
    }

    fn user32_module(&self) -> ModuleHandle {
        ModuleHandle::new(self.user32_module.load(Ordering::Acquire))
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Find a class in the local cache.
    ///
    /// A non-zero token identity matches by token only; text matches
    /// case-insensitively. Local classes are visible only to their owning
    /// module (low-order instance bits ignored); Global classes and
    /// module-less queries match regardless.
    pub fn find_class(&self, module: ModuleHandle, id: ClassId<'_>) -> Option<FoundClass<'_>> {
        let atom = id.resolve_atom();
        let guard = self.classes.lock();
        let index = guard.iter().position(|class| {
            let name_matches = match (atom, id) {
                (Some(a), _) => class.atom == a,
                (None, ClassId::Name(name)) => class_name_matches(&class.name, name),
                (None, ClassId::Atom(_)) => false,
            };
            name_matches
                && (class.scope == ClassScope::Global
                    || module.is_null()
                    || class.instance.base() == module.base())
        })?;
        Some(FoundClass { guard, index })
    }

    /// Resolve a window to its class record.
    ///
    /// Windows of other processes (and the desktop) have no local record:
    /// read access reports `NotFound` so callers can fall back to the
    /// broker, while write access on a live foreign window is refused
    /// outright.
    fn get_class_ptr(&self, hwnd: HWND, write_access: bool) -> Result<FoundClass<'_>, UserError> {
        match self.callbacks.get_win_ptr(hwnd) {
            WinPtr::Window(atom) => self
                .find_class(ModuleHandle::NULL, ClassId::Atom(atom))
                .ok_or(UserError::NotFound),
            WinPtr::OtherProcess | WinPtr::Desktop => {
                if write_access && self.callbacks.is_window(hwnd) {
                    warn!("cannot modify class of window {:#x} in another process", hwnd.raw());
                    Err(UserError::AccessDenied)
                } else {
                    Err(UserError::NotFound)
                }
            }
            WinPtr::None => Err(UserError::NotFound),
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a window class and return its canonical token.
    ///
    /// The broker is the authority: a duplicate registration for the same
    /// module and scope comes back with the original token and no second
    /// record is created anywhere.
    pub fn register_class(&self, desc: &ClassDescriptor<'_>) -> Result<Atom, UserError> {
        if desc.cb_size != mem::size_of::<ClassDescriptor>()
            || desc.cls_extra < 0
            || desc.wnd_extra < 0
        {
            return Err(UserError::InvalidParameter);
        }
        let user32 = self.user32_module();
        if !desc.builtin && !user32.is_null() && desc.instance.base() == user32.base() {
            // the client layer registers its own classes through the
            // builtin path only
            return Err(UserError::InvalidParameter);
        }
        if desc.cls_extra > MAX_EXTRA_BYTES {
            warn!("class extra bytes {} above limit {}", desc.cls_extra, MAX_EXTRA_BYTES);
        }
        if desc.wnd_extra > MAX_EXTRA_BYTES {
            warn!("window extra bytes {} above limit {}", desc.wnd_extra, MAX_EXTRA_BYTES);
        }

        if !desc.builtin {
            self.callbacks.create_desktop_window();
        }

        let (atom_req, name_text) = match desc.name {
            ClassId::Atom(0) => return Err(UserError::InvalidParameter),
            ClassId::Atom(atom) => (atom, None),
            ClassId::Name(name) => {
                if name.is_empty() || name.len() > MAX_CLASS_NAME {
                    return Err(UserError::InvalidParameter);
                }
                match parse_integer_atom(name).filter(|&a| a != 0 && a <= ATOM_INTEGER_MAX) {
                    Some(atom) => (atom, None),
                    None => (0, Some(String::from(name))),
                }
            }
        };

        let name_store = match name_text {
            Some(ref name) => name.clone(),
            None => self.atoms.get_atom_name(atom_req)?,
        };
        let basename_offset = if desc.basename_offset < name_store.len()
            && name_store.is_char_boundary(desc.basename_offset)
        {
            desc.basename_offset
        } else {
            0
        };

        let instance = if desc.instance.is_null() {
            self.callbacks.image_base()
        } else {
            desc.instance
        };
        let local = !desc.builtin && !desc.style.contains(ClassStyle::GLOBALCLASS);
        let client_token = self.next_client_token.fetch_add(1, Ordering::Relaxed);

        let reply = self.broker.create_class(&CreateClassRequest {
            local,
            style: desc.style.bits(),
            instance: instance.raw() as u64,
            cls_extra: desc.cls_extra,
            wnd_extra: desc.wnd_extra,
            client_ptr: client_token,
            atom: atom_req,
            name_offset: basename_offset,
            name: name_text,
        })?;

        if reply.existing {
            trace!(
                "register_class: \"{}\" already registered, atom {:#x}",
                name_store,
                reply.atom
            );
            return Ok(reply.atom);
        }

        let record = Class {
            atom: reply.atom,
            name: name_store,
            basename_offset,
            style: desc.style,
            scope: if local { ClassScope::Local } else { ClassScope::Global },
            cls_extra: desc.cls_extra,
            wnd_extra: desc.wnd_extra,
            instance,
            icon: HICON::NULL,
            icon_sm: HICON::NULL,
            icon_sm_intern: HICON::NULL,
            cursor: HCURSOR::NULL,
            background: HBRUSH::NULL,
            winproc: WndProc::NULL,
            menu_name: MenuNameRef::default(),
            dce: 0,
            extra: vec![0u8; desc.cls_extra as usize],
            client_token,
        };

        // Link first, then fill in the visual fields; Local classes go to
        // the head so they shadow Global ones of the same name
        let mut classes = self.classes.lock();
        let slot = if local {
            classes.push_front(record);
            classes.front_mut()
        } else {
            classes.push_back(record);
            classes.back_mut()
        };
        if let Some(class) = slot {
            class.icon = desc.icon;
            class.icon_sm = desc.icon_sm;
            class.cursor = desc.cursor;
            class.background = desc.background;
            class.menu_name = desc.menu_name;
            class.winproc = self.winprocs.alloc_winproc(desc.win_proc, desc.ansi);
            if class.icon.is_valid() && !class.icon_sm.is_valid() {
                class.icon_sm_intern = self.callbacks.copy_icon_scaled_small(class.icon);
            }
            debug!(
                "register_class: \"{}\" atom {:#x} ({:?}, instance {:#x})",
                class.name,
                class.atom,
                class.scope,
                class.instance.raw()
            );
        }

        Ok(reply.atom)
    }

    /// Unregister a class and release the resources it held.
    ///
    /// The broker detaches its authoritative record first and hands back
    /// the token stored at creation, which selects the exact local record
    /// to free.
    pub fn unregister_class(
        &self,
        id: ClassId<'_>,
        instance: ModuleHandle,
    ) -> Result<(), UserError> {
        let (atom_req, name_text) = match id {
            ClassId::Atom(atom) => (atom, None),
            ClassId::Name(name) => {
                match parse_integer_atom(name).filter(|&a| a != 0 && a <= ATOM_INTEGER_MAX) {
                    Some(atom) => (atom, None),
                    None => (0, Some(String::from(name))),
                }
            }
        };

        let reply = self.broker.destroy_class(&DestroyClassRequest {
            instance: instance.raw() as u64,
            atom: atom_req,
            name: name_text,
        })?;

        let class = {
            let mut classes = self.classes.lock();
            match classes.iter().position(|c| c.client_token == reply.client_ptr) {
                Some(pos) => classes.remove(pos),
                None => None,
            }
        };
        let Some(class) = class else {
            // broker knew the class but this process never cached it
            return Ok(());
        };

        if class.dce != 0 {
            self.callbacks.free_dce(class.dce, 0);
        }
        if class.background.is_valid() && !class.background.is_color_sentinel() {
            self.callbacks.delete_gdi_object(class.background);
        }
        if class.icon_sm_intern.is_valid() {
            self.callbacks.destroy_cursor(class.icon_sm_intern, 0);
        }

        debug!("unregister_class: \"{}\" atom {:#x}", class.name, class.atom);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Copy out a class descriptor for the requested encoding.
    ///
    /// Looking up anything but the two always-present classes forces the
    /// desktop into existence first, so built-in classes are registered
    /// before the search runs.
    pub fn get_class_info(
        &self,
        instance: ModuleHandle,
        id: ClassId<'_>,
        ansi: bool,
    ) -> Result<ClassInfo, UserError> {
        let always_present = id.resolve_atom() == Some(DESKTOP_CLASS_ATOM)
            || matches!(id, ClassId::Name(name) if name.eq_ignore_ascii_case("Message"));
        if !always_present {
            self.callbacks.create_desktop_window();
        }

        let class = self.find_class(instance, id).ok_or(UserError::NotFound)?;
        let user32 = self.user32_module();

        Ok(ClassInfo {
            style: class.style,
            win_proc: self.winprocs.get_winproc(class.winproc, ansi),
            cls_extra: class.cls_extra,
            wnd_extra: class.wnd_extra,
            instance: if !user32.is_null() && class.instance.base() == user32.base() {
                ModuleHandle::NULL
            } else {
                class.instance
            },
            icon: class.icon,
            icon_sm: if class.icon_sm.is_valid() {
                class.icon_sm
            } else {
                class.icon_sm_intern
            },
            cursor: class.cursor,
            background: class.background,
            menu_name: if ansi { class.menu_name.ansi } else { class.menu_name.wide },
            name: String::from(class.basename()),
            atom: class.atom,
        })
    }

    /// Class name of a window, copied into `buf` NUL-terminated.
    ///
    /// Local windows answer from the cache. Windows of other processes and
    /// the desktop resolve through the broker's base-class query plus the
    /// atom service, as does any query for the real (unversioned) name.
    pub fn get_class_name(
        &self,
        hwnd: HWND,
        real: bool,
        buf: &mut [u8],
    ) -> Result<usize, UserError> {
        if buf.len() <= 1 {
            return Err(UserError::InsufficientBuffer);
        }
        if real {
            return self.remote_class_name(hwnd, buf);
        }
        match self.get_class_ptr(hwnd, false) {
            Ok(class) => Ok(copy_name(class.basename(), buf)),
            Err(UserError::NotFound) if self.callbacks.is_window(hwnd) => {
                self.remote_class_name(hwnd, buf)
            }
            Err(err) => Err(err),
        }
    }

    fn remote_class_name(&self, hwnd: HWND, buf: &mut [u8]) -> Result<usize, UserError> {
        let reply = self
            .broker
            .base_class_info(&BaseClassInfoRequest { window: hwnd })?;
        self.get_atom_name(reply.base_atom, buf)
    }

    /// Resolve an atom to its name through the atom service, with the same
    /// buffer convention as [`Self::get_class_name`]
    pub fn get_atom_name(&self, atom: Atom, buf: &mut [u8]) -> Result<usize, UserError> {
        if buf.len() <= 1 {
            return Err(UserError::InsufficientBuffer);
        }
        let name = self.atoms.get_atom_name(atom)?;
        Ok(copy_name(&name, buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{GdiObjectType, UserHandle, UserObjectType};
    use crate::server::Broker;
    use alloc::collections::BTreeMap;
    use core::sync::atomic::AtomicUsize;

    // Records every resource operation so tests can assert exactly-once
    // release behavior
    struct TestCallbacks {
        image: ModuleHandle,
        desktop_creations: AtomicUsize,
        freed_dce: Mutex<Vec<usize>>,
        deleted_brushes: Mutex<Vec<HBRUSH>>,
        destroyed_icons: Mutex<Vec<HICON>>,
        windows: Mutex<BTreeMap<u32, WinPtr>>,
    }

    impl TestCallbacks {
        fn new(image: ModuleHandle) -> Self {
            Self {
                image,
                desktop_creations: AtomicUsize::new(0),
                freed_dce: Mutex::new(Vec::new()),
                deleted_brushes: Mutex::new(Vec::new()),
                destroyed_icons: Mutex::new(Vec::new()),
                windows: Mutex::new(BTreeMap::new()),
            }
        }

        fn add_window(&self, hwnd: HWND, ptr: WinPtr) {
            self.windows.lock().insert(hwnd.raw(), ptr);
        }
    }

    impl UserCallbacks for TestCallbacks {
        fn create_desktop_window(&self) {
            self.desktop_creations.fetch_add(1, Ordering::Relaxed);
        }

        fn image_base(&self) -> ModuleHandle {
            self.image
        }

        fn copy_icon_scaled_small(&self, icon: HICON) -> HICON {
            UserHandle::new(icon.index() + 100, UserObjectType::Icon)
        }

        fn free_dce(&self, dce: usize, _flags: u32) {
            self.freed_dce.lock().push(dce);
        }

        fn delete_gdi_object(&self, handle: HBRUSH) -> bool {
            self.deleted_brushes.lock().push(handle);
            true
        }

        fn destroy_cursor(&self, cursor: HICON, _flags: u32) -> bool {
            self.destroyed_icons.lock().push(cursor);
            true
        }

        fn get_win_ptr(&self, hwnd: HWND) -> WinPtr {
            self.windows.lock().get(&hwnd.raw()).copied().unwrap_or(WinPtr::None)
        }

        fn is_window(&self, hwnd: HWND) -> bool {
            !matches!(self.get_win_ptr(hwnd), WinPtr::None)
        }
    }

    const USER32: ModuleHandle = ModuleHandle::new(0x7700_0000);
    const MODULE_A: ModuleHandle = ModuleHandle::new(0x0040_0000);
    const MODULE_B: ModuleHandle = ModuleHandle::new(0x1000_0000);

    fn client_procs(base: usize) -> ClientProcs {
        ClientProcs {
            button: WndProc::from_raw(base),
            combo: WndProc::from_raw(base + 1),
            def_window: WndProc::from_raw(base + 2),
            dialog: WndProc::from_raw(base + 3),
            edit: WndProc::from_raw(base + 4),
            listbox: WndProc::from_raw(base + 5),
            mdi_client: WndProc::from_raw(base + 6),
            scrollbar: WndProc::from_raw(base + 7),
            static_ctrl: WndProc::from_raw(base + 8),
            ime: WndProc::from_raw(base + 9),
            desktop: WndProc::from_raw(base + 10),
            icon_title: WndProc::from_raw(base + 11),
            popup_menu: WndProc::from_raw(base + 12),
            message: WndProc::from_raw(base + 13),
        }
    }

    fn session() -> (UserSession, Arc<Broker>, Arc<TestCallbacks>) {
        let broker = Arc::new(Broker::new());
        let callbacks = Arc::new(TestCallbacks::new(MODULE_A));
        let session = UserSession::new(broker.clone(), broker.clone(), callbacks.clone());
        session.init_client_procs(&client_procs(0x1000), &client_procs(0x2000), USER32);
        (session, broker, callbacks)
    }

    fn descriptor<'a>(name: &'a str, instance: ModuleHandle) -> ClassDescriptor<'a> {
        ClassDescriptor {
            cb_size: mem::size_of::<ClassDescriptor>(),
            style: ClassStyle::empty(),
            win_proc: WndProc::from_raw(0x4100_0000),
            cls_extra: 0,
            wnd_extra: 0,
            instance,
            icon: HICON::NULL,
            icon_sm: HICON::NULL,
            cursor: HCURSOR::NULL,
            background: HBRUSH::NULL,
            menu_name: MenuNameRef::default(),
            name: ClassId::Name(name),
            basename_offset: 0,
            ansi: true,
            builtin: false,
        }
    }

    #[test]
    fn test_local_class_register_find_unregister() {
        let (session, _, _) = session();

        let atom = session.register_class(&descriptor("Foo", MODULE_A)).unwrap();
        assert_ne!(atom, 0);

        let found = session.find_class(MODULE_A, ClassId::Name("Foo")).unwrap();
        assert_eq!(found.atom, atom);
        assert_eq!(found.scope, ClassScope::Local);
        drop(found);

        // invisible to other modules
        assert!(session.find_class(MODULE_B, ClassId::Name("Foo")).is_none());

        session.unregister_class(ClassId::Name("Foo"), MODULE_A).unwrap();
        assert!(session.find_class(MODULE_A, ClassId::Name("Foo")).is_none());
    }

    #[test]
    fn test_global_class_visible_to_any_module() {
        let (session, _, _) = session();

        let mut desc = descriptor("Everywhere", MODULE_A);
        desc.style = ClassStyle::GLOBALCLASS;
        let atom = session.register_class(&desc).unwrap();

        let found = session.find_class(MODULE_B, ClassId::Name("Everywhere")).unwrap();
        assert_eq!(found.atom, atom);
        assert_eq!(found.scope, ClassScope::Global);
    }

    #[test]
    fn test_reregistration_returns_same_token() {
        let (session, _, _) = session();

        let atom = session.register_class(&descriptor("Twice", MODULE_A)).unwrap();
        let again = session.register_class(&descriptor("twice", MODULE_A)).unwrap();
        assert_eq!(atom, again);

        // only one cached record
        session.unregister_class(ClassId::Name("Twice"), MODULE_A).unwrap();
        assert!(session.find_class(MODULE_A, ClassId::Name("Twice")).is_none());
    }

    #[test]
    fn test_find_class_is_case_insensitive() {
        let (session, _, _) = session();
        session.register_class(&descriptor("MixedCase", MODULE_A)).unwrap();
        assert!(session.find_class(MODULE_A, ClassId::Name("MIXEDCASE")).is_some());
        assert!(session.find_class(MODULE_A, ClassId::Name("mixedcase")).is_some());
        assert!(session.find_class(MODULE_A, ClassId::Name("mixedcase2")).is_none());
    }

    #[test]
    fn test_module_instance_bits_ignored_in_scope_check() {
        let (session, _, _) = session();
        session.register_class(&descriptor("Scoped", MODULE_A)).unwrap();

        let same_base = ModuleHandle::new(MODULE_A.raw() | 0x1234);
        assert!(session.find_class(same_base, ClassId::Name("Scoped")).is_some());
    }

    #[test]
    fn test_register_by_integer_atom() {
        let (session, _, _) = session();

        let atom = session.register_class(&descriptor("#42", MODULE_A)).unwrap();
        assert_eq!(atom, 42);

        let found = session.find_class(MODULE_A, ClassId::Atom(42)).unwrap();
        assert_eq!(found.name, "#42");
    }

    #[test]
    fn test_invalid_descriptor_rejected_without_broker_call() {
        let (session, _, _) = session();

        let mut bad_size = descriptor("Bad", MODULE_A);
        bad_size.cb_size = 1;
        assert_eq!(session.register_class(&bad_size), Err(UserError::InvalidParameter));

        let mut negative = descriptor("Bad", MODULE_A);
        negative.cls_extra = -1;
        assert_eq!(session.register_class(&negative), Err(UserError::InvalidParameter));

        let mut negative = descriptor("Bad", MODULE_A);
        negative.wnd_extra = -4;
        assert_eq!(session.register_class(&negative), Err(UserError::InvalidParameter));

        assert!(session.find_class(MODULE_A, ClassId::Name("Bad")).is_none());
    }

    #[test]
    fn test_self_registration_rejected_outside_builtin_path() {
        let (session, _, _) = session();

        let err = session.register_class(&descriptor("Sneaky", USER32)).unwrap_err();
        assert_eq!(err, UserError::InvalidParameter);

        let mut builtin = descriptor("Button", USER32);
        builtin.builtin = true;
        assert!(session.register_class(&builtin).is_ok());
    }

    #[test]
    fn test_extra_bytes_soft_limit_recorded_as_given() {
        let (session, _, _) = session();

        let mut desc = descriptor("Greedy", MODULE_A);
        desc.cls_extra = 64;
        session.register_class(&desc).unwrap();

        let found = session.find_class(MODULE_A, ClassId::Name("Greedy")).unwrap();
        assert_eq!(found.cls_extra, 64);
        assert_eq!(found.extra.len(), 64);
        assert!(found.extra.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_local_shadows_global_with_same_name() {
        let (session, _, _) = session();

        let mut global = descriptor("Dup", MODULE_A);
        global.style = ClassStyle::GLOBALCLASS;
        session.register_class(&global).unwrap();
        session.register_class(&descriptor("Dup", MODULE_A)).unwrap();

        let found = session.find_class(MODULE_A, ClassId::Name("Dup")).unwrap();
        assert_eq!(found.scope, ClassScope::Local);
    }

    #[test]
    fn test_unregister_releases_resources_exactly_once() {
        let (session, _, callbacks) = session();

        let mut desc = descriptor("Loaded", MODULE_A);
        desc.background = HBRUSH::new(7, GdiObjectType::Brush);
        desc.icon = UserHandle::new(3, UserObjectType::Icon);
        session.register_class(&desc).unwrap();

        {
            let mut found = session.find_class(MODULE_A, ClassId::Name("Loaded")).unwrap();
            found.dce = 0x1234;
            // small icon was synthesized from the big one
            assert!(found.icon_sm_intern.is_valid());
        }

        session.unregister_class(ClassId::Name("Loaded"), MODULE_A).unwrap();

        assert_eq!(*callbacks.freed_dce.lock(), vec![0x1234]);
        assert_eq!(*callbacks.deleted_brushes.lock(), vec![desc.background]);
        assert_eq!(
            *callbacks.destroyed_icons.lock(),
            vec![UserHandle::new(103, UserObjectType::Icon)]
        );
    }

    #[test]
    fn test_sentinel_brush_survives_unregister() {
        let (session, _, callbacks) = session();

        let mut desc = descriptor("Plain", MODULE_A);
        // a COLOR_* + 1 system brush, owned by the palette
        desc.background = HBRUSH::from_raw(5);
        session.register_class(&desc).unwrap();
        session.unregister_class(ClassId::Name("Plain"), MODULE_A).unwrap();

        assert!(callbacks.deleted_brushes.lock().is_empty());
    }

    #[test]
    fn test_unregister_unknown_class_is_not_found() {
        let (session, _, _) = session();
        let err = session
            .unregister_class(ClassId::Name("Ghost"), MODULE_A)
            .unwrap_err();
        assert_eq!(err, UserError::NotFound);
    }

    #[test]
    fn test_get_class_info_resolves_per_encoding() {
        let (session, _, _) = session();

        let mut desc = descriptor("Info", MODULE_A);
        desc.style = ClassStyle::HREDRAW | ClassStyle::VREDRAW;
        desc.cls_extra = 8;
        desc.wnd_extra = 12;
        desc.icon = UserHandle::new(3, UserObjectType::Icon);
        desc.menu_name = MenuNameRef { ansi: 0xAAAA, wide: 0xBBBB };
        let atom = session.register_class(&desc).unwrap();

        let info = session.get_class_info(MODULE_A, ClassId::Name("Info"), true).unwrap();
        assert_eq!(info.atom, atom);
        assert_eq!(info.style, desc.style);
        assert_eq!(info.cls_extra, 8);
        assert_eq!(info.wnd_extra, 12);
        assert_eq!(info.instance, MODULE_A);
        assert_eq!(info.menu_name, 0xAAAA);
        assert_eq!(info.name, "Info");
        // the ANSI thunk resolves back to the registered procedure
        assert_eq!(info.win_proc, desc.win_proc);
        // no explicit small icon: the synthesized one is reported
        assert_eq!(info.icon_sm, UserHandle::new(103, UserObjectType::Icon));

        // the wide side was never filled in: the thunk handle passes through
        let wide = session.get_class_info(MODULE_A, ClassId::Name("Info"), false).unwrap();
        assert_eq!(wide.menu_name, 0xBBBB);
        assert_ne!(wide.win_proc, desc.win_proc);
    }

    #[test]
    fn test_get_class_info_normalizes_client_module() {
        let (session, _, _) = session();

        let mut builtin = descriptor("Static", USER32);
        builtin.builtin = true;
        session.register_class(&builtin).unwrap();

        let info = session.get_class_info(USER32, ClassId::Name("Static"), true).unwrap();
        assert_eq!(info.instance, ModuleHandle::NULL);
    }

    #[test]
    fn test_get_class_info_bootstraps_desktop_except_wellknown() {
        let (session, _, callbacks) = session();

        let before = callbacks.desktop_creations.load(Ordering::Relaxed);
        let _ = session.get_class_info(ModuleHandle::NULL, ClassId::Atom(DESKTOP_CLASS_ATOM), true);
        let _ = session.get_class_info(ModuleHandle::NULL, ClassId::Name("Message"), true);
        assert_eq!(callbacks.desktop_creations.load(Ordering::Relaxed), before);

        let _ = session.get_class_info(ModuleHandle::NULL, ClassId::Name("Anything"), true);
        assert_eq!(callbacks.desktop_creations.load(Ordering::Relaxed), before + 1);
    }

    #[test]
    fn test_get_class_name_local_window() {
        let (session, _, callbacks) = session();

        let atom = session.register_class(&descriptor("Localest", MODULE_A)).unwrap();
        let hwnd = UserHandle::new(1, UserObjectType::Window);
        callbacks.add_window(hwnd, WinPtr::Window(atom));

        let mut buf = [0u8; 32];
        let n = session.get_class_name(hwnd, false, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Localest");
        assert_eq!(buf[n], 0);

        // truncation is silent
        let mut small = [0u8; 4];
        let n = session.get_class_name(hwnd, false, &mut small).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&small, b"Loc\0");
    }

    #[test]
    fn test_get_class_name_other_process_window() {
        let (session, broker, callbacks) = session();

        // a versioned class owned by some other process
        let reply = broker
            .create_class(&CreateClassRequest {
                local: false,
                style: 0,
                instance: 0x2200_0000,
                cls_extra: 0,
                wnd_extra: 0,
                client_ptr: 99,
                atom: 0,
                name_offset: 3,
                name: Some(String::from("v6!Button")),
            })
            .unwrap();
        let hwnd = UserHandle::new(8, UserObjectType::Window);
        broker.register_window(hwnd, reply.atom);
        callbacks.add_window(hwnd, WinPtr::OtherProcess);

        let mut buf = [0u8; 32];
        let n = session.get_class_name(hwnd, false, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Button");
    }

    #[test]
    fn test_get_class_name_real_resolves_base_name() {
        let (session, broker, callbacks) = session();

        let mut desc = descriptor("7.0!Edit", MODULE_A);
        desc.basename_offset = 4;
        let atom = session.register_class(&desc).unwrap();

        let hwnd = UserHandle::new(2, UserObjectType::Window);
        broker.register_window(hwnd, atom);
        callbacks.add_window(hwnd, WinPtr::Window(atom));

        let mut buf = [0u8; 32];
        let n = session.get_class_name(hwnd, true, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Edit");

        // the unversioned path reports the display name too
        let n = session.get_class_name(hwnd, false, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Edit");
    }

    #[test]
    fn test_get_class_name_buffer_too_small() {
        let (session, _, _) = session();
        let hwnd = UserHandle::new(1, UserObjectType::Window);
        let mut buf = [0u8; 1];
        assert_eq!(
            session.get_class_name(hwnd, false, &mut buf),
            Err(UserError::InsufficientBuffer)
        );
    }

    #[test]
    fn test_get_class_name_unknown_window() {
        let (session, _, _) = session();
        let hwnd = UserHandle::new(77, UserObjectType::Window);
        let mut buf = [0u8; 16];
        assert_eq!(
            session.get_class_name(hwnd, false, &mut buf),
            Err(UserError::NotFound)
        );
    }

    #[test]
    fn test_write_access_to_foreign_class_is_denied() {
        let (session, _, callbacks) = session();

        let foreign = UserHandle::new(9, UserObjectType::Window);
        callbacks.add_window(foreign, WinPtr::OtherProcess);
        assert_eq!(
            session.get_class_ptr(foreign, true).map(|_| ()),
            Err(UserError::AccessDenied)
        );
        // read access falls back to the broker path instead
        assert_eq!(
            session.get_class_ptr(foreign, false).map(|_| ()),
            Err(UserError::NotFound)
        );

        let desktop = UserHandle::new(10, UserObjectType::Window);
        callbacks.add_window(desktop, WinPtr::Desktop);
        assert_eq!(
            session.get_class_ptr(desktop, true).map(|_| ()),
            Err(UserError::AccessDenied)
        );
    }

    #[test]
    fn test_get_atom_name_roundtrip() {
        let (session, broker, _) = session();

        let atom = AtomService::add_atom(&*broker, "Interned").unwrap();
        let mut buf = [0u8; 16];
        let n = session.get_atom_name(atom, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"Interned");

        assert_eq!(
            session.get_atom_name(0xFFFE, &mut buf),
            Err(UserError::NotFound)
        );
        assert_eq!(
            session.get_atom_name(atom, &mut buf[..1]),
            Err(UserError::InsufficientBuffer)
        );
    }
}
