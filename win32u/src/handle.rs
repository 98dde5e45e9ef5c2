//! USER and GDI Handle Types
//!
//! Handles are pointer-free tagged values: an object type in the high byte
//! and a table index in the low word. Nothing in this crate hands out raw
//! pointers to table entries; everything goes through a handle.

// ============================================================================
// Object Types
// ============================================================================

/// USER object types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserObjectType {
    None = 0,
    Window = 1,
    Menu = 2,
    Cursor = 3,
    Icon = 4,
}

/// GDI object types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdiObjectType {
    None = 0,
    DC = 1,
    Bitmap = 2,
    Brush = 3,
}

// ============================================================================
// Handle Types
// ============================================================================

/// USER handle (HWND, HCURSOR, HICON, ...)
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserHandle(u32);

impl UserHandle {
    pub const NULL: UserHandle = UserHandle(0);

    /// Create a new handle from index and type
    pub const fn new(index: u16, obj_type: UserObjectType) -> Self {
        UserHandle(((obj_type as u32) << 24) | (index as u32))
    }

    /// Get the object type from handle
    pub const fn object_type(self) -> UserObjectType {
        match (self.0 >> 24) as u8 {
            1 => UserObjectType::Window,
            2 => UserObjectType::Menu,
            3 => UserObjectType::Cursor,
            4 => UserObjectType::Icon,
            _ => UserObjectType::None,
        }
    }

    /// Get the index from handle
    pub const fn index(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Check if handle is valid
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Get raw handle value
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// GDI handle (HDC, HBRUSH, ...)
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GdiHandle(u32);

impl GdiHandle {
    pub const NULL: GdiHandle = GdiHandle(0);

    /// Create a new handle from index and type
    pub const fn new(index: u16, obj_type: GdiObjectType) -> Self {
        GdiHandle(((obj_type as u32) << 24) | (index as u32))
    }

    /// Reconstruct a handle from its raw value
    pub const fn from_raw(raw: u32) -> Self {
        GdiHandle(raw)
    }

    /// Get the index from handle
    pub const fn index(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Check if handle is valid
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Get raw handle value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check for a system-color brush sentinel (COLOR_* + 1).
    ///
    /// Background brushes in this range are owned by the system palette and
    /// must never be deleted when a class goes away.
    pub const fn is_color_sentinel(self) -> bool {
        self.0 <= COLOR_GRADIENTINACTIVECAPTION + 1
    }
}

/// Highest system color index usable as a background brush sentinel
pub const COLOR_GRADIENTINACTIVECAPTION: u32 = 28;

// Type aliases for clarity
pub type HWND = UserHandle;
pub type HCURSOR = UserHandle;
pub type HICON = UserHandle;
pub type HBRUSH = GdiHandle;

// ============================================================================
// Module Handles
// ============================================================================

/// Module (instance) handle: the base address of the module that registered
/// a class. The low word carries per-instance bits that do not take part in
/// identity comparisons.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleHandle(usize);

impl ModuleHandle {
    pub const NULL: ModuleHandle = ModuleHandle(0);

    pub const fn new(base: usize) -> Self {
        ModuleHandle(base)
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Module identity: high-order bits only
    pub const fn base(self) -> usize {
        self.0 & !0xFFFF
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_handle_roundtrip() {
        let h = UserHandle::new(42, UserObjectType::Window);
        assert_eq!(h.index(), 42);
        assert_eq!(h.object_type(), UserObjectType::Window);
        assert!(h.is_valid());
        assert!(!UserHandle::NULL.is_valid());
    }

    #[test]
    fn test_brush_color_sentinel() {
        assert!(HBRUSH::from_raw(0).is_color_sentinel());
        assert!(HBRUSH::from_raw(COLOR_GRADIENTINACTIVECAPTION + 1).is_color_sentinel());
        assert!(!HBRUSH::from_raw(COLOR_GRADIENTINACTIVECAPTION + 2).is_color_sentinel());
        assert!(!GdiHandle::new(7, GdiObjectType::Brush).is_color_sentinel());
    }

    #[test]
    fn test_module_base_masks_instance_bits() {
        let a = ModuleHandle::new(0x0040_0000);
        let b = ModuleHandle::new(0x0040_1234);
        assert_eq!(a.base(), b.base());
        assert_ne!(a.raw(), b.raw());
    }
}
