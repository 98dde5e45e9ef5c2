//! In-Process Class Broker
//!
//! Reference broker used when the whole desktop runs inside one address
//! space, and by the test suites. Holds the authoritative class records,
//! the shared atom table, and a window-to-class map so clients can resolve
//! class names for windows they do not own.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, trace};
use spin::Mutex;

use crate::atom::{Atom, AtomService, AtomTable, ATOM_INTEGER_MAX, ATOM_INVALID};
use crate::error::BrokerError;
use crate::handle::HWND;
use crate::server::{
    BaseClassInfoReply, BaseClassInfoRequest, ClassBroker, CreateClassReply, CreateClassRequest,
    DestroyClassReply, DestroyClassRequest,
};

/// Low word of a module token is ignored when matching owners
const INSTANCE_MASK: u64 = !0xFFFF;

// ============================================================================
// Class Records
// ============================================================================

/// Authoritative class record
#[derive(Debug)]
struct BrokerClass {
    atom: Atom,
    /// Atom of the name with any version prefix stripped
    base_atom: Atom,
    instance: u64,
    local: bool,
    #[allow(dead_code)]
    style: u32,
    #[allow(dead_code)]
    cls_extra: i32,
    #[allow(dead_code)]
    wnd_extra: i32,
    client_ptr: u64,
}

/// In-process class broker
pub struct Broker {
    classes: Mutex<Vec<BrokerClass>>,
    atoms: Mutex<AtomTable>,
    /// Window handle to class atom, for windows of every process
    windows: Mutex<BTreeMap<u32, Atom>>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            classes: Mutex::new(Vec::new()),
            atoms: Mutex::new(AtomTable::new()),
            windows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a window and the class it was instantiated from, so that
    /// base-class queries can answer for it
    pub fn register_window(&self, hwnd: HWND, class_atom: Atom) {
        self.windows.lock().insert(hwnd.raw(), class_atom);
    }

    /// Forget a destroyed window
    pub fn unregister_window(&self, hwnd: HWND) {
        self.windows.lock().remove(&hwnd.raw());
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Broker Calls
// ============================================================================

impl ClassBroker for Broker {
    fn create_class(&self, req: &CreateClassRequest) -> Result<CreateClassReply, BrokerError> {
        let mut classes = self.classes.lock();
        let mut atoms = self.atoms.lock();

        // Resolve the token without taking a reference yet, so a duplicate
        // registration leaves the atom table untouched
        let probe = if req.atom != ATOM_INVALID {
            if req.atom > ATOM_INTEGER_MAX && atoms.get_atom_name(req.atom).is_none() {
                return Err(BrokerError::InvalidAtom);
            }
            req.atom
        } else {
            let name = req
                .name
                .as_deref()
                .filter(|n| !n.is_empty())
                .ok_or(BrokerError::InvalidAtom)?;
            atoms.find_atom(name).unwrap_or(ATOM_INVALID)
        };

        if probe != ATOM_INVALID {
            if let Some(existing) = classes.iter().find(|c| {
                c.atom == probe
                    && c.local == req.local
                    && (c.instance & INSTANCE_MASK) == (req.instance & INSTANCE_MASK)
            }) {
                trace!(
                    "create_class: atom {:#x} already registered for instance {:#x}",
                    probe,
                    req.instance
                );
                return Ok(CreateClassReply {
                    atom: probe,
                    existing: true,
                    client_ptr: existing.client_ptr,
                });
            }
        }

        // Intern for real; each class holds one reference on its atom
        let name = match req.name.as_deref() {
            Some(n) => String::from(n),
            None => atoms
                .get_atom_name(req.atom)
                .ok_or(BrokerError::InvalidAtom)?,
        };
        let atom = atoms.add_atom(&name).map_err(|_| BrokerError::InvalidAtom)?;

        let base_atom = match name.get(req.name_offset..) {
            Some(base) if req.name_offset > 0 && !base.is_empty() => {
                atoms.add_atom(base).map_err(|_| BrokerError::InvalidAtom)?
            }
            _ => atom,
        };

        classes.push(BrokerClass {
            atom,
            base_atom,
            instance: req.instance,
            local: req.local,
            style: req.style,
            cls_extra: req.cls_extra,
            wnd_extra: req.wnd_extra,
            client_ptr: req.client_ptr,
        });

        debug!(
            "create_class: \"{}\" -> atom {:#x} (base {:#x}, {}, instance {:#x})",
            name,
            atom,
            base_atom,
            if req.local { "local" } else { "global" },
            req.instance
        );

        Ok(CreateClassReply {
            atom,
            existing: false,
            client_ptr: req.client_ptr,
        })
    }

    fn destroy_class(&self, req: &DestroyClassRequest) -> Result<DestroyClassReply, BrokerError> {
        let mut classes = self.classes.lock();
        let mut atoms = self.atoms.lock();

        let atom = if req.atom != ATOM_INVALID {
            req.atom
        } else {
            let name = req.name.as_deref().ok_or(BrokerError::NotFound)?;
            atoms.find_atom(name).ok_or(BrokerError::NotFound)?
        };

        let pos = classes
            .iter()
            .position(|c| {
                c.atom == atom && (c.instance & INSTANCE_MASK) == (req.instance & INSTANCE_MASK)
            })
            .ok_or(BrokerError::NotFound)?;
        let class = classes.remove(pos);

        let _ = atoms.delete_atom(class.atom);
        if class.base_atom != class.atom {
            let _ = atoms.delete_atom(class.base_atom);
        }

        debug!(
            "destroy_class: atom {:#x} for instance {:#x}",
            atom, req.instance
        );

        Ok(DestroyClassReply {
            client_ptr: class.client_ptr,
        })
    }

    fn base_class_info(
        &self,
        req: &BaseClassInfoRequest,
    ) -> Result<BaseClassInfoReply, BrokerError> {
        let windows = self.windows.lock();
        let atom = *windows
            .get(&req.window.raw())
            .ok_or(BrokerError::InvalidHandle)?;

        let classes = self.classes.lock();
        let base_atom = classes
            .iter()
            .find(|c| c.atom == atom)
            .map(|c| c.base_atom)
            .unwrap_or(atom);

        Ok(BaseClassInfoReply { base_atom })
    }
}

// ============================================================================
// Atom Service
// ============================================================================

impl AtomService for Broker {
    fn add_atom(&self, name: &str) -> Result<Atom, BrokerError> {
        self.atoms
            .lock()
            .add_atom(name)
            .map_err(|_| BrokerError::InvalidAtom)
    }

    fn get_atom_name(&self, atom: Atom) -> Result<String, BrokerError> {
        self.atoms
            .lock()
            .get_atom_name(atom)
            .ok_or(BrokerError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{UserHandle, UserObjectType};

    fn create_req(name: &str, instance: u64, local: bool) -> CreateClassRequest {
        CreateClassRequest {
            local,
            style: 0,
            instance,
            cls_extra: 0,
            wnd_extra: 0,
            client_ptr: instance ^ 0x5A5A,
            atom: ATOM_INVALID,
            name_offset: 0,
            name: Some(String::from(name)),
        }
    }

    #[test]
    fn test_create_then_destroy_roundtrips_client_ptr() {
        let broker = Broker::new();
        let mut req = create_req("MyClass", 0x40_0000, false);
        req.client_ptr = 0xDEAD_BEEF;
        let reply = broker.create_class(&req).unwrap();
        assert!(!reply.existing);

        let destroyed = broker
            .destroy_class(&DestroyClassRequest {
                instance: 0x40_0000,
                atom: reply.atom,
                name: None,
            })
            .unwrap();
        assert_eq!(destroyed.client_ptr, 0xDEAD_BEEF);
    }

    #[test]
    fn test_duplicate_create_reports_existing_record() {
        let broker = Broker::new();
        let first = broker.create_class(&create_req("Edit", 0x40_0000, false)).unwrap();

        let mut dup = create_req("EDIT", 0x40_0000, false);
        dup.client_ptr = 0x1234;
        let reply = broker.create_class(&dup).unwrap();

        assert!(reply.existing);
        assert_eq!(reply.atom, first.atom);
        assert_eq!(reply.client_ptr, first.client_ptr);

        // One record, one atom reference: a single destroy clears it
        broker
            .destroy_class(&DestroyClassRequest {
                instance: 0x40_0000,
                atom: first.atom,
                name: None,
            })
            .unwrap();
        assert!(broker.get_atom_name(first.atom).is_err());
    }

    #[test]
    fn test_same_name_different_modules_share_the_atom() {
        let broker = Broker::new();
        let a = broker.create_class(&create_req("Shared", 0x40_0000, true)).unwrap();
        let b = broker.create_class(&create_req("Shared", 0x7F_0000, true)).unwrap();
        assert_eq!(a.atom, b.atom);
        assert!(!b.existing);

        broker
            .destroy_class(&DestroyClassRequest {
                instance: 0x40_0000,
                atom: a.atom,
                name: None,
            })
            .unwrap();
        // Second registration still holds a reference
        assert_eq!(broker.get_atom_name(a.atom).unwrap(), "Shared");

        broker
            .destroy_class(&DestroyClassRequest {
                instance: 0x7F_0000,
                atom: a.atom,
                name: None,
            })
            .unwrap();
        assert!(broker.get_atom_name(a.atom).is_err());
    }

    #[test]
    fn test_destroy_unknown_class_is_not_found() {
        let broker = Broker::new();
        let err = broker
            .destroy_class(&DestroyClassRequest {
                instance: 0,
                atom: ATOM_INVALID,
                name: Some(String::from("Nope")),
            })
            .unwrap_err();
        assert_eq!(err, BrokerError::NotFound);
    }

    #[test]
    fn test_instance_low_word_is_ignored() {
        let broker = Broker::new();
        broker.create_class(&create_req("Local", 0x40_0000, true)).unwrap();
        let reply = broker
            .destroy_class(&DestroyClassRequest {
                instance: 0x40_1234,
                atom: ATOM_INVALID,
                name: Some(String::from("Local")),
            })
            .unwrap();
        assert_eq!(reply.client_ptr, 0x40_0000 ^ 0x5A5A);
    }

    #[test]
    fn test_versioned_class_resolves_to_base_atom() {
        let broker = Broker::new();
        let mut req = create_req("6.0.3790.0!Button", 0x40_0000, false);
        req.name_offset = "6.0.3790.0!".len();
        let reply = broker.create_class(&req).unwrap();

        let hwnd = UserHandle::new(7, UserObjectType::Window);
        broker.register_window(hwnd, reply.atom);

        let info = broker
            .base_class_info(&BaseClassInfoRequest { window: hwnd })
            .unwrap();
        assert_ne!(info.base_atom, reply.atom);
        assert_eq!(broker.get_atom_name(info.base_atom).unwrap(), "Button");
    }

    #[test]
    fn test_unknown_window_is_invalid_handle() {
        let broker = Broker::new();
        let hwnd = UserHandle::new(99, UserObjectType::Window);
        let err = broker
            .base_class_info(&BaseClassInfoRequest { window: hwnd })
            .unwrap_err();
        assert_eq!(err, BrokerError::InvalidHandle);
    }
}
