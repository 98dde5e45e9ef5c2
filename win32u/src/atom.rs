//! Atom Table
//!
//! Interns short strings to 16-bit integer tokens. Class names travel
//! between processes as atoms; the broker owns the table and every client
//! resolves names through it.
//!
//! - Integer atoms (`#123` or values up to 0xBFFF) are their own token and
//!   are never stored
//! - String atoms start at 0xC000, are case-insensitive, and are reference
//!   counted
//!
//! # References
//!
//! Based on the Windows NT executive atom table (`ntos/ex/exatom.c`).

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

// ============================================================================
// Constants
// ============================================================================

/// Atom type (16-bit token)
pub type Atom = u16;

/// Invalid atom value
pub const ATOM_INVALID: Atom = 0;

/// Maximum integer atom value
pub const ATOM_INTEGER_MAX: Atom = 0xBFFF;

/// First string atom value
pub const ATOM_STRING_BASE: Atom = 0xC000;

/// Maximum atom name length
pub const MAX_ATOM_LEN: usize = 255;

/// Maximum number of atoms per table
pub const ATOM_TABLE_MAX_SIZE: usize = 16384;

// ============================================================================
// Service Boundary
// ============================================================================

/// Atom-interning service as consumed by the class registry. The broker
/// owns the table; clients only see this interface.
pub trait AtomService: Send + Sync {
    fn add_atom(&self, name: &str) -> Result<Atom, crate::error::BrokerError>;
    fn get_atom_name(&self, atom: Atom) -> Result<alloc::string::String, crate::error::BrokerError>;
}

/// Parse an integer atom from its textual form (`#number`)
pub fn parse_integer_atom(name: &str) -> Option<Atom> {
    let digits = name.strip_prefix('#')?;
    if digits.is_empty() {
        return None;
    }
    digits.parse::<Atom>().ok()
}

// ============================================================================
// Atom Table
// ============================================================================

/// Atom entry
#[derive(Debug, Clone)]
struct AtomEntry {
    /// Atom name, original casing
    name: String,
    /// Reference count
    ref_count: u32,
}

/// Atom table
#[derive(Debug, Default)]
pub struct AtomTable {
    /// Atoms by value
    atoms: BTreeMap<Atom, AtomEntry>,
    /// Atoms by name (lowercase for case-insensitive lookup)
    by_name: BTreeMap<String, Atom>,
    /// Next available atom
    next_atom: Atom,
}

impl AtomTable {
    pub fn new() -> Self {
        Self {
            atoms: BTreeMap::new(),
            by_name: BTreeMap::new(),
            next_atom: ATOM_STRING_BASE,
        }
    }

    /// Intern a name, or bump the reference count of an existing atom
    pub fn add_atom(&mut self, name: &str) -> Result<Atom, &'static str> {
        if name.is_empty() {
            return Err("empty atom name");
        }
        if name.len() > MAX_ATOM_LEN {
            return Err("atom name too long");
        }

        if let Some(int_atom) = parse_integer_atom(name) {
            if int_atom <= ATOM_INTEGER_MAX {
                return Ok(int_atom);
            }
            return Err("integer atom out of range");
        }

        let lower_name = name.to_ascii_lowercase();
        if let Some(&existing) = self.by_name.get(&lower_name) {
            if let Some(entry) = self.atoms.get_mut(&existing) {
                entry.ref_count = entry.ref_count.saturating_add(1);
            }
            return Ok(existing);
        }

        if self.atoms.len() >= ATOM_TABLE_MAX_SIZE {
            return Err("atom table full");
        }
        if self.next_atom == Atom::MAX {
            return Err("no more atoms available");
        }

        let atom = self.next_atom;
        self.next_atom += 1;

        self.atoms.insert(
            atom,
            AtomEntry {
                name: String::from(name),
                ref_count: 1,
            },
        );
        self.by_name.insert(lower_name, atom);

        Ok(atom)
    }

    /// Find an atom by name without adding a reference
    pub fn find_atom(&self, name: &str) -> Option<Atom> {
        if name.is_empty() {
            return None;
        }
        if let Some(int_atom) = parse_integer_atom(name) {
            if int_atom <= ATOM_INTEGER_MAX {
                return Some(int_atom);
            }
            return None;
        }
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    /// Drop one reference; the atom disappears when the last one goes
    pub fn delete_atom(&mut self, atom: Atom) -> Result<(), &'static str> {
        // Integer atoms are not stored and cannot be deleted
        if atom <= ATOM_INTEGER_MAX {
            return Ok(());
        }

        let entry = self.atoms.get_mut(&atom).ok_or("atom not found")?;
        if entry.ref_count > 1 {
            entry.ref_count -= 1;
            return Ok(());
        }

        let lower_name = entry.name.to_ascii_lowercase();
        self.by_name.remove(&lower_name);
        self.atoms.remove(&atom);
        Ok(())
    }

    /// Get atom name; integer atoms render as `#number`
    pub fn get_atom_name(&self, atom: Atom) -> Option<String> {
        if atom == ATOM_INVALID {
            return None;
        }
        if atom <= ATOM_INTEGER_MAX {
            return Some(format!("#{}", atom));
        }
        self.atoms.get(&atom).map(|e| e.name.clone())
    }

    /// Number of string atoms currently interned
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
