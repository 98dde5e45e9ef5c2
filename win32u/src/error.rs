//! Subsystem Error Codes
//!
//! Errors are returned to the immediate caller; nothing in this crate
//! retries internally and no failure is fatal to the process.

/// Errors surfaced by the public USER operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserError {
    /// Malformed descriptor or argument; rejected before any broker call
    InvalidParameter,
    /// Unknown class, window, or atom
    NotFound,
    /// Write access to a class owned by another process
    AccessDenied,
    /// Output buffer cannot hold even a terminator
    InsufficientBuffer,
    /// The broker already has a class with this name for the module
    ClassExists,
    /// The broker call itself failed
    CallFailed,
}

/// Errors reported by the class broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// A matching class already exists
    ClassExists,
    /// No matching class or atom
    NotFound,
    /// Atom is not valid or the atom table is full
    InvalidAtom,
    /// Window handle unknown to the broker
    InvalidHandle,
    /// Transport failure (distinct from "no such class")
    CallFailed,
}

impl From<BrokerError> for UserError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ClassExists => UserError::ClassExists,
            BrokerError::NotFound => UserError::NotFound,
            BrokerError::InvalidAtom => UserError::InvalidParameter,
            BrokerError::InvalidHandle => UserError::NotFound,
            BrokerError::CallFailed => UserError::CallFailed,
        }
    }
}
