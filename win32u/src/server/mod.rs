//! Class Broker Protocol
//!
//! The authoritative list of window classes for the whole desktop lives in
//! a broker outside this process. Every class created or destroyed here is
//! mirrored there through a synchronous request/reply exchange; the local
//! registry is only a cache of what this process created or observed.
//!
//! The transport is a black box: reliable, in-order, one outstanding reply
//! per request on the calling thread, no timeout. Transport failure is
//! surfaced as [`BrokerError::CallFailed`], never retried here.

pub mod broker;

pub use broker::Broker;

use alloc::string::String;

use crate::atom::Atom;
use crate::error::BrokerError;
use crate::handle::HWND;

// ============================================================================
// Requests and Replies
// ============================================================================

/// Create a class record in the broker
#[derive(Debug, Clone)]
pub struct CreateClassRequest {
    /// Per-module class when set, desktop-wide otherwise
    pub local: bool,
    /// Class style bits
    pub style: u32,
    /// Owning-module token
    pub instance: u64,
    /// Extra class bytes
    pub cls_extra: i32,
    /// Extra window bytes
    pub wnd_extra: i32,
    /// Opaque back-reference the broker stores and hands back at destroy
    /// time; the broker never dereferences it
    pub client_ptr: u64,
    /// Pre-resolved numeric token, or 0 when the trailing name is used
    pub atom: Atom,
    /// Bytes of version prefix to skip when deriving the base name
    pub name_offset: usize,
    /// Trailing name payload, present when `atom` is 0
    pub name: Option<String>,
}

/// Reply to [`CreateClassRequest`]
#[derive(Debug, Clone, Copy)]
pub struct CreateClassReply {
    /// Canonical numeric token for the class
    pub atom: Atom,
    /// Set when an identical class already existed; `client_ptr` is then
    /// the original registration's back-reference and no new record was
    /// created
    pub existing: bool,
    /// Back-reference of the authoritative record
    pub client_ptr: u64,
}

/// Destroy a class record in the broker
#[derive(Debug, Clone)]
pub struct DestroyClassRequest {
    /// Owning-module token
    pub instance: u64,
    /// Numeric token, or 0 when the trailing name is used
    pub atom: Atom,
    /// Trailing name payload, present when `atom` is 0
    pub name: Option<String>,
}

/// Reply to [`DestroyClassRequest`]
#[derive(Debug, Clone, Copy)]
pub struct DestroyClassReply {
    /// The back-reference stored at creation time; tells the caller which
    /// process-local record to free
    pub client_ptr: u64,
}

/// Query the class token of a window owned by any process
#[derive(Debug, Clone, Copy)]
pub struct BaseClassInfoRequest {
    pub window: HWND,
}

/// Reply to [`BaseClassInfoRequest`]
#[derive(Debug, Clone, Copy)]
pub struct BaseClassInfoReply {
    /// Base numeric token of the window's class (version prefix stripped)
    pub base_atom: Atom,
}

// ============================================================================
// Broker Interface
// ============================================================================

/// Synchronous call interface to the class broker.
///
/// Blocking, no timeout; each call is at most one round trip. "No such
/// class" ([`BrokerError::NotFound`]) is distinct from transport failure.
pub trait ClassBroker: Send + Sync {
    fn create_class(&self, req: &CreateClassRequest) -> Result<CreateClassReply, BrokerError>;
    fn destroy_class(&self, req: &DestroyClassRequest) -> Result<DestroyClassReply, BrokerError>;
    fn base_class_info(&self, req: &BaseClassInfoRequest)
        -> Result<BaseClassInfoReply, BrokerError>;
}
