//! win32u User Subsystem Client
//!
//! A Rust recreation of the NT window-class machinery: the process-shared
//! window-class registry and its window-procedure thunk table, with the
//! authoritative class list owned by an out-of-process broker.
//!
//! # Architecture Overview
//!
//! - **handle** - USER/GDI tagged handle types and module handles
//! - **winproc** - procedure thunk table and its tagged-handle codec
//! - **class** - class records, the local registry cache, public operations
//! - **atom** - string-interning atom table, owned by the broker
//! - **server** - broker request/reply protocol and the in-process broker
//! - **client** - callback interface into the windowing client layer
//! - **error** - the subsystem error taxonomy
//!
//! A `RegisterClass` call thunks the window procedure, asks the broker to
//! create the authoritative record, and links a local cache record on
//! success; lookups serve from the cache for classes this process knows
//! and fall back to a broker query for windows owned elsewhere.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod atom;
pub mod class;
pub mod client;
pub mod error;
pub mod handle;
pub mod server;
pub mod winproc;

pub use atom::{Atom, AtomService};
pub use class::{
    Class, ClassDescriptor, ClassId, ClassInfo, ClassScope, ClassStyle, FoundClass, MenuNameRef,
    UserSession, DESKTOP_CLASS_ATOM, MAX_CLASS_NAME,
};
pub use client::{ClientProcs, UserCallbacks, WinPtr};
pub use error::{BrokerError, UserError};
pub use handle::{GdiHandle, ModuleHandle, UserHandle, HBRUSH, HCURSOR, HICON, HWND};
pub use server::{Broker, ClassBroker};
pub use winproc::{BuiltinProc, ProcSlot, WinProcTable, WndProc, MAX_WINPROCS};
