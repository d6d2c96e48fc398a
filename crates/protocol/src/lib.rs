//! Wire types for the content capture service protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! client-side capture manager and the remote capture service. These types
//! represent the "protocol layer": the shapes of data as they cross the IPC
//! boundary.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization and small predicates
//! * 1:1 with the wire: result codes and bit values never change meaning
//! * Stable: Changes only when the wire protocol changes
//!
//! The coordination logic is built on top of these types in `capture-rs`.

pub mod codes;
pub mod events;
pub mod flags;
pub mod types;

pub use codes::*;
pub use events::*;
pub use flags::*;
pub use types::*;
