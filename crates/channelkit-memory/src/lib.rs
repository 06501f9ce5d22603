//! # channelkit-memory
//!
//! Memory layer for locally stored channels.
//!
//! This crate provides `MemoryRepository`, a [`Repository`] that keeps
//! channels in user-defined order for the lifetime of the process. Every
//! operation settles before it returns.
//!
//! It intentionally does not persist anything.
//!
//! ## Data model
//!
//! ```text
//! update(channels)     ← upsert by identity, new ones appended
//!     │
//! Vec<Channel>         ← stored order
//!     │
//! reorder(identities)  ← listed identities first, the rest keep order
//! ```
//!
//! [`Repository`]: channelkit_kernel::Repository

pub mod memory;

pub use memory::MemoryRepository;
