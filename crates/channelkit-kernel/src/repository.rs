//! Local channel storage contract.
//!
//! The kernel consumes a repository but does not implement one; see
//! `channelkit-memory` for an in-memory implementation.

use crate::any_identity::{AnyIdentity, IdentityTypes};
use crate::channel::Channel;
use crate::error::CodecError;
use crate::future::Future;
use crate::result::SharedError;

/// Errors surfaced by a [`Repository`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    /// An operation referenced an identity the repository does not hold.
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// A stored identity could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[source] SharedError),
}

/// Locally stored channels, in user-defined order.
pub trait Repository: Send + Sync {
    /// Make the identity types in `types` known to the repository under
    /// their tags, so that it can encode and decode the identities it holds.
    fn register_types(&self, types: &IdentityTypes);

    /// All stored channels, in stored order.
    fn channels(&self) -> Future<Vec<Channel>, RepositoryError>;

    /// Replace stored channels with newer snapshots of the same identities,
    /// storing the ones not yet present.
    fn update(&self, channels: Vec<Channel>) -> Future<(), RepositoryError>;

    /// Reorder stored channels so that `identities` come first, in order.
    fn reorder(&self, identities: &[AnyIdentity]) -> Future<(), RepositoryError>;
}
