//! Canonical in-memory channel list.

use channelkit_kernel::{
    AnyIdentity, Channel, CodecError, Future, Identity, IdentityTypes, Repository,
    RepositoryError, TypeName,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Locally stored channels, held in memory in user-defined order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    channels: Mutex<Vec<Channel>>,
    types: Mutex<IdentityTypes>,
}

impl MemoryRepository {
    /// An empty repository with no registered identity types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from an initial channel list.
    ///
    /// Duplicate identities are resolved with last-write-wins semantics; the
    /// surviving channel keeps the position of the first occurrence.
    pub fn from_channels(channels: Vec<Channel>) -> Self {
        let mut stored = Vec::with_capacity(channels.len());
        upsert(&mut stored, channels);
        Self {
            channels: Mutex::new(stored),
            types: Mutex::default(),
        }
    }

    /// Register identity type `T` under `name`.
    pub fn register<T>(&self, name: impl Into<TypeName>)
    where
        T: Identity + DeserializeOwned,
    {
        let name = name.into();
        tracing::debug!(tag = %name, "registered identity type with repository");
        self.types.lock().insert::<T>(name);
    }

    /// Total number of stored channels.
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// Whether the repository holds zero channels.
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Lookup one stored channel by identity.
    pub fn get(&self, identity: &AnyIdentity) -> Option<Channel> {
        self.channels
            .lock()
            .iter()
            .find(|channel| &channel.id == identity)
            .cloned()
    }

    /// Remove the channel stored under `identity`.
    ///
    /// Returns the removed channel if present.
    pub fn remove(&self, identity: &AnyIdentity) -> Option<Channel> {
        let mut channels = self.channels.lock();
        let index = channels
            .iter()
            .position(|channel| &channel.id == identity)?;
        Some(channels.remove(index))
    }

    /// Snapshot of stored channels, in stored order.
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels.lock().clone()
    }

    /// Stored identities in stored order, each in `[tag, payload]` form.
    ///
    /// Fails if any stored identity's type is not registered.
    pub fn encoded_order(&self) -> Result<Vec<Value>, CodecError> {
        let types = self.types.lock().clone();
        self.channels
            .lock()
            .iter()
            .map(|channel| channel.id.encode(types.encoding()))
            .collect()
    }

    /// Decode `encoded` with the registered types and reorder by it.
    pub fn reorder_encoded(&self, encoded: Vec<Value>) -> Future<(), RepositoryError> {
        let types = self.types.lock().clone();
        let decoded: Result<Vec<AnyIdentity>, CodecError> = encoded
            .into_iter()
            .map(|value| AnyIdentity::decode(value, types.decoding()))
            .collect();
        match decoded {
            Ok(identities) => self.reorder(&identities),
            Err(error) => Future::rejected(error.into()),
        }
    }
}

impl Repository for MemoryRepository {
    fn register_types(&self, types: &IdentityTypes) {
        self.types.lock().merge(types);
    }

    fn channels(&self) -> Future<Vec<Channel>, RepositoryError> {
        Future::resolved(self.snapshot())
    }

    fn update(&self, channels: Vec<Channel>) -> Future<(), RepositoryError> {
        let count = channels.len();
        upsert(&mut self.channels.lock(), channels);
        tracing::debug!(count, "updated stored channels");
        Future::resolved(())
    }

    fn reorder(&self, identities: &[AnyIdentity]) -> Future<(), RepositoryError> {
        let mut channels = self.channels.lock();

        let mut positions = Vec::with_capacity(identities.len());
        for identity in identities {
            let Some(index) = channels.iter().position(|channel| &channel.id == identity) else {
                tracing::warn!(?identity, "reorder references an unknown identity");
                return Future::rejected(RepositoryError::UnknownIdentity(format!(
                    "{identity:?}"
                )));
            };
            if !positions.contains(&index) {
                positions.push(index);
            }
        }

        let mut taken: Vec<Option<Channel>> = channels.drain(..).map(Some).collect();
        let mut reordered: Vec<Channel> = positions
            .iter()
            .filter_map(|&index| taken[index].take())
            .collect();
        reordered.extend(taken.into_iter().flatten());
        *channels = reordered;

        Future::resolved(())
    }
}

/// Replace channels with an equal identity in place; append the rest.
fn upsert(stored: &mut Vec<Channel>, incoming: Vec<Channel>) {
    for channel in incoming {
        match stored.iter_mut().find(|existing| existing.id == channel.id) {
            Some(existing) => *existing = channel,
            None => stored.push(channel),
        }
    }
}
