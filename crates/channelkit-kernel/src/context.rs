//! The identity registry and fetch dispatcher.
//!
//! A [`Context`] maps type tags to handlers:
//!
//! ```text
//! NoHandler     ← type is known, nothing can fetch it
//!     │
//! SingleFetch   ← a Service fetches one identity at a time
//!     │
//! BatchFetch    ← a BatchService fetches one or many
//! ```
//!
//! Registering a tag always installs the given capability, replacing any
//! earlier registration for that tag. Handlers are closures that capture
//! the concrete service and downcast erased identities to its identity
//! type, so the registry itself never names a concrete identity type.
//!
//! The registry lock is held only to read or replace entries; services run
//! after it is released.

use crate::any_identity::AnyIdentity;
use crate::channel::Channel;
use crate::config::{BatchFallback, ContextConfig};
use crate::future::{Future, join_all};
use crate::identity::{Identity, TypeName};
use crate::repository::Repository;
use crate::service::{BatchService, Service, ServiceError};
use parking_lot::Mutex;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type FetchOne = Arc<dyn Fn(&dyn Identity) -> Option<Future<Channel, ServiceError>> + Send + Sync>;
type FetchMany =
    Arc<dyn Fn(&[AnyIdentity]) -> Option<Future<Vec<Channel>, ServiceError>> + Send + Sync>;

/// The capability registered for a type tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SupportKind {
    NoHandler,
    SingleFetch,
    BatchFetch,
}

#[derive(Clone)]
enum Support {
    NoHandler,
    SingleFetch(FetchOne),
    BatchFetch { one: FetchOne, many: FetchMany },
}

impl Support {
    fn kind(&self) -> SupportKind {
        match self {
            Support::NoHandler => SupportKind::NoHandler,
            Support::SingleFetch(_) => SupportKind::SingleFetch,
            Support::BatchFetch { .. } => SupportKind::BatchFetch,
        }
    }
}

#[derive(Clone)]
struct Entry {
    type_id: TypeId,
    type_label: &'static str,
    support: Support,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<TypeName, Entry>,
    names: HashMap<TypeId, TypeName>,
}

impl Registry {
    fn install(&mut self, name: TypeName, entry: Entry) {
        let type_id = entry.type_id;
        if let Some(previous) = self.entries.insert(name.clone(), entry)
            && previous.type_id != type_id
            && self.names.get(&previous.type_id) == Some(&name)
        {
            match self.fallback_name(previous.type_id) {
                Some(fallback) => self.names.insert(previous.type_id, fallback),
                None => self.names.remove(&previous.type_id),
            };
        }
        self.names.insert(type_id, name);
    }

    /// The smallest tag whose entry still expects `type_id`.
    fn fallback_name(&self, type_id: TypeId) -> Option<TypeName> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.type_id == type_id)
            .map(|(name, _)| name)
            .min()
            .cloned()
    }

    fn lookup(&self, type_id: TypeId) -> Option<(TypeName, Entry)> {
        let name = self.names.get(&type_id)?;
        let entry = self.entries.get(name)?;
        Some((name.clone(), entry.clone()))
    }
}

/// Registry of identity types and the services that fetch them.
pub struct Context {
    repository: Arc<dyn Repository>,
    config: ContextConfig,
    registry: Mutex<Registry>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        let mut tags: Vec<(&TypeName, SupportKind)> = registry
            .entries
            .iter()
            .map(|(name, entry)| (name, entry.support.kind()))
            .collect();
        tags.sort();
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("registered", &tags)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// An empty registry over `repository` with default configuration.
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self::with_config(repository, ContextConfig::default())
    }

    /// An empty registry over `repository` with explicit configuration.
    pub fn with_config(repository: Arc<dyn Repository>, config: ContextConfig) -> Self {
        Self {
            repository,
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// The local channel store this context was built over.
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Dispatch configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Track identity type `I` under `name` without any fetch capability.
    pub fn register<I: Identity>(&self, name: impl Into<TypeName>) {
        self.install::<I>(name.into(), Support::NoHandler);
    }

    /// Register `service` as the single-fetch handler for its identity type.
    pub fn register_service<S: Service>(&self, name: impl Into<TypeName>, service: Arc<S>) {
        self.install::<S::Identity>(name.into(), Support::SingleFetch(fetch_one(service)));
    }

    /// Register `service` as the batch-fetch handler for its identity type.
    pub fn register_batch_service<S: BatchService>(
        &self,
        name: impl Into<TypeName>,
        service: Arc<S>,
    ) {
        let support = Support::BatchFetch {
            one: fetch_one(Arc::clone(&service)),
            many: fetch_many(service),
        };
        self.install::<S::Identity>(name.into(), support);
    }

    fn install<I: Identity>(&self, name: TypeName, support: Support) {
        let kind = support.kind();
        let label = type_name::<I>();
        let entry = Entry {
            type_id: TypeId::of::<I>(),
            type_label: label,
            support,
        };
        self.registry.lock().install(name.clone(), entry);
        tracing::debug!(tag = %name, identity_type = label, support = ?kind, "registered identity type");
    }

    /// The capability currently registered under `name`.
    pub fn support(&self, name: &TypeName) -> Option<SupportKind> {
        self.registry
            .lock()
            .entries
            .get(name)
            .map(|entry| entry.support.kind())
    }

    /// The tag the wrapped identity's type is registered under.
    pub fn type_name_of(&self, identity: &AnyIdentity) -> Option<TypeName> {
        let registry = self.registry.lock();
        registry.names.get(&identity.concrete_type_id()).cloned()
    }

    /// Registered tags, sorted.
    pub fn registered_names(&self) -> Vec<TypeName> {
        let mut names: Vec<TypeName> = self.registry.lock().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Fetch the latest channel for one identity.
    pub fn channel(&self, identity: &AnyIdentity) -> Future<Channel, ServiceError> {
        let found = self.registry.lock().lookup(identity.concrete_type_id());
        let Some((name, entry)) = found else {
            tracing::warn!(?identity, "no identity type registered for channel fetch");
            return Future::rejected(ServiceError::unavailable());
        };
        match &entry.support {
            Support::NoHandler => unavailable(&name, "no service registered"),
            Support::SingleFetch(one) | Support::BatchFetch { one, .. } => one(identity.base())
                .unwrap_or_else(|| unavailable(&name, "identity does not match service type")),
        }
    }

    /// Fetch the latest channels for `identities`.
    ///
    /// Identities are grouped by concrete type, each group is dispatched to
    /// its handler, and the group results are concatenated in order of each
    /// type's first appearance. Any group failing fails the whole fetch.
    pub fn channels(&self, identities: &[AnyIdentity]) -> Future<Vec<Channel>, ServiceError> {
        let groups = group_by_type(identities);

        let routed: Vec<(Vec<AnyIdentity>, Option<(TypeName, Entry)>)> = {
            let registry = self.registry.lock();
            groups
                .into_iter()
                .map(|(type_id, group)| {
                    let found = registry.lookup(type_id);
                    (group, found)
                })
                .collect()
        };

        let fetches: Vec<Future<Vec<Channel>, ServiceError>> = routed
            .into_iter()
            .map(|(group, found)| match found {
                Some((name, entry)) => self.dispatch_group(&name, &entry, &group),
                None => {
                    tracing::warn!(identities = ?group, "no identity type registered for channel fetch");
                    Future::rejected(ServiceError::unavailable())
                }
            })
            .collect();

        join_all(fetches).map(|groups| groups.into_iter().flatten().collect())
    }

    fn dispatch_group(
        &self,
        name: &TypeName,
        entry: &Entry,
        group: &[AnyIdentity],
    ) -> Future<Vec<Channel>, ServiceError> {
        tracing::debug!(
            tag = %name,
            identity_type = entry.type_label,
            count = group.len(),
            support = ?entry.support.kind(),
            "dispatching channel fetch"
        );
        match (&entry.support, group) {
            (Support::NoHandler, _) => unavailable(name, "no service registered"),
            (Support::SingleFetch(one) | Support::BatchFetch { one, .. }, [identity]) => {
                match one(identity.base()) {
                    Some(fetch) => fetch.map(|channel| vec![channel]),
                    None => unavailable(name, "identity does not match service type"),
                }
            }
            (Support::BatchFetch { many, .. }, _) => many(group)
                .unwrap_or_else(|| unavailable(name, "identity does not match service type")),
            (Support::SingleFetch(one), _) => match self.config.dispatch.batch_fallback {
                BatchFallback::Unavailable => unavailable(name, "service cannot batch fetch"),
                BatchFallback::PerItem => {
                    let fetches: Option<Vec<_>> =
                        group.iter().map(|identity| one(identity.base())).collect();
                    match fetches {
                        Some(fetches) => join_all(fetches),
                        None => unavailable(name, "identity does not match service type"),
                    }
                }
            },
        }
    }
}

fn fetch_one<S: Service>(service: Arc<S>) -> FetchOne {
    Arc::new(move |identity: &dyn Identity| {
        identity
            .downcast_ref::<S::Identity>()
            .map(|identity| service.channel(identity))
    })
}

fn fetch_many<S: BatchService>(service: Arc<S>) -> FetchMany {
    Arc::new(move |identities: &[AnyIdentity]| {
        let typed: Option<Vec<S::Identity>> = identities
            .iter()
            .map(|identity| identity.downcast_ref::<S::Identity>().cloned())
            .collect();
        typed.map(|typed| service.channels(&typed))
    })
}

fn group_by_type(identities: &[AnyIdentity]) -> Vec<(TypeId, Vec<AnyIdentity>)> {
    let mut groups: Vec<(TypeId, Vec<AnyIdentity>)> = Vec::new();
    for identity in identities {
        let type_id = identity.concrete_type_id();
        match groups.iter_mut().find(|(id, _)| *id == type_id) {
            Some((_, group)) => group.push(identity.clone()),
            None => groups.push((type_id, vec![identity.clone()])),
        }
    }
    groups
}

fn unavailable<V>(name: &TypeName, reason: &'static str) -> Future<V, ServiceError>
where
    V: Clone + Send + 'static,
{
    tracing::warn!(tag = %name, reason, "channel fetch unavailable");
    Future::rejected(ServiceError::unavailable())
}
