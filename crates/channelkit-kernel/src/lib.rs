//! # channelkit kernel
//!
//! Presents heterogeneous live-streaming platforms under one [`Channel`]
//! model, looked up through polymorphic [`Identity`] tokens.
//!
//! This crate is **platform-agnostic**: it never names a concrete identity
//! type. Platforms plug in by implementing [`Identity`] and [`Service`] and
//! registering both with a [`Context`].
//!
//! ## Architecture
//!
//! ```text
//! Result / SharedError   ← success/failure values, shareable errors
//!     │
//! Future / Promise       ← a value that becomes available at most once
//!     │
//! Identity               ← opaque channel token, cross-type equality
//!     │
//! AnyIdentity            ← type-erased wrapper, [tag, payload] wire form
//!     │
//! Context                ← tag → handler registry, fetch dispatch
//! ```

pub mod any_identity;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod future;
pub mod identity;
pub mod repository;
pub mod result;
pub mod service;

pub use any_identity::{
    AnyIdentity, DecodingMappings, EncodingMappings, IdentityListSeed, IdentitySeed,
    IdentityTypes, Tagged,
};
pub use channel::{Channel, ChannelBuilder};
pub use config::{BatchFallback, ContextConfig, DispatchConfig};
pub use context::{Context, SupportKind};
pub use error::{CodecError, ConfigError};
pub use future::{Future, Promise, join_all};
pub use identity::{Identity, TypeName, value_eq, value_hash};
pub use repository::{Repository, RepositoryError};
pub use result::{SharedError, capture, share};
pub use service::{BatchService, Service, ServiceError, ServiceErrorCode};
