//! Success/failure values.
//!
//! The two-case sum type is `std::result::Result`. Its combinators cover
//! every transformation the kernel needs:
//!
//! ```text
//! map            ← transform the success value
//! map_err        ← transform the failure value
//! and_then       ← flatten a success into another Result
//! or_else        ← flatten a failure into another Result
//! ?              ← unwrap the value or propagate the stored error
//! ```
//!
//! What std does not provide is a *shareable* catch-all error: a value
//! stored in a resolved [`Future`](crate::future::Future) is delivered to
//! every observer, so it has to be `Clone`. [`SharedError`] fills that gap,
//! and [`capture`] builds one from any fallible computation.

use std::error::Error as StdError;
use std::sync::Arc;

/// A type-erased, cloneable error.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Run a fallible computation and capture its outcome with a catch-all error.
pub fn capture<V, E>(compute: impl FnOnce() -> Result<V, E>) -> Result<V, SharedError>
where
    E: StdError + Send + Sync + 'static,
{
    compute().map_err(|err| Arc::new(err) as SharedError)
}

/// Erase a concrete error into a [`SharedError`].
pub fn share<E>(err: E) -> SharedError
where
    E: StdError + Send + Sync + 'static,
{
    Arc::new(err)
}
