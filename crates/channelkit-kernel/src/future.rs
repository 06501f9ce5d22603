//! Deferred results: a value that becomes available at most once.
//!
//! A [`Future`] is a cheap, cloneable consumer handle over one shared cell.
//! A [`Promise`] is the producer handle over the same cell; only it can
//! settle the cell. The cell moves through
//!
//! ```text
//! Pending(observers) ──resolve──▶ Resolved(value)
//!         │
//!         └─────────reject──────▶ Rejected(error)
//! ```
//!
//! and never leaves a terminal state. Observers registered while pending run
//! in registration order from inside the settling call; observers registered
//! afterwards run synchronously from inside `observe`. The cell lock is never
//! held while an observer runs.
//!
//! This is a callback primitive, not a `std::future::Future`: nothing here
//! polls, blocks, or needs an executor.

use crate::result::{SharedError, capture};
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::sync::Arc;

type Observer<V, E> = Box<dyn FnOnce(Result<V, E>) + Send + 'static>;

enum State<V, E> {
    Pending(Vec<Observer<V, E>>),
    Resolved(V),
    Rejected(E),
}

impl<V, E> State<V, E> {
    fn terminal(result: Result<V, E>) -> Self {
        match result {
            Ok(value) => State::Resolved(value),
            Err(error) => State::Rejected(error),
        }
    }
}

struct Cell<V, E> {
    state: Mutex<State<V, E>>,
}

/// Read/observe handle to a value that becomes available at most once.
pub struct Future<V, E> {
    cell: Arc<Cell<V, E>>,
}

/// Producer handle allowed to settle the [`Future`] it hands out.
pub struct Promise<V, E> {
    cell: Arc<Cell<V, E>>,
}

impl<V, E> Clone for Future<V, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V, E> fmt::Debug for Future<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.cell.state.lock() {
            State::Pending(observers) => format!("pending({} observers)", observers.len()),
            State::Resolved(_) => "resolved".to_string(),
            State::Rejected(_) => "rejected".to_string(),
        };
        f.debug_struct("Future").field("state", &state).finish()
    }
}

impl<V, E> fmt::Debug for Promise<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

impl<V, E> Cell<V, E> {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending(Vec::new())),
        })
    }

    fn settled(result: Result<V, E>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::terminal(result)),
        })
    }
}

impl<V, E> Cell<V, E>
where
    V: Clone,
    E: Clone,
{
    /// The single terminal transition. A second call is a no-op.
    fn finalize(&self, result: Result<V, E>) {
        let observers = {
            let mut state = self.state.lock();
            let State::Pending(observers) = &mut *state else {
                return;
            };
            let observers = mem::take(observers);
            *state = State::terminal(result.clone());
            observers
        };

        // Last observer takes the original; the rest get clones.
        let mut observers = observers.into_iter().peekable();
        while let Some(observer) = observers.next() {
            if observers.peek().is_some() {
                observer(result.clone());
            } else {
                observer(result);
                break;
            }
        }
    }

    fn current(&self) -> Option<Result<V, E>> {
        match &*self.state.lock() {
            State::Pending(_) => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

impl<V, E> Promise<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A fresh, pending promise.
    pub fn new() -> Self {
        Self {
            cell: Cell::pending(),
        }
    }

    /// A consumer handle over this promise's cell.
    pub fn future(&self) -> Future<V, E> {
        Future {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Resolve with `value`. Ignored if the cell is already terminal.
    pub fn resolve(&self, value: V) {
        self.cell.finalize(Ok(value));
    }

    /// Reject with `error`. Ignored if the cell is already terminal.
    pub fn reject(&self, error: E) {
        self.cell.finalize(Err(error));
    }

    /// Resolve or reject from a `Result`.
    pub fn settle(&self, result: Result<V, E>) {
        self.cell.finalize(result);
    }
}

impl<V, E> Default for Promise<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Clone for Promise<V, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V, E> Future<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A future that is already terminal.
    pub fn ready(result: Result<V, E>) -> Self {
        Self {
            cell: Cell::settled(result),
        }
    }

    /// A future already resolved with `value`.
    pub fn resolved(value: V) -> Self {
        Self::ready(Ok(value))
    }

    /// A future already rejected with `error`.
    pub fn rejected(error: E) -> Self {
        Self::ready(Err(error))
    }

    /// Create a promise, hand it to `start`, and return its future.
    ///
    /// `start` runs synchronously; it may settle the promise right away or
    /// move it somewhere that settles it later.
    pub fn from_producer(start: impl FnOnce(Promise<V, E>)) -> Self {
        let promise = Promise::new();
        let future = promise.future();
        start(promise);
        future
    }

    /// Register `observer` to receive the eventual result exactly once.
    ///
    /// If the future is already terminal, `observer` runs before this call
    /// returns. Otherwise it is queued behind earlier observers.
    pub fn observe(&self, observer: impl FnOnce(Result<V, E>) + Send + 'static) {
        let result = {
            let mut state = self.cell.state.lock();
            match &mut *state {
                State::Pending(observers) => {
                    observers.push(Box::new(observer));
                    return;
                }
                State::Resolved(value) => Ok(value.clone()),
                State::Rejected(error) => Err(error.clone()),
            }
        };
        observer(result);
    }

    /// Observe only the success case.
    pub fn observe_value(&self, observer: impl FnOnce(V) + Send + 'static) {
        self.observe(|result| {
            if let Ok(value) = result {
                observer(value);
            }
        });
    }

    /// Observe only the failure case.
    pub fn observe_error(&self, observer: impl FnOnce(E) + Send + 'static) {
        self.observe(|result| {
            if let Err(error) = result {
                observer(error);
            }
        });
    }

    /// Whether the future is still waiting for its producer.
    pub fn is_pending(&self) -> bool {
        matches!(&*self.cell.state.lock(), State::Pending(_))
    }

    /// The stored result, if terminal. Never blocks.
    pub fn peek(&self) -> Option<Result<V, E>> {
        self.cell.current()
    }

    /// Derive a future whose result is `transform` applied to this one's.
    ///
    /// If this future is already terminal the derived one is built terminal.
    /// Otherwise the transform is queued as an observer and the derived
    /// future settles from inside this future's settling call.
    pub fn map_result<T, F>(
        &self,
        transform: impl FnOnce(Result<V, E>) -> Result<T, F> + Send + 'static,
    ) -> Future<T, F>
    where
        T: Clone + Send + 'static,
        F: Clone + Send + 'static,
    {
        let settled = {
            let mut state = self.cell.state.lock();
            match &mut *state {
                State::Pending(observers) => {
                    let downstream = Cell::pending();
                    let sink = Arc::clone(&downstream);
                    observers.push(Box::new(move |result| sink.finalize(transform(result))));
                    return Future { cell: downstream };
                }
                State::Resolved(value) => Ok(value.clone()),
                State::Rejected(error) => Err(error.clone()),
            }
        };
        Future::ready(transform(settled))
    }

    /// Transform the value; errors pass through.
    pub fn map<T>(&self, transform: impl FnOnce(V) -> T + Send + 'static) -> Future<T, E>
    where
        T: Clone + Send + 'static,
    {
        self.map_result(|result| result.map(transform))
    }

    /// Transform the error; values pass through.
    pub fn map_error<F>(&self, transform: impl FnOnce(E) -> F + Send + 'static) -> Future<V, F>
    where
        F: Clone + Send + 'static,
    {
        self.map_result(|result| result.map_err(transform))
    }

    /// Chain a fallible step after the value.
    pub fn flat_map<T>(
        &self,
        transform: impl FnOnce(V) -> Result<T, E> + Send + 'static,
    ) -> Future<T, E>
    where
        T: Clone + Send + 'static,
    {
        self.map_result(|result| result.and_then(transform))
    }

    /// Recover from the error with a fallible step.
    pub fn flat_map_error<F>(
        &self,
        transform: impl FnOnce(E) -> Result<V, F> + Send + 'static,
    ) -> Future<V, F>
    where
        F: Clone + Send + 'static,
    {
        self.map_result(|result| result.or_else(transform))
    }
}

impl<V> Future<V, SharedError>
where
    V: Clone + Send + 'static,
{
    /// Run `compute` now and capture its outcome as a terminal future.
    pub fn from_fallible<E>(compute: impl FnOnce() -> Result<V, E>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::ready(capture(compute))
    }
}

/// Aggregate futures into one future of all their values, in input order.
///
/// Fails fast: the first rejection rejects the aggregate, later results are
/// dropped. An empty input resolves immediately with an empty `Vec`.
pub fn join_all<V, E>(futures: Vec<Future<V, E>>) -> Future<Vec<V>, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    if futures.is_empty() {
        return Future::resolved(Vec::new());
    }

    struct Slots<V> {
        values: Vec<Option<V>>,
        remaining: usize,
    }

    let promise = Promise::new();
    let aggregate = promise.future();
    let slots = Arc::new(Mutex::new(Slots {
        values: (0..futures.len()).map(|_| None).collect(),
        remaining: futures.len(),
    }));

    for (index, future) in futures.into_iter().enumerate() {
        let promise = promise.clone();
        let slots = Arc::clone(&slots);
        future.observe(move |result| match result {
            Err(error) => promise.reject(error),
            Ok(value) => {
                let complete = {
                    let mut slots = slots.lock();
                    slots.values[index] = Some(value);
                    slots.remaining -= 1;
                    if slots.remaining == 0 {
                        Some(mem::take(&mut slots.values))
                    } else {
                        None
                    }
                };
                if let Some(values) = complete {
                    promise.resolve(values.into_iter().flatten().collect());
                }
            }
        });
    }

    aggregate
}
