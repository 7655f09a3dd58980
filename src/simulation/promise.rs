//! Single-settlement promises for multi-tick operations
//!
//! A `Promise` is a shared handle to a result that arrives later, usually
//! when a road operation finishes on some future tick. Continuations are
//! kept in registration order and all of them fire when the promise settles.
//! Chaining always derives a new promise, so `a.then(f).then(g)` never
//! installs two handlers on `a`.
//!
//! There is no executor. Continuations run synchronously inside whichever
//! call settles the promise (or inside `then` itself when already settled).

use log::trace;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::SimError;

/// The outcome of a settled promise
pub type Settlement<T> = Result<T, SimError>;

type Continuation<T> = Box<dyn FnOnce(Settlement<T>)>;

enum State<T> {
    Pending,
    Resolved(T),
    Rejected(SimError),
}

struct Inner<T> {
    state: State<T>,
    continuations: Vec<Continuation<T>>,
}

pub struct Promise<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        match &inner.state {
            State::Pending => write!(
                f,
                "Promise::Pending({} continuations)",
                inner.continuations.len()
            ),
            State::Resolved(value) => write!(f, "Promise::Resolved({value:?})"),
            State::Rejected(err) => write!(f, "Promise::Rejected({err})"),
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                continuations: Vec::new(),
            })),
        }
    }

    /// A promise that is already resolved with `value`
    pub fn resolved(value: T) -> Self {
        let promise = Self::new();
        promise.resolve(value);
        promise
    }

    /// A promise that is already rejected with `err`
    pub fn rejected(err: SimError) -> Self {
        let promise = Self::new();
        promise.reject(err);
        promise
    }

    /// Resolve the promise. Returns false (and does nothing) if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the promise. Returns false (and does nothing) if it was already settled.
    pub fn reject(&self, err: SimError) -> bool {
        self.settle(Err(err))
    }

    /// Settle with a ready-made outcome. First settlement wins.
    pub fn settle(&self, outcome: Settlement<T>) -> bool {
        let continuations = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                trace!("ignoring settlement of an already settled promise");
                return false;
            }
            inner.state = match &outcome {
                Ok(value) => State::Resolved(value.clone()),
                Err(err) => State::Rejected(err.clone()),
            };
            std::mem::take(&mut inner.continuations)
        };

        // the borrow is released so continuations may inspect or chain on this promise
        for continuation in continuations {
            continuation(outcome.clone());
        }
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, State::Pending)
    }

    /// The outcome, if settled
    pub fn settlement(&self) -> Option<Settlement<T>> {
        match &self.inner.borrow().state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(err) => Some(Err(err.clone())),
        }
    }

    /// The resolved value, if any
    pub fn value(&self) -> Option<T> {
        self.settlement().and_then(Result::ok)
    }

    /// Observe the outcome without deriving a new promise.
    /// Runs immediately when already settled.
    pub fn when_settled(&self, callback: impl FnOnce(Settlement<T>) + 'static) {
        match self.settlement() {
            Some(outcome) => callback(outcome),
            None => self
                .inner
                .borrow_mut()
                .continuations
                .push(Box::new(callback)),
        }
    }

    /// Map the resolved value. Rejections skip `callback` and propagate unchanged.
    pub fn then<U: Clone + 'static>(&self, callback: impl FnOnce(T) -> U + 'static) -> Promise<U> {
        let derived = Promise::new();
        let target = derived.clone();
        self.when_settled(move |outcome| {
            target.settle(outcome.map(callback));
        });
        derived
    }

    /// Chain an asynchronous step. The derived promise follows the one `callback` returns.
    pub fn and_then<U: Clone + 'static>(
        &self,
        callback: impl FnOnce(T) -> Promise<U> + 'static,
    ) -> Promise<U> {
        let derived = Promise::new();
        let target = derived.clone();
        self.when_settled(move |outcome| match outcome {
            Ok(value) => callback(value).when_settled(move |inner| {
                target.settle(inner);
            }),
            Err(err) => {
                target.settle(Err(err));
            }
        });
        derived
    }

    /// Recover from a rejection with a value. Resolutions pass through.
    pub fn catch(&self, callback: impl FnOnce(SimError) -> T + 'static) -> Promise<T> {
        let derived = Promise::new();
        let target = derived.clone();
        self.when_settled(move |outcome| {
            target.resolve(outcome.unwrap_or_else(callback));
        });
        derived
    }

    /// Recover from a rejection with another asynchronous step.
    pub fn or_else(&self, callback: impl FnOnce(SimError) -> Promise<T> + 'static) -> Promise<T> {
        let derived = Promise::new();
        let target = derived.clone();
        self.when_settled(move |outcome| match outcome {
            Ok(value) => {
                target.resolve(value);
            }
            Err(err) => callback(err).when_settled(move |inner| {
                target.settle(inner);
            }),
        });
        derived
    }
}
