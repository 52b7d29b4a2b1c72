//! handler chain
//!
//! ordered async transform steps over a typed payload. each step receives
//! the value and a continuation to the rest of the chain; a step that
//! never calls the continuation short-circuits, and its return value is
//! the chain's result. built once, immutable afterwards.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// boxed future used across trait objects and recursive calls
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// continuation to the remaining steps (identity past the end)
pub type Next<T> = Box<dyn FnOnce(T) -> BoxFuture<Result<T>> + Send>;

/// one transform step
pub type Step<T> = Arc<dyn Fn(Next<T>, T) -> BoxFuture<Result<T>> + Send + Sync>;

/// wrap an async closure as a [`Step`]
pub fn step<T, F, Fut>(f: F) -> Step<T>
where
    F: Fn(Next<T>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move |next, value| -> BoxFuture<Result<T>> { Box::pin(f(next, value)) })
}

/// composable pipeline of async transform steps
///
/// an empty chain is the identity transform. step errors propagate
/// without translation.
pub struct HandlerChain<T> {
    steps: Arc<[Step<T>]>,
}

impl<T> Clone for HandlerChain<T> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<T: Send + 'static> HandlerChain<T> {
    /// build a chain from an ordered list of steps
    pub fn from_steps(steps: Vec<Step<T>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// true for the identity chain
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// execute the chain front-to-back
    pub fn run(&self, initial: T) -> BoxFuture<Result<T>> {
        Self::run_from(self.steps.clone(), 0, initial)
    }

    fn run_from(steps: Arc<[Step<T>]>, index: usize, value: T) -> BoxFuture<Result<T>> {
        match steps.get(index) {
            None => Box::pin(async move { Ok(value) }),
            Some(current) => {
                let current = current.clone();
                let rest = steps.clone();
                let next: Next<T> = Box::new(move |value| Self::run_from(rest, index + 1, value));
                current(next, value)
            }
        }
    }
}
