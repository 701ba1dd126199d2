//! Handler abstraction shared by plain async functions and instrumented handlers.
//!
//! Like the framework's request handlers, the future is an associated type so
//! each handler is monomorphized; `BoxedHandler` erases the type when handlers
//! of different shapes need to live in one collection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Owned, sendable, boxed future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// An event handler invoked with an argument value `A`.
///
/// Implemented for every `Fn(A) -> impl Future<Output = Result<T, E>>`.
pub trait Handler<A>: Clone + Send + Sync + 'static {
    /// Value produced on success
    type Output;

    /// Error produced on failure
    type Error;

    /// The future returned by `call`.
    type Future: Future<Output = Result<Self::Output, Self::Error>> + Send + 'static;

    /// Invoke the handler.
    fn call(&self, args: A) -> Self::Future;

    /// Fully qualified identifier of the handler, e.g. `bot::commands::greet`.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F, Fut, A, T, E> Handler<A> for F
where
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    type Output = T;
    type Error = E;
    type Future = Fut;

    #[inline(always)]
    fn call(&self, args: A) -> Self::Future {
        (self)(args)
    }
}

/// Type-erased handler for storing in collections.
pub struct BoxedHandler<A, T, E> {
    inner: Arc<dyn ErasedHandler<A, T, E>>,
}

impl<A, T, E> BoxedHandler<A, T, E> {
    /// Create a new boxed handler from any Handler.
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler<A, Output = T, Error = E>,
    {
        Self {
            inner: Arc::new(handler),
        }
    }
}

impl<A, T, E> Clone for BoxedHandler<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, T, E> std::fmt::Debug for BoxedHandler<A, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedHandler")
            .field("name", &self.inner.name())
            .finish()
    }
}

impl<A, T, E> Handler<A> for BoxedHandler<A, T, E>
where
    A: 'static,
    T: 'static,
    E: 'static,
{
    type Output = T;
    type Error = E;
    type Future = BoxFuture<Result<T, E>>;

    fn call(&self, args: A) -> Self::Future {
        self.inner.call(args)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

trait ErasedHandler<A, T, E>: Send + Sync {
    fn call(&self, args: A) -> BoxFuture<Result<T, E>>;
    fn name(&self) -> &'static str;
}

impl<H, A> ErasedHandler<A, H::Output, H::Error> for H
where
    H: Handler<A>,
{
    fn call(&self, args: A) -> BoxFuture<Result<H::Output, H::Error>> {
        Box::pin(Handler::call(self, args))
    }

    fn name(&self) -> &'static str {
        Handler::name(self)
    }
}
