use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use authkit_core::RequestContext;

/// Marker for one overridable operation.
///
/// The associated types pin the operation's signature, so every layer in a chain
/// must accept the same input and produce the same output as the default.
/// `Output` is conventionally `Result<SomeResultEnum, AuthError>`.
pub trait Operation: Send + Sync + 'static {
    /// Stable identifier used in logs and registry introspection.
    const ID: &'static str;

    type Input: Send + 'static;
    type Output: Send + 'static;
}

/// An executable implementation of an operation.
#[async_trait::async_trait]
pub trait Handler<O: Operation>: Send + Sync {
    async fn call(&self, input: O::Input, ctx: &RequestContext) -> O::Output;
}

/// Shared, type-erased implementation. This is what layers receive and return.
pub type Implementation<O> = Arc<dyn Handler<O>>;

/// Implementation backed by an async closure.
pub struct FnHandler<O, F> {
    f: F,
    _op: PhantomData<fn() -> O>,
}

#[async_trait::async_trait]
impl<O, F, Fut> Handler<O> for FnHandler<O, F>
where
    O: Operation,
    F: Fn(O::Input, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = O::Output> + Send,
{
    async fn call(&self, input: O::Input, ctx: &RequestContext) -> O::Output {
        (self.f)(input, ctx.clone()).await
    }
}

/// Build an [`Implementation`] from an async closure.
///
/// ```ignore
/// let base = handler_fn::<SignUp, _, _>(|input, _ctx| async move { ... });
/// ```
pub fn handler_fn<O, F, Fut>(f: F) -> Implementation<O>
where
    O: Operation,
    F: Fn(O::Input, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O::Output> + Send + 'static,
{
    Arc::new(FnHandler {
        f,
        _op: PhantomData,
    })
}
