use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use authkit_core::RequestContext;

use crate::operation::{Handler, Implementation, Operation};

/// One override layer: turns the inner implementation into a new one.
///
/// The layer decides how often the inner implementation runs:
/// - never (full replacement),
/// - once, with logic before and/or after (pre/post hook),
/// - several times (the layer owns the idempotence of doing so).
pub trait Layer<O: Operation>: Send + Sync {
    fn wrap(&self, inner: Implementation<O>) -> Implementation<O>;
}

impl<O, F> Layer<O> for F
where
    O: Operation,
    F: Fn(Implementation<O>) -> Implementation<O> + Send + Sync,
{
    fn wrap(&self, inner: Implementation<O>) -> Implementation<O> {
        self(inner)
    }
}

/// Layer built from an async closure that receives the inner implementation on
/// every call.
pub struct LayerFn<O, F> {
    f: Arc<F>,
    _op: PhantomData<fn() -> O>,
}

struct Wrapped<O: Operation, F> {
    inner: Implementation<O>,
    f: Arc<F>,
}

#[async_trait::async_trait]
impl<O, F, Fut> Handler<O> for Wrapped<O, F>
where
    O: Operation,
    F: Fn(Implementation<O>, O::Input, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = O::Output> + Send,
{
    async fn call(&self, input: O::Input, ctx: &RequestContext) -> O::Output {
        (self.f)(self.inner.clone(), input, ctx.clone()).await
    }
}

impl<O, F, Fut> Layer<O> for LayerFn<O, F>
where
    O: Operation,
    F: Fn(Implementation<O>, O::Input, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O::Output> + Send + 'static,
{
    fn wrap(&self, inner: Implementation<O>) -> Implementation<O> {
        Arc::new(Wrapped {
            inner,
            f: self.f.clone(),
        })
    }
}

/// Build a [`Layer`] from `async |inner, input, ctx| -> O::Output`.
///
/// ```ignore
/// let log_sign_ups = layer_fn::<SignUp, _, _>(|inner, input, ctx| async move {
///     let result = inner.call(input, &ctx).await;
///     tracing::info!("sign-up finished");
///     result
/// });
/// ```
pub fn layer_fn<O, F, Fut>(f: F) -> LayerFn<O, F>
where
    O: Operation,
    F: Fn(Implementation<O>, O::Input, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O::Output> + Send + 'static,
{
    LayerFn {
        f: Arc::new(f),
        _op: PhantomData,
    }
}
