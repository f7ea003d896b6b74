//! Heterogeneous store of override chains, one per operation.
//!
//! A recipe config carries one registry for its business-logic functions and one for
//! its API handlers. The registry is populated by the integrator before the recipe is
//! built; the recipe then resolves each operation exactly once.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::chain::OverrideChain;
use crate::layer::Layer;
use crate::operation::{Implementation, Operation};

struct Entry {
    operation_id: &'static str,
    layer_count: usize,
    chain: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct OverrideRegistry {
    chains: HashMap<TypeId, Entry>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer to the chain of operation `O`.
    pub fn register<O: Operation>(&mut self, layer: impl Layer<O> + 'static) {
        let entry = self.chains.entry(TypeId::of::<O>()).or_insert_with(|| Entry {
            operation_id: O::ID,
            layer_count: 0,
            chain: Box::new(OverrideChain::<O>::new()),
        });

        if let Some(chain) = entry.chain.downcast_mut::<OverrideChain<O>>() {
            chain.push(layer);
            entry.layer_count = chain.len();
        }
    }

    /// Builder-style [`OverrideRegistry::register`].
    pub fn with<O: Operation>(mut self, layer: impl Layer<O> + 'static) -> Self {
        self.register::<O>(layer);
        self
    }

    /// Wrap `base` with every layer registered for `O` (or return it unchanged).
    pub fn resolve<O: Operation>(&self, base: Implementation<O>) -> Implementation<O> {
        match self
            .chains
            .get(&TypeId::of::<O>())
            .and_then(|e| e.chain.downcast_ref::<OverrideChain<O>>())
        {
            Some(chain) => chain.resolve(base),
            None => base,
        }
    }

    /// Number of layers registered for the operation with the given id.
    pub fn layer_count(&self, operation_id: &str) -> usize {
        self.chains
            .values()
            .filter(|e| e.operation_id == operation_id)
            .map(|e| e.layer_count)
            .sum()
    }

    /// Ids of every operation that has at least one layer, sorted.
    pub fn operation_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.chains.values().map(|e| e.operation_id).collect();
        ids.sort_unstable();
        ids
    }
}

impl core::fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverrideRegistry")
            .field("operations", &self.operation_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use authkit_core::RequestContext;

    use super::*;
    use crate::{handler_fn, layer_fn};

    struct Ping;

    impl Operation for Ping {
        const ID: &'static str = "test.ping";
        type Input = u32;
        type Output = u32;
    }

    struct Pong;

    impl Operation for Pong {
        const ID: &'static str = "test.pong";
        type Input = ();
        type Output = &'static str;
    }

    #[tokio::test]
    async fn chains_are_kept_per_operation() {
        let registry = OverrideRegistry::new()
            .with::<Ping>(layer_fn::<Ping, _, _>(|inner, n, ctx| async move {
                inner.call(n + 1, &ctx).await * 10
            }))
            .with::<Ping>(layer_fn::<Ping, _, _>(|inner, n, ctx| async move {
                inner.call(n * 2, &ctx).await
            }));

        let ping = registry.resolve::<Ping>(handler_fn::<Ping, _, _>(|n, _| async move { n }));
        let pong = registry.resolve::<Pong>(handler_fn::<Pong, _, _>(|_, _| async { "pong" }));

        let ctx = RequestContext::new();
        // outer doubles, inner adds one then multiplies the result.
        assert_eq!(ping.call(3, &ctx).await, 70);
        assert_eq!(pong.call((), &ctx).await, "pong");

        assert_eq!(registry.layer_count("test.ping"), 2);
        assert_eq!(registry.layer_count("test.pong"), 0);
        assert_eq!(registry.operation_ids(), vec!["test.ping"]);
    }

    #[tokio::test]
    async fn layer_may_call_inner_more_than_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let base = handler_fn::<Ping, _, _>(move |n, _| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(n);
                n
            }
        });

        let registry = OverrideRegistry::new().with::<Ping>(layer_fn::<Ping, _, _>(
            |inner, n, ctx| async move { inner.call(n, &ctx).await + inner.call(n + 1, &ctx).await },
        ));

        let out = registry
            .resolve::<Ping>(base)
            .call(1, &RequestContext::new())
            .await;
        assert_eq!(out, 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
