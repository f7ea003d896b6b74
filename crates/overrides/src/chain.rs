use std::sync::Arc;

use crate::layer::Layer;
use crate::operation::{Implementation, Operation};

/// Ordered layers for a single operation.
///
/// Given layers registered as `L1, L2, ..., Ln`, [`OverrideChain::resolve`] returns
/// `Ln(Ln-1(...L1(base)...))`: the last registered layer is the outermost and is
/// entered first.
pub struct OverrideChain<O: Operation> {
    layers: Vec<Arc<dyn Layer<O>>>,
}

impl<O: Operation> OverrideChain<O> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn push(&mut self, layer: impl Layer<O> + 'static) {
        self.layers.push(Arc::new(layer));
    }

    pub fn with(mut self, layer: impl Layer<O> + 'static) -> Self {
        self.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Fold every layer around `base`, innermost first.
    pub fn resolve(&self, base: Implementation<O>) -> Implementation<O> {
        tracing::debug!(operation = O::ID, layers = self.layers.len(), "resolving override chain");
        self.layers
            .iter()
            .fold(base, |inner, layer| layer.wrap(inner))
    }
}

impl<O: Operation> Default for OverrideChain<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operation> Clone for OverrideChain<O> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}
