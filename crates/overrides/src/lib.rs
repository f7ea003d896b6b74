//! `authkit-overrides` — typed override chains for recipe operations.
//!
//! Every overridable operation is an [`Operation`] marker type. Its default behaviour
//! is an [`Implementation`]; integrators register [`Layer`]s that wrap the
//! implementation they are given and return a new one with the same signature.
//! Chains are resolved once, when a recipe is built, and never mutated afterwards.

pub mod chain;
pub mod layer;
pub mod operation;
pub mod registry;

pub use chain::OverrideChain;
pub use layer::{Layer, layer_fn};
pub use operation::{Handler, Implementation, Operation, handler_fn};
pub use registry::OverrideRegistry;
