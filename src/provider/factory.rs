//! Provider hand-out boundaries.

use std::sync::Arc;

use super::resources::ResourceProvider;

/// Hands out a shared [`ResourceProvider`], possibly constructing it lazily.
///
/// The indirection point that lets higher layers defer or memoize expensive
/// provider construction.
pub trait ResourceProviderFactory: Send + Sync {
    /// The shared provider instance.
    fn resources(&self) -> Arc<dyn ResourceProvider>;
}

/// Factory over one pre-built provider instance.
///
/// [`resources`](ResourceProviderFactory::resources) returns the same shared
/// handle every time, with no side effects. Adapts an already-built provider
/// into factory-shaped call sites.
pub struct FixedProviderFactory {
    res: Arc<dyn ResourceProvider>,
}

impl FixedProviderFactory {
    pub fn new(res: Arc<dyn ResourceProvider>) -> Self {
        Self { res }
    }
}

impl ResourceProviderFactory for FixedProviderFactory {
    fn resources(&self) -> Arc<dyn ResourceProvider> {
        Arc::clone(&self.res)
    }
}
