//! Live component instances and their optional capabilities.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

use super::error::ComponentError;
use crate::hub::Endpoint;

/// Type-erased access to a concrete instance.
///
/// Implemented for every `Send + Sync` type, so component authors never
/// write it by hand. It lets dependents downcast an injected
/// `Arc<dyn Instance>` back to the concrete type they expect.
///
/// Call these through the trait object (`(*instance).as_any()`), not on the
/// `Arc` itself, which is also `Any`.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A live component produced by a [`ComponentType`](super::ComponentType).
///
/// Both capabilities are optional. An instance without a lifecycle is
/// created but never started or stopped; an instance without endpoints
/// contributes nothing to the published tree.
///
/// Instances are shared between the engine and every dependent they are
/// injected into, so any mutable state must use interior synchronization.
pub trait Instance: AsAny {
    /// Start/stop control, if the instance has any.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Named endpoints exposed to the hub when the tree is published.
    fn endpoints(&self) -> Vec<Endpoint> {
        Vec::new()
    }
}

/// Start/stop control for instances that run background work.
///
/// `stop` must not return before the instance's background work has
/// terminated; the engine relies on that for teardown ordering.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self) -> Result<(), ComponentError>;
    async fn stop(&self) -> Result<(), ComponentError>;
}

/// Downcast a shared instance to its concrete type.
pub fn downcast_instance<T: Instance>(instance: &Arc<dyn Instance>) -> Option<Arc<T>> {
    instance.clone().into_any().downcast::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Led;
    impl Instance for Led {}

    struct Button;
    impl Instance for Button {}

    #[test]
    fn test_downcast_instance() {
        let led: Arc<dyn Instance> = Arc::new(Led);
        assert!(downcast_instance::<Led>(&led).is_some());
        assert!(downcast_instance::<Button>(&led).is_none());
        assert!((*led).type_name().ends_with("Led"));
    }

    #[test]
    fn test_default_capabilities() {
        let led: Arc<dyn Instance> = Arc::new(Led);
        assert!(led.lifecycle().is_none());
        assert!(led.endpoints().is_empty());
    }
}
