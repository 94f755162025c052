//! Integration seam between the interception layer and the hosting server.

use std::any::Any;

/// Hooks a concrete interception variant implements to attach itself to a
/// host server. The resolution algorithm itself knows nothing about these;
/// they exist so the host can drive injection setup and teardown without
/// depending on a concrete variant.
pub trait InjectionPoint: Send + Sync {
    /// Attach to the given connection-acceptance mechanism.
    fn inject(&self, container: &dyn Any);

    /// Late-initialization hook, fired once the host world has loaded.
    fn post_world_loaded(&self) {}

    /// Undo all injection and release every binding.
    fn cleanup_all(&self);
}
