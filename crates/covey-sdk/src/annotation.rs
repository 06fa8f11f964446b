//! Annotation metadata queries consumed by passivation validation

/// Answers metadata questions the engine cannot decide on its own.
///
/// The container implements this on top of its annotation scanner. The engine
/// only asks whether an interceptor class's declared injection points may be
/// passivated.
pub trait AnnotationManager: Send + Sync {
    /// Check that every injection point declared by `interceptor_class`
    /// satisfies the passivation rule.
    fn check_injection_point_for_interceptor_passivation(&self, interceptor_class: &str) -> bool;
}

/// Annotation manager that accepts every interceptor class
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveAnnotationManager;

impl AnnotationManager for PermissiveAnnotationManager {
    fn check_injection_point_for_interceptor_passivation(&self, _interceptor_class: &str) -> bool {
        true
    }
}
