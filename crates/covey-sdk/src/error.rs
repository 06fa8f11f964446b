//! Error types for definition lifecycle hooks

/// Failure raised by a definition's produce/inject/post-construct/pre-destroy/destroy hook.
///
/// The engine never inspects or rewraps these; they reach the caller unmodified.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for lifecycle hooks
pub type HookResult<T> = Result<T, HookError>;
