//! Passivation validation
//!
//! A bean in a passivating scope may be serialized between uses, so every
//! decorator and interceptor attached to it must survive serialization too.
//! Decorator and interceptor beans are checked recursively through their own
//! participants. Self-method callbacks live on the bean itself and are never
//! checked.

use covey_sdk::{
    AnnotationManager, Contextual, InterceptionStack, InterceptorSource,
    PermissiveAnnotationManager,
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a participant breaks passivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A decorator bean is not passivation capable
    DecoratorNotPassivationCapable,
    /// An interceptor bean is not passivation capable
    InterceptorNotPassivationCapable,
    /// A plain interceptor class is not serializable
    InterceptorNotSerializable,
    /// A plain interceptor class declares injection points that cannot be passivated
    InterceptorInjectionPoint,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ViolationKind::DecoratorNotPassivationCapable => "decorator is not passivation capable",
            ViolationKind::InterceptorNotPassivationCapable => {
                "interceptor is not passivation capable"
            }
            ViolationKind::InterceptorNotSerializable => "interceptor class is not serializable",
            ViolationKind::InterceptorInjectionPoint => {
                "interceptor class has non-passivating injection points"
            }
        };
        f.write_str(text)
    }
}

/// A participant that prevents its bean from being passivated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Passivating bean '{definition}': {kind} ({participant})")]
pub struct PassivationViolation {
    /// Bean whose participants were being checked
    pub definition: String,
    /// Kind of violation
    pub kind: ViolationKind,
    /// Decorator or interceptor at fault
    pub participant: String,
    /// Interceptor class, for injection-point violations
    pub class: Option<String>,
}

/// Checks a bean's decorators and interceptors against passivation rules
#[derive(Clone)]
pub struct PassivationValidator {
    annotations: Arc<dyn AnnotationManager>,
}

impl PassivationValidator {
    /// Create a validator that delegates injection-point checks to `annotations`
    pub fn new(annotations: Arc<dyn AnnotationManager>) -> Self {
        Self { annotations }
    }

    /// Validator whose injection-point checks always pass
    pub fn permissive() -> Self {
        Self::new(Arc::new(PermissiveAnnotationManager))
    }

    /// Validate `definition`, reporting the first violation
    pub fn validate(&self, definition: &dyn Contextual) -> Result<(), PassivationViolation> {
        match self.violations(definition).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every violation of `definition`, in declaration order
    ///
    /// Participants that fail are not descended into; participants that pass
    /// have their own stacks checked, and violations found there name the
    /// participant as the offending bean.
    pub fn violations(&self, definition: &dyn Contextual) -> Vec<PassivationViolation> {
        let mut found = Vec::new();
        self.check_stack(definition.name(), definition.stack(), &mut found);
        found
    }

    fn check_stack(
        &self,
        owner: &str,
        stack: &InterceptionStack,
        found: &mut Vec<PassivationViolation>,
    ) {
        for decorator in &stack.decorators {
            if decorator.passivation_capable {
                self.check_stack(&decorator.name, &decorator.stack, found);
            } else {
                found.push(violation(
                    owner,
                    ViolationKind::DecoratorNotPassivationCapable,
                    &decorator.name,
                    None,
                ));
            }
        }

        for interceptor in &stack.interceptors {
            match &interceptor.source {
                InterceptorSource::Bean {
                    name,
                    passivation_capable,
                    stack: nested,
                } => {
                    if *passivation_capable {
                        self.check_stack(name, nested, found);
                    } else {
                        found.push(violation(
                            owner,
                            ViolationKind::InterceptorNotPassivationCapable,
                            name,
                            None,
                        ));
                    }
                }
                InterceptorSource::Class {
                    class_name,
                    serializable,
                } => {
                    if !serializable {
                        found.push(violation(
                            owner,
                            ViolationKind::InterceptorNotSerializable,
                            class_name,
                            None,
                        ));
                    } else if !self
                        .annotations
                        .check_injection_point_for_interceptor_passivation(class_name)
                    {
                        found.push(violation(
                            owner,
                            ViolationKind::InterceptorInjectionPoint,
                            class_name,
                            Some(class_name),
                        ));
                    }
                }
                InterceptorSource::SelfMethod => {}
            }
        }
    }
}

fn violation(
    owner: &str,
    kind: ViolationKind,
    participant: &str,
    class: Option<&str>,
) -> PassivationViolation {
    PassivationViolation {
        definition: owner.to_string(),
        kind,
        participant: participant.to_string(),
        class: class.map(str::to_string),
    }
}

impl Default for PassivationValidator {
    fn default() -> Self {
        Self::permissive()
    }
}

impl fmt::Debug for PassivationValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassivationValidator").finish_non_exhaustive()
    }
}
