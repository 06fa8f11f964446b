//! Interceptor and decorator descriptors attached to a definition
//!
//! Descriptors are read-only metadata about the cross-cutting participants of
//! a bean. The engine reads them to decide whether a dependent instance needs
//! a proxy and whether a definition may be passivated.

/// How a participant was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorForm {
    /// Declared through the older per-bean interceptor data
    Legacy,
    /// Declared through the current interceptor resolution
    #[default]
    Current,
}

/// Where an interceptor entry comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorSource {
    /// A container-managed interceptor bean
    Bean {
        /// Interceptor bean name
        name: String,
        /// Whether the interceptor bean is passivation capable
        passivation_capable: bool,
        /// The interceptor bean's own participants
        stack: InterceptionStack,
    },
    /// A plain interceptor class bound with an interceptors declaration
    Class {
        /// Fully-qualified interceptor class name
        class_name: String,
        /// Whether the class is serializable
        serializable: bool,
    },
    /// Lifecycle or around-invoke callbacks declared on the bean itself
    SelfMethod,
}

/// One entry of a definition's interceptor stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorDescriptor {
    /// Declaration form
    pub form: DescriptorForm,
    /// Where the interceptor logic lives
    pub source: InterceptorSource,
}

impl InterceptorDescriptor {
    /// Interceptor backed by a container-managed interceptor bean
    pub fn bean(name: impl Into<String>, passivation_capable: bool) -> Self {
        Self {
            form: DescriptorForm::Current,
            source: InterceptorSource::Bean {
                name: name.into(),
                passivation_capable,
                stack: InterceptionStack::default(),
            },
        }
    }

    /// Interceptor backed by a plain interceptor class
    pub fn class(class_name: impl Into<String>, serializable: bool) -> Self {
        Self {
            form: DescriptorForm::Legacy,
            source: InterceptorSource::Class {
                class_name: class_name.into(),
                serializable,
            },
        }
    }

    /// Callbacks declared on the bean class itself
    pub fn self_method() -> Self {
        Self {
            form: DescriptorForm::Legacy,
            source: InterceptorSource::SelfMethod,
        }
    }

    /// Replace the declaration form
    pub fn with_form(mut self, form: DescriptorForm) -> Self {
        self.form = form;
        self
    }

    /// Attach nested participants to an interceptor bean
    ///
    /// Has no effect on class or self-method interceptors.
    pub fn with_stack(mut self, nested: InterceptionStack) -> Self {
        if let InterceptorSource::Bean { stack, .. } = &mut self.source {
            *stack = nested;
        }
        self
    }

    /// Name used in diagnostics
    pub fn display_name(&self) -> &str {
        match &self.source {
            InterceptorSource::Bean { name, .. } => name,
            InterceptorSource::Class { class_name, .. } => class_name,
            InterceptorSource::SelfMethod => "<self>",
        }
    }
}

/// A decorator attached to a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorDescriptor {
    /// Decorator bean name
    pub name: String,
    /// Whether the decorator bean is passivation capable
    pub passivation_capable: bool,
    /// Declaration form
    pub form: DescriptorForm,
    /// The decorator bean's own participants
    pub stack: InterceptionStack,
}

impl DecoratorDescriptor {
    /// Create a decorator descriptor with no nested participants
    pub fn new(name: impl Into<String>, passivation_capable: bool) -> Self {
        Self {
            name: name.into(),
            passivation_capable,
            form: DescriptorForm::Current,
            stack: InterceptionStack::default(),
        }
    }

    /// Attach nested participants
    pub fn with_stack(mut self, stack: InterceptionStack) -> Self {
        self.stack = stack;
        self
    }
}

/// Ordered decorators and interceptors of one bean
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterceptionStack {
    /// Decorators, outermost first
    pub decorators: Vec<DecoratorDescriptor>,
    /// Interceptor entries in invocation order
    pub interceptors: Vec<InterceptorDescriptor>,
}

impl InterceptionStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a decorator
    pub fn decorator(mut self, decorator: DecoratorDescriptor) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Add an interceptor
    pub fn interceptor(mut self, interceptor: InterceptorDescriptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Check if the bean has no participants at all
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty() && self.interceptors.is_empty()
    }

    /// Check if a proxy is needed to route calls through participants
    ///
    /// Self-method callbacks run on the bean instance directly and do not
    /// need a wrapper.
    pub fn requires_proxy(&self) -> bool {
        !self.decorators.is_empty()
            || self
                .interceptors
                .iter()
                .any(|i| !matches!(i.source, InterceptorSource::SelfMethod))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stack_needs_no_proxy() {
        let stack = InterceptionStack::new();
        assert!(stack.is_empty());
        assert!(!stack.requires_proxy());
    }

    #[test]
    fn test_self_method_only_needs_no_proxy() {
        let stack = InterceptionStack::new().interceptor(InterceptorDescriptor::self_method());
        assert!(!stack.is_empty());
        assert!(!stack.requires_proxy());
    }

    #[test]
    fn test_decorator_needs_proxy() {
        let stack = InterceptionStack::new().decorator(DecoratorDescriptor::new("Audit", true));
        assert!(stack.requires_proxy());
    }

    #[test]
    fn test_with_stack_only_applies_to_beans() {
        let nested = InterceptionStack::new().decorator(DecoratorDescriptor::new("Inner", false));

        let bean = InterceptorDescriptor::bean("Tx", true).with_stack(nested.clone());
        match bean.source {
            InterceptorSource::Bean { stack, .. } => assert_eq!(stack, nested),
            _ => panic!("Expected bean source"),
        }

        let class = InterceptorDescriptor::class("com.acme.Log", true).with_stack(nested);
        assert_eq!(class.display_name(), "com.acme.Log");
        assert_eq!(class.form, DescriptorForm::Legacy);
    }
}
