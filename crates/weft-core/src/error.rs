use thiserror::Error;

use crate::hook_context::Phase;

/// Misuse of the hook API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("{hook}() {}", phase_hint(.phase))]
    IllegalHookContext {
        hook: &'static str,
        /// Phase that was active, `None` when no component was executing.
        phase: Option<Phase>,
    },
    #[error("hook slot {index} of <{component}> does not hold {expected}; hook order changed between renders")]
    SlotMismatch {
        component: &'static str,
        index: usize,
        expected: String,
    },
    #[error("<{component}> called {actual} hooks but previously called {expected}")]
    HookCountChanged {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

fn phase_hint(phase: &Option<Phase>) -> &'static str {
    match phase {
        None => "can only be called while a component is rendering",
        Some(Phase::Effect) => "cannot be called from inside an effect",
        Some(Phase::Render) => "is not available during render",
    }
}

/// Failure while rendering a subtree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("<{component}> failed to render: {message}")]
    Component {
        component: &'static str,
        message: String,
    },
    #[error("<{component}> is already rendering")]
    Reentrant { component: &'static str },
}

impl RenderError {
    /// Error raised by user render code. The runtime fills in the component name.
    pub fn msg(message: impl Into<String>) -> Self {
        RenderError::Component {
            component: "",
            message: message.into(),
        }
    }

    pub(crate) fn in_component(self, name: &'static str) -> Self {
        match self {
            RenderError::Component {
                component: "",
                message,
            } => RenderError::Component {
                component: name,
                message,
            },
            other => other,
        }
    }
}

impl From<ServiceError> for RenderError {
    fn from(err: ServiceError) -> Self {
        RenderError::Hook(HookError::Service(err))
    }
}

/// Service registry lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service `{name}` is registered with a different type than {requested}")]
    TypeMismatch {
        name: String,
        requested: &'static str,
    },
}
