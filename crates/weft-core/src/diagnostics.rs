use std::any::Any;
use std::fmt;

/// Non-fatal problems the runtime swallows and reports out of band.
///
/// Install a handler with [`crate::Scheduler::set_diagnostic_handler`];
/// without one every diagnostic is logged through `log`.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    EffectPanicked {
        component: &'static str,
        slot: usize,
        message: String,
    },
    CleanupPanicked {
        component: &'static str,
        slot: usize,
        message: String,
    },
    TaskPanicked {
        message: String,
    },
    DuplicateUnkeyedSibling {
        parent: &'static str,
        component: &'static str,
    },
    PositionalReuseAfterResize {
        parent: &'static str,
        component: &'static str,
        index: usize,
    },
    TaskRoundsExceeded {
        rounds: usize,
    },
}

impl Diagnostic {
    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            Diagnostic::EffectPanicked { .. }
                | Diagnostic::CleanupPanicked { .. }
                | Diagnostic::TaskPanicked { .. }
        )
    }

    pub(crate) fn log(&self) {
        if self.is_panic() {
            log::error!("{self}");
        } else {
            log::warn!("{self}");
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EffectPanicked {
                component,
                slot,
                message,
            } => write!(f, "effect #{slot} of <{component}> panicked: {message}"),
            Diagnostic::CleanupPanicked {
                component,
                slot,
                message,
            } => write!(f, "cleanup #{slot} of <{component}> panicked: {message}"),
            Diagnostic::TaskPanicked { message } => write!(f, "local task panicked: {message}"),
            Diagnostic::DuplicateUnkeyedSibling { parent, component } => write!(
                f,
                "<{parent}> renders several unkeyed <{component}> siblings; add keys to keep state stable"
            ),
            Diagnostic::PositionalReuseAfterResize {
                parent,
                component,
                index,
            } => write!(
                f,
                "<{parent}> changed its child count; unkeyed <{component}> at {index} reused by position"
            ),
            Diagnostic::TaskRoundsExceeded { rounds } => {
                write!(f, "drain stopped after {rounds} task rounds with work still pending")
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
