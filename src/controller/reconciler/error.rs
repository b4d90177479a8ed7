//! # Reconciler Errors

use super::patcher::PatchError;
use super::reapply::ReapplyError;
use super::result::HandlerError;
use crate::state::UnsupportedState;

#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("unable to get object: {0}")]
    Get(#[source] kube::Error),

    /// The stored state name is not part of the lifecycle; retrying cannot help
    #[error(transparent)]
    UnsupportedState(#[from] UnsupportedState),

    #[error("failed to manage finalizers: {0}")]
    Finalizers(#[source] kube::Error),

    #[error("failed to unset finalizer: {0}")]
    UnsetFinalizers(#[source] kube::Error),

    #[error("failed to reconcile reapply: {0}")]
    Reapply(#[source] ReapplyError),

    #[error("failed to patch status: {0}")]
    PatchStatus(#[source] PatchError),

    /// Reported by a state handler; recorded in the Ready condition
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ReconcilerError {
    /// Errors that indicate corrupt persisted data rather than a transient failure
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcilerError::UnsupportedState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceState;

    #[test]
    fn test_messages() {
        let err = ReconcilerError::from(UnsupportedState(String::new()));
        assert_eq!(err.to_string(), r#"unsupported state """#);
        assert!(err.is_terminal());

        let err = ReconcilerError::Finalizers(kube::Error::Service("timeout".into()));
        assert!(err.to_string().starts_with("failed to manage finalizers: "));
        assert!(!err.is_terminal());

        let err = ReconcilerError::from(HandlerError {
            state: ResourceState::Creating,
            source: anyhow::anyhow!("quota exceeded"),
        });
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
