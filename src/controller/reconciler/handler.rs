//! # Handler Contract
//!
//! One implementation per resource kind and API version. The reconciler derives
//! the lifecycle state and calls exactly one `handle_*` operation per pass; it
//! never inspects what a handler does.
//!
//! `Deleted` has no operation: it is terminal and only clears the finalizer.

use super::result::HandlerResult;
use crate::crd::StateObject;
use async_trait::async_trait;
use kube_runtime::{watcher, Controller};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateHandler<K: StateObject>: Send + Sync {
    async fn handle_initial(&self, obj: &K) -> HandlerResult;
    async fn handle_import_requested(&self, obj: &K) -> HandlerResult;
    async fn handle_imported(&self, obj: &K) -> HandlerResult;
    async fn handle_creating(&self, obj: &K) -> HandlerResult;
    async fn handle_created(&self, obj: &K) -> HandlerResult;
    async fn handle_updating(&self, obj: &K) -> HandlerResult;
    async fn handle_updated(&self, obj: &K) -> HandlerResult;
    async fn handle_deletion_requested(&self, obj: &K) -> HandlerResult;
    async fn handle_deleting(&self, obj: &K) -> HandlerResult;

    /// Watch configuration for the managed kind
    fn watcher_config(&self) -> watcher::Config {
        watcher::Config::default().any_semantic()
    }

    /// Add watches on owned or dependent objects to the controller
    fn configure(&self, controller: Controller<K>) -> Controller<K> {
        controller
    }
}
