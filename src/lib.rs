//! # dbaas-state-controller
//!
//! Kubernetes operator core that drives resources of an external database
//! service through a crash-safe lifecycle state machine.
//!
//! Each managed kind implements [`controller::reconciler::StateHandler`], one
//! operation per lifecycle state. The generic
//! [`controller::reconciler::StateReconciler`] derives the current state from
//! the persisted `State` condition, guards deletion with a finalizer, dispatches
//! one handler operation per pass, schedules periodic reapplies, and records the
//! outcome as `State` and `Ready` conditions.
//!
//! `FlexCluster` is the reference kind, backed by the Atlas Admin API.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod handlers;
pub mod observability;
pub mod provider;
pub mod runtime;
pub mod state;
