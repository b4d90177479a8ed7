//! # dbaas-state-controller
//!
//! Operator binary: initializes the runtime and watches `FlexCluster` resources
//! until SIGINT or SIGTERM.
//!
//! Configuration comes from environment variables; see
//! [`dbaas_state_controller::config`].

use anyhow::Result;
use dbaas_state_controller::runtime::initialization::initialize;
use dbaas_state_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.clusters,
        init.context,
        init.server_state,
        init.controller_config,
    )
    .await
}
