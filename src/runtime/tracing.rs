//! # Observability & Tracing
//!
//! The planner logs through the `tracing` crate and never installs a subscriber
//! itself. Hosts that have no subscriber of their own can call [`setup_tracing`].
//!
//! ## What Gets Traced
//!
//! - **Planning calls**: a `plan` span carrying `tenant`, `root` and `correlation_id`
//! - **Prefetch queries**: a nested `resolve` span per relation with the request URL
//!   at `debug` and the returned/used key counts at `info`
//! - **Rewrites**: the original and rewritten filter at `info`
//! - **Degradations**: ignored configuration layers, failed prefetches and
//!   untokenizable filters at `warn`
//!
//! ## Usage
//!
//! ```bash
//! # Plan summaries and rewrites
//! RUST_LOG=info
//!
//! # Prefetch URLs, skipped relations and configuration layers
//! RUST_LOG=relation_prefetch=debug
//! ```
//!
//! **With `RUST_LOG=info`**:
//!
//! ```text
//! INFO plan:resolve: Prefetch resolved returned=2 used=2 truncated=false tenant="acme" root="mxapiwo" relation="asset" resource=mxapiasset
//! INFO plan: Filter rewritten from=asset.assettype="SENSOR" to=(assetnum="A100" or assetnum="A101") tenant="acme" root="mxapiwo"
//! INFO plan: Plan complete mode=Prefetch steps=3 truncated=false tenant="acme" root="mxapiwo"
//! ```

/// Installs a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Calling it again, or after another subscriber was installed, is a no-op.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
