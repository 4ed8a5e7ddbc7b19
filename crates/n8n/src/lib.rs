//! n8n REST client, capability discovery, deployment, and smoke testing.
//!
//! Wraps the n8n HTTP API (workflow creation, activation, capability
//! discovery) using [`reqwest`], and layers the deployment adapter and
//! post-deploy smoke probe on top.

pub mod api;
pub mod capability;
pub mod deploy;
pub mod smoke;
