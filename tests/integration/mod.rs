//! Integration tests for numctx contexts, pipelines, snapshots and configuration

mod config_integration;
mod multi_context;
mod pipeline;
mod scenarios;
mod snapshot;
mod test_utils;
