#![forbid(unsafe_code)]

//! Mirrors a YouTube channel to Rutube, with optional TikTok and Instagram
//! uploads for vertical videos.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod reconcile;
pub mod rehost;
pub mod retry;
pub mod rutube;
pub mod social;
pub mod store;
