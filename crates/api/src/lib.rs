//! HTTP API: server, routing, and request/response mapping for the authkit recipes.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
