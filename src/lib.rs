// Library entry point for noise-signal-server
// Exposes modules for testing

pub mod api;
pub mod models;
pub mod store;
