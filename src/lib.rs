pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

// Content store and the domain shapes it persists
pub mod domain;
pub mod storage;

pub mod repository;
pub mod import;
pub mod settings;

// Query/render protocol and the browser-side reconciliation loop
pub mod client;
pub mod protocol;

// Public suggestion form
pub mod nonce;
pub mod sanitize;
pub mod submission;

// HTTP surface
pub mod handlers;
pub mod server;
pub mod state;
pub mod templates;
