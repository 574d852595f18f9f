//! Message-driven worker that turns viewer-authored prompts into onscreen
//! image alerts for a livestream.
//!
//! The worker consumes generation requests from Kafka, reserves the
//! viewer's point cost with the ledger service, generates the requested
//! image (and, for friends, a name) through an external API, post-processes
//! and stores the result, records everything in Postgres, and finally
//! publishes an alert event for the overlay to display.

pub mod config;
pub mod db;
pub mod error;
pub mod kafka;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
