//! # Holdline Webhook Server
//!
//! HTTP front door for the [`holdline_transfer_engine`]: receives provider
//! webhooks and admin requests, talks to Twilio for call redirects, and owns
//! configuration loading and logging setup for the `holdline` binary.

pub mod api;
pub mod config;
pub mod logging;
pub mod twilio;

pub use api::{create_router, ApiError};
pub use config::{ServerConfig, TwilioConfig};
pub use logging::{setup_logging, LoggingConfig};
pub use twilio::TwilioProvider;
