//! AIVerse - metered AI operations gateway
//!
//! Authenticated users call hosted AI services (article and blog-title
//! generation, image generation, background and object removal, resume
//! review) and share the results with the community.
//!
//! ## Components
//!
//! - **Entitlements**: plan and free-usage gate in front of every operation
//! - **Dispatch**: one metered path for the closed set of AI operations
//! - **Ledger**: append-only record of creations
//! - **Likes**: conflict-safe like toggles on creations
//! - **Services**: chat completions, ClipDrop and Cloudinary clients

pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod entitlements;
pub mod ledger;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState, Stores};
pub use types::{AiverseError, Result};
