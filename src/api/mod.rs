//! HTTP surface: one upload endpoint plus the upload form, health probe and
//! error pages.
//!
//! The router is composable: `app_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod error;
pub mod router;
pub mod server;
pub mod upload;

pub use error::ApiError;
pub use router::{app_router, AppState};
pub use server::{start_server, ApiServer};
