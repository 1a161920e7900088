pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{ImageStore, TrackingService};

/// Shared application state handed to every handler
pub struct AppState {
    pub tracker: TrackingService,
    pub images: ImageStore,
}
