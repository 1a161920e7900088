pub mod image_store;
pub mod tracker;

pub use image_store::{ImageStore, ServedImage};
pub use tracker::TrackingService;
