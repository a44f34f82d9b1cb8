pub mod calibration;
pub mod config;
pub mod error;
pub mod events;
pub mod quilt;
pub mod render;
pub mod tasks {
    pub mod files;
    pub mod loader;
    pub mod playlist;
    pub mod viewer;
}

pub use error::{Error, Result};
