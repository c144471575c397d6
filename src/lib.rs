pub mod config;
pub mod error;
pub mod handlers;
pub mod index;
pub mod location;
pub mod logging;
pub mod range;
pub mod response;
pub mod service;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
