pub mod config;
pub mod error;
pub mod model;
pub mod serde_util;
pub mod stream;
