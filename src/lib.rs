pub mod coordinates;
pub mod data;
pub mod error;
pub mod models;
pub mod modules;
pub mod pooling;
pub mod utils;

pub use error::Error;
