pub mod model;

pub use model::{SocialModel, SocialModelConfig};
