pub mod batchitem;
pub mod loader;
pub mod pipeline;
pub mod windower;

pub use batchitem::{SceneBatch, SceneBatcher};
pub use loader::{Frame, FrameLog, TrajectoryRecord};
pub use pipeline::{SceneSample, TrajectoriesDataset};
pub use windower::{SceneWindow, Windower, WindowerConfig};
