pub mod camera;
pub mod geometry;
pub mod pipeline;
pub mod scene;
pub mod store;
pub mod util;
pub mod visibility;

pub use camera::{Camera, CullingView, Projection};
pub use pipeline::{
    CullingSettings, FrameCameras, FrameContext, FrameStats, parallel::WorkerCount, run_frame,
};
pub use scene::Scene;
pub use store::{
    EntityDesc, EntityId, EntityStore, StoreError,
    light::{LightDesc, LightType},
};
pub use visibility::{RenderQueueId, VisibilityFlags};
