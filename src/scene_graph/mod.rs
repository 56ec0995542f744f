pub mod object3d;
pub mod scene;
pub mod scene_model;
pub mod transform;

pub use object3d::{InstancedMesh, Object3D, ObjectId, ObjectKind};
pub use scene::{Fog, Scene};
pub use scene_model::{SceneModel, SceneModelId};
pub use transform::Transform;
