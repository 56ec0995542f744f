use id_arena::Id;

use crate::{
    model::{Model, PhongMaterial},
    rendering::render_model::RenderModelId,
};

pub type SceneModelId = Id<SceneModel>;

/// Geometry plus material, shared by every object that draws it.
pub struct SceneModel {
    pub model: Model,
    pub material: PhongMaterial,
    pub render_model: Option<RenderModelId>,
}

impl SceneModel {
    pub fn new(model: Model, material: PhongMaterial) -> Self {
        Self {
            model,
            material,
            render_model: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }
}
