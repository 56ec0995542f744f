use std::f32::consts::PI;

use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use winit::dpi::PhysicalSize;

use crate::{
    camera::PerspectiveCamera,
    color::Color,
    config::{DemoConfig, Variant},
    fly_controls::FlyControls,
    geometry::box_model,
    lens_flare::{FlareTexture, LensFlare, LensFlareElement},
    lights::{AmbientLight, DirectionalLight, PointLight},
    model::PhongMaterial,
    scene_graph::{
        Fog, InstancedMesh, Object3D, ObjectKind, Scene, SceneModel, Transform,
    },
};

/// (h, s, l) and position of each flare-casting light.
const FLARE_LIGHTS: [([f32; 3], Vec3); 3] = [
    ([0.55, 0.9, 0.5], Vec3::new(5000.0, 0.0, -1000.0)),
    ([0.08, 0.8, 0.5], Vec3::new(0.0, 0.0, -1000.0)),
    ([0.995, 0.5, 0.9], Vec3::new(5000.0, 5000.0, -1000.0)),
];

pub struct DemoState {
    pub variant: Variant,
    pub camera: PerspectiveCamera,
    pub controls: FlyControls,
    pub scene: Scene,
}

impl DemoState {
    pub fn new(config: &DemoConfig, initial_size: PhysicalSize<u32>) -> anyhow::Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let camera = PerspectiveCamera::from_config(&config.camera, initial_size);
        let controls = FlyControls::from_config(&config.controls);

        // The instanced rendition treats the HSL background as linear, the individual one
        // converts it from sRGB.
        let background = match config.variant {
            Variant::Instanced => Color::from_hsl(0.51, 0.4, 0.01),
            Variant::Individual => Color::from_srgb_hsl(0.51, 0.4, 0.01),
        };

        let mut scene = Scene::new(background);
        scene.fog = Some(Fog {
            color: background,
            near: config.fog.near,
            far: config.fog.far,
        });

        let box_model = scene.add_model(SceneModel::new(
            box_model("Box", config.boxes.size),
            PhongMaterial {
                color: Color::from_hex(0xffffff),
                specular: Color::from_hex(0xffffff),
                shininess: 50.0,
            },
        ));

        let placements = scatter_boxes(&mut rng, config.boxes.count, config.boxes.spread);

        match config.variant {
            Variant::Instanced => {
                let mut mesh = InstancedMesh::new(box_model, placements.len());
                for (index, (translation, rotation)) in placements.into_iter().enumerate() {
                    mesh.set_matrix_at(index, Mat4::from_rotation_translation(rotation, translation));
                }
                scene.add_object(Object3D::new("Boxes", ObjectKind::InstancedMesh(mesh)));

                scene.add_object(Object3D::new(
                    "Ambient light",
                    ObjectKind::AmbientLight(AmbientLight {
                        color: Color::WHITE,
                        intensity: 0.2,
                    }),
                ));
            }
            Variant::Individual => {
                for (index, (translation, rotation)) in placements.into_iter().enumerate() {
                    scene.add_object(
                        Object3D::new(
                            format!("Box {index}"),
                            ObjectKind::Mesh {
                                model_id: box_model,
                            },
                        )
                        .with_transform(Transform::from_translation_rotation(translation, rotation)),
                    );
                }
            }
        }

        scene.add_object(Object3D::new(
            "Directional light",
            ObjectKind::DirectionalLight(DirectionalLight {
                color: Color::from_hsl(0.1, 0.7, 0.5),
                intensity: 0.15,
                position: Vec3::new(0.0, -1.0, 0.0).normalize(),
            }),
        ));

        for &([h, s, l], position) in &FLARE_LIGHTS {
            add_flare_light(&mut scene, h, s, l, position);
        }

        scene.late_update();

        log::info!(
            "Built {:?} scene with {} boxes",
            config.variant,
            config.boxes.count
        );

        Ok(Self {
            variant: config.variant,
            camera,
            controls,
            scene,
        })
    }

    pub fn update(&mut self, delta: f32) {
        self.controls.update(&mut self.camera, delta);
    }
}

fn add_flare_light(scene: &mut Scene, h: f32, s: f32, l: f32, position: Vec3) {
    let light = PointLight {
        color: Color::from_hsl(h, s, l),
        intensity: 1.5,
        distance: 2000.0,
        decay: 0.0,
    };

    let light_id = scene.add_object(
        Object3D::new(format!("Point light {h}"), ObjectKind::PointLight(light))
            .with_transform(Transform::from_translation(position)),
    );

    let mut flare = LensFlare::new();
    flare.add_element(LensFlareElement::with_color(
        FlareTexture::Main,
        700.0,
        0.0,
        light.color,
    ));
    flare.add_element(LensFlareElement::new(FlareTexture::Ring, 60.0, 0.6));
    flare.add_element(LensFlareElement::new(FlareTexture::Ring, 70.0, 0.7));
    flare.add_element(LensFlareElement::new(FlareTexture::Ring, 120.0, 0.9));
    flare.add_element(LensFlareElement::new(FlareTexture::Ring, 70.0, 1.0));

    scene.add_child(
        light_id,
        Object3D::new(format!("Lens flare {h}"), ObjectKind::LensFlare(flare)),
    );
}

/// Random position in `[-spread, spread)^3` and random XYZ Euler rotation in `[0, PI)` per axis.
fn scatter_boxes(rng: &mut impl Rng, count: usize, spread: f32) -> Vec<(Vec3, Quat)> {
    (0..count)
        .map(|_| {
            let translation = Vec3::new(
                spread * (2.0 * rng.gen::<f32>() - 1.0),
                spread * (2.0 * rng.gen::<f32>() - 1.0),
                spread * (2.0 * rng.gen::<f32>() - 1.0),
            );
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                rng.gen::<f32>() * PI,
                rng.gen::<f32>() * PI,
                rng.gen::<f32>() * PI,
            );
            (translation, rotation)
        })
        .collect()
}
