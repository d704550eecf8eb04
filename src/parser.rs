//! Scene document parsing.

use crate::core::camera::Camera;
use crate::core::common::Float;
use crate::core::geometry::Vector3f;
use crate::core::material::{ComplexIor, Material};
use crate::core::scene::Scene;
use crate::core::surface::Surface;
use crate::integrators::{PhotonMapperConfig, RenderSettings};
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed scene document.
#[derive(Debug)]
pub struct SceneDescription {
    /// The scene.
    pub scene: Scene,

    /// The camera.
    pub camera: Camera,

    /// Photon mapping configuration.
    pub photon_map: PhotonMapperConfig,

    /// Shared integrator settings.
    pub settings: RenderSettings,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    photon_map: PhotonMapperConfig,
    #[serde(default)]
    renderer: RenderSettings,
    camera: CameraConfig,
    #[serde(default = "default_ior")]
    ior: Float,
    #[serde(default)]
    sky: [Float; 3],
    materials: HashMap<String, MaterialConfig>,
    surfaces: Vec<SurfaceConfig>,
}

fn default_ior() -> Float {
    1.0
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraConfig {
    eye: [Float; 3],
    look_at: [Float; 3],
    #[serde(default = "default_up")]
    up: [Float; 3],
    #[serde(default = "default_fov")]
    vertical_fov: Float,
    width: usize,
    height: usize,
    #[serde(default = "default_spp")]
    samples_per_pixel: usize,
}

fn default_up() -> [Float; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov() -> Float {
    45.0
}

fn default_spp() -> usize {
    16
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterialConfig {
    #[serde(default)]
    reflectance: [Float; 3],
    #[serde(default)]
    emittance: [Float; 3],
    #[serde(default = "default_ior")]
    ior: Float,
    #[serde(default = "default_ior")]
    external_ior: Float,
    #[serde(default)]
    transparency: Float,
    /// Defaults to the maximum reflectance channel.
    reflect_probability: Option<Float>,
    #[serde(default)]
    roughness: Float,
    #[serde(default)]
    perfect_mirror: bool,
    complex_ior: Option<ComplexIorConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ComplexIorConfig {
    eta: [Float; 3],
    k: [Float; 3],
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
enum SurfaceConfig {
    Sphere {
        origin: [Float; 3],
        radius: Float,
        material: String,
    },
    Triangle {
        vertices: [[Float; 3]; 3],
        normals: Option<[[Float; 3]; 3]>,
        material: String,
    },
    Quad {
        origin: [Float; 3],
        edge_u: [Float; 3],
        edge_v: [Float; 3],
        material: String,
    },
}

impl SurfaceConfig {
    fn material(&self) -> &str {
        match self {
            SurfaceConfig::Sphere { material, .. } => material,
            SurfaceConfig::Triangle { material, .. } => material,
            SurfaceConfig::Quad { material, .. } => material,
        }
    }
}

fn vec3(v: [Float; 3]) -> Vector3f {
    Vector3f::new(v[0], v[1], v[2])
}

/// Load a scene document from a file.
///
/// * `path`        - Path to the scene file.
/// * `num_threads` - Worker pool size; zero selects the hardware cores.
pub fn load_scene(path: &str, num_threads: usize) -> Result<SceneDescription, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read scene file '{path}': {e}"))?;
    parse_scene(&text, num_threads).map_err(|e| format!("Failed to parse '{path}': {e}"))
}

/// Parse a scene document.
///
/// * `text`        - The JSON document.
/// * `num_threads` - Worker pool size; zero selects the hardware cores.
pub fn parse_scene(text: &str, num_threads: usize) -> Result<SceneDescription, String> {
    let file: SceneFile = serde_json::from_str(text).map_err(|e| e.to_string())?;

    file.photon_map.validate()?;
    if file.camera.width == 0 || file.camera.height == 0 {
        return Err("camera: image dimensions must be positive".to_string());
    }

    // Resolve material names to indices into the flat material array.
    let mut material_indices = HashMap::new();
    let mut materials = Vec::with_capacity(file.materials.len());
    let mut names: Vec<&String> = file.materials.keys().collect();
    names.sort();
    for name in names {
        let config = &file.materials[name];
        material_indices.insert(name.clone(), materials.len());
        materials.push(build_material(config)?);
    }

    let mut surfaces = Vec::with_capacity(file.surfaces.len());
    for config in &file.surfaces {
        let material = *material_indices
            .get(config.material())
            .ok_or_else(|| format!("surface references unknown material '{}'", config.material()))?;
        surfaces.push(match config {
            SurfaceConfig::Sphere { origin, radius, .. } => Surface::Sphere {
                origin: vec3(*origin),
                radius: *radius,
                material,
            },
            SurfaceConfig::Triangle {
                vertices, normals, ..
            } => Surface::Triangle {
                v0: vec3(vertices[0]),
                v1: vec3(vertices[1]),
                v2: vec3(vertices[2]),
                normals: normals.map(|n| [vec3(n[0]), vec3(n[1]), vec3(n[2])]),
                material,
            },
            SurfaceConfig::Quad {
                origin,
                edge_u,
                edge_v,
                ..
            } => Surface::Quad {
                origin: vec3(*origin),
                edge_u: vec3(*edge_u),
                edge_v: vec3(*edge_v),
                material,
            },
        });
    }

    let camera = Camera::new(
        vec3(file.camera.eye),
        vec3(file.camera.look_at),
        vec3(file.camera.up),
        file.camera.vertical_fov,
        file.camera.width,
        file.camera.height,
        file.camera.samples_per_pixel,
    );

    let mut settings = file.renderer;
    settings.num_threads = num_threads;

    Ok(SceneDescription {
        scene: Scene::new(surfaces, materials, file.ior, vec3(file.sky)),
        camera,
        photon_map: file.photon_map,
        settings,
    })
}

fn build_material(config: &MaterialConfig) -> Result<Material, String> {
    if config.ior <= 0.0 || config.external_ior <= 0.0 {
        return Err("material: indices of refraction must be positive".to_string());
    }
    if !(0.0..=1.0).contains(&config.transparency) {
        return Err("material: transparency must lie in [0, 1]".to_string());
    }

    let reflectance = vec3(config.reflectance);
    let reflect_probability = config
        .reflect_probability
        .unwrap_or_else(|| reflectance.max_component());
    if !(0.0..=1.0).contains(&reflect_probability) {
        return Err("material: reflect_probability must lie in [0, 1]".to_string());
    }

    Ok(Material {
        reflectance,
        emittance: vec3(config.emittance),
        ior: config.ior,
        external_ior: config.external_ior,
        transparency: config.transparency,
        reflect_probability,
        roughness: config.roughness,
        perfect_mirror: config.perfect_mirror,
        complex_ior: config.complex_ior.as_ref().map(|ci| ComplexIor {
            eta: vec3(ci.eta),
            k: vec3(ci.k),
        }),
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_SCENE: &str = r#"{
        "photon_map": {
            "emissions": 10000,
            "caustic_factor": 1.0,
            "max_radius": 0.5,
            "max_caustic_radius": 0.2,
            "max_photons_per_octree_leaf": 16
        },
        "camera": {
            "eye": [5.0, 5.0, -8.0],
            "look_at": [5.0, 5.0, 5.0],
            "width": 64,
            "height": 64
        },
        "materials": {
            "white": { "reflectance": [0.8, 0.8, 0.8] },
            "light": { "emittance": [10.0, 10.0, 10.0] }
        },
        "surfaces": [
            {
                "type": "quad",
                "origin": [0.0, 0.0, 0.0],
                "edge_u": [10.0, 0.0, 0.0],
                "edge_v": [0.0, 0.0, 10.0],
                "material": "white"
            },
            {
                "type": "sphere",
                "origin": [5.0, 9.0, 5.0],
                "radius": 0.5,
                "material": "light"
            }
        ]
    }"#;

    #[test]
    fn minimal_scene_parses() {
        let parsed = parse_scene(MINIMAL_SCENE, 1).unwrap();
        assert_eq!(parsed.scene.surfaces.len(), 2);
        assert_eq!(parsed.scene.emissives.len(), 1);
        assert_eq!(parsed.photon_map.k_nearest_photons, 50);
        assert!(parsed.photon_map.use_shadow_photons);
        assert_eq!(parsed.settings.max_ray_depth, 64);
        assert_eq!(parsed.camera.samples_per_pixel, 16);
    }

    #[test]
    fn missing_photon_map_key_is_an_error() {
        let text = MINIMAL_SCENE.replace("\"emissions\": 10000,", "");
        assert!(parse_scene(&text, 1).is_err());
    }

    #[test]
    fn unknown_material_reference_is_an_error() {
        let text = MINIMAL_SCENE.replace("\"material\": \"white\"", "\"material\": \"marble\"");
        let err = parse_scene(&text, 1).unwrap_err();
        assert!(err.contains("marble"));
    }

    #[test]
    fn reflect_probability_defaults_to_max_reflectance() {
        let parsed = parse_scene(MINIMAL_SCENE, 1).unwrap();
        let white = parsed
            .scene
            .materials
            .iter()
            .find(|m| !m.emissive())
            .unwrap();
        assert!((white.reflect_probability - 0.8).abs() < 1e-12);
    }
}
