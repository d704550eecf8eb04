//! End-to-end tests of the photon mapping integrator on Cornell-like box
//! scenes.

use lumen::core::common::Float;
use lumen::core::geometry::{Point3f, Ray, Vector3f};
use lumen::core::interaction::Interaction;
use lumen::core::material::Material;
use lumen::core::rng::Rng;
use lumen::core::scene::Scene;
use lumen::core::surface::Surface;
use lumen::integrators::{
    sample_direct, Integrator, PhotonMapper, PhotonMapperConfig, RenderSettings,
};

const WHITE: usize = 0;
const LIGHT: usize = 1;
const EXTRA: usize = 2;

fn white() -> Material {
    Material {
        reflectance: Vector3f::splat(0.8),
        reflect_probability: 0.8,
        ..Default::default()
    }
}

fn light() -> Material {
    Material {
        reflectance: Vector3f::ZERO,
        emittance: Vector3f::ONE,
        reflect_probability: 0.0,
        ..Default::default()
    }
}

fn quad(origin: [Float; 3], edge_u: [Float; 3], edge_v: [Float; 3], material: usize) -> Surface {
    Surface::Quad {
        origin: Point3f::new(origin[0], origin[1], origin[2]),
        edge_u: Vector3f::new(edge_u[0], edge_u[1], edge_u[2]),
        edge_v: Vector3f::new(edge_v[0], edge_v[1], edge_v[2]),
        material,
    }
}

/// The six inward-facing walls of a closed 10x10x10 box plus a 2x2 emissive
/// patch just below the ceiling.
fn box_surfaces(wall: usize, light: usize) -> Vec<Surface> {
    vec![
        // Floor, normal +y.
        quad([0.0, 0.0, 0.0], [0.0, 0.0, 10.0], [10.0, 0.0, 0.0], wall),
        // Ceiling, normal -y.
        quad([0.0, 10.0, 0.0], [10.0, 0.0, 0.0], [0.0, 0.0, 10.0], wall),
        // Back wall, normal -z.
        quad([0.0, 0.0, 10.0], [0.0, 10.0, 0.0], [10.0, 0.0, 0.0], wall),
        // Front wall, normal +z.
        quad([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0], wall),
        // Left wall, normal +x.
        quad([0.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0], wall),
        // Right wall, normal -x.
        quad([10.0, 0.0, 0.0], [0.0, 0.0, 10.0], [0.0, 10.0, 0.0], wall),
        // Ceiling light, normal -y, area 4.
        quad([4.0, 9.99, 4.0], [2.0, 0.0, 0.0], [0.0, 0.0, 2.0], light),
    ]
}

/// A closed 10x10x10 box with white walls and the ceiling light. `extra`
/// surfaces are appended with the `EXTRA` material.
fn cornell_box(extra_material: Option<Material>, extra_surfaces: Vec<Surface>) -> Scene {
    let mut surfaces = box_surfaces(WHITE, LIGHT);
    surfaces.extend(extra_surfaces);

    let mut materials = vec![white(), light()];
    if let Some(material) = extra_material {
        materials.push(material);
    }

    Scene::new(surfaces, materials, 1.0, Vector3f::ZERO)
}

fn config(emissions: usize) -> PhotonMapperConfig {
    PhotonMapperConfig {
        emissions,
        caustic_factor: 1.0,
        max_radius: 0.5,
        max_caustic_radius: 0.2,
        max_photons_per_octree_leaf: 16,
        k_nearest_photons: 50,
        direct_visualization: false,
        use_shadow_photons: true,
    }
}

fn settings(num_threads: usize, seed: u64) -> RenderSettings {
    RenderSettings {
        max_ray_depth: 64,
        min_ray_depth: 3,
        seed: Some(seed),
        num_threads,
    }
}

fn assert_photons_valid(mapper: &PhotonMapper, scene_bb: lumen::core::geometry::Bounds3f) {
    // Stored positions sit exactly on surfaces; allow for rounding on the
    // boundary faces.
    let pad = Point3f::splat(1e-6);
    let scene_bb =
        lumen::core::geometry::Bounds3f::new(scene_bb.p_min - pad, scene_bb.p_max + pad);
    let maps = [
        mapper.direct_map().data(),
        mapper.indirect_map().data(),
        mapper.caustic_map().data(),
    ];
    for photons in maps {
        for p in photons {
            assert!(scene_bb.contains(&p.position), "photon outside scene bounds");
            assert!(
                (p.direction.length() - 1.0).abs() < 1e-9,
                "photon direction is not a unit vector"
            );
            assert!(p.flux.is_finite(), "photon flux is not finite");
            assert!(p.flux.min_component() >= 0.0, "photon flux is negative");
        }
    }
    for p in mapper.shadow_map().data() {
        assert!(scene_bb.contains(&p.position));
    }
}

#[test]
fn diffuse_box_builds_valid_maps() {
    let scene = cornell_box(None, vec![]);
    let bb = scene.bounding_box();
    let mapper = PhotonMapper::new(&config(20_000), settings(2, 7), scene, true).unwrap();

    assert!(!mapper.direct_map().is_empty());
    assert!(!mapper.indirect_map().is_empty());
    // No specular surfaces: no S*D path prefixes exist.
    assert!(mapper.caustic_map().is_empty());

    assert_photons_valid(&mapper, bb);
}

#[test]
fn direct_map_flux_matches_emitter_flux() {
    // With caustic_factor = 1 every first diffuse hit stores a direct
    // photon, so the stored direct flux reproduces the emitted flux of
    // (1,1,1) * area 4 exactly.
    let scene = cornell_box(None, vec![]);
    let mapper = PhotonMapper::new(&config(20_000), settings(2, 11), scene, true).unwrap();

    let mut total = Vector3f::ZERO;
    for p in mapper.direct_map().data() {
        total += p.flux;
    }
    for channel in 0..3 {
        assert!(
            (total[channel] - 4.0).abs() < 1e-6,
            "stored direct flux {} deviates from emitted flux",
            total[channel]
        );
    }
}

#[test]
fn glass_sphere_fills_caustic_map() {
    let glass = Material {
        reflectance: Vector3f::ZERO,
        transparency: 1.0,
        ior: 1.5,
        reflect_probability: 0.9,
        ..Default::default()
    };
    let sphere = Surface::Sphere {
        origin: Point3f::new(5.0, 5.0, 5.0),
        radius: 1.5,
        material: EXTRA,
    };
    let scene = cornell_box(Some(glass), vec![sphere]);
    let bb = scene.bounding_box();
    let mapper = PhotonMapper::new(&config(20_000), settings(2, 13), scene, true).unwrap();

    assert!(!mapper.caustic_map().is_empty());
    assert!(!mapper.direct_map().is_empty());
    assert_photons_valid(&mapper, bb);
}

#[test]
fn caustic_estimate_dominates_indirect_under_glass_sphere() {
    // A glass ball focuses the light onto the floor: the paraxial focus of
    // a ball lens sits n·r/(2(n-1)) = 1.5r below the centre, so a radius-2
    // sphere centred 3 above the floor concentrates its caustic at the
    // floor point directly beneath it.
    let glass = Material {
        reflectance: Vector3f::ZERO,
        transparency: 1.0,
        ior: 1.5,
        reflect_probability: 0.9,
        ..Default::default()
    };
    let sphere = Surface::Sphere {
        origin: Point3f::new(5.0, 3.0, 5.0),
        radius: 2.0,
        material: EXTRA,
    };
    let scene = cornell_box(Some(glass), vec![sphere]);
    let mapper = PhotonMapper::new(&config(80_000), settings(2, 53), scene, true).unwrap();

    let mut rng = Rng::new(59);
    let probe = Ray::new(
        Point3f::new(5.0, 0.5, 5.0),
        Vector3f::new(0.0, -1.0, 0.0),
        1.0,
    );
    let scene = mapper.scene();
    let isect = scene.intersect(&probe).unwrap();
    let ia = Interaction::new(scene, &isect, &probe, &mut rng);

    let caustics = mapper.estimate_caustic_radiance(&ia).component_sum();
    let indirect = mapper.estimate_indirect_radiance(&ia).component_sum();
    assert!(caustics > 0.0, "no caustic radiance under the glass sphere");
    assert!(
        caustics >= 3.0 * indirect,
        "caustic estimate {caustics} is below 3x the indirect estimate {indirect}"
    );
}

#[test]
fn mirror_floor_routes_first_diffuse_hit_to_caustic() {
    // Replace the floor with a perfect mirror; light paths bounce off it
    // specularly and their first diffuse hit must be stored as caustic.
    let mirror = Material {
        perfect_mirror: true,
        reflectance: Vector3f::splat(0.9),
        reflect_probability: 0.9,
        ..Default::default()
    };
    let template = cornell_box(Some(mirror), vec![]);
    let mut surfaces = template.surfaces.clone();
    // Swap the floor material to the mirror.
    if let Surface::Quad { material, .. } = &mut surfaces[0] {
        *material = EXTRA;
    }
    let scene = Scene::new(surfaces, template.materials.clone(), 1.0, Vector3f::ZERO);

    let mapper = PhotonMapper::new(&config(20_000), settings(2, 17), scene, true).unwrap();
    assert!(!mapper.caustic_map().is_empty());
}

#[test]
fn occluder_creates_shadow_photons_and_kills_direct_light() {
    let occluder = Material {
        reflectance: Vector3f::splat(0.5),
        reflect_probability: 0.5,
        ..Default::default()
    };
    // An opaque patch halfway between the light and the floor.
    let patch = quad([3.5, 5.0, 3.5], [3.0, 0.0, 0.0], [0.0, 0.0, 3.0], EXTRA);
    let scene = cornell_box(Some(occluder), vec![patch]);

    let mapper = PhotonMapper::new(&config(20_000), settings(2, 19), scene, true).unwrap();
    assert!(!mapper.shadow_map().is_empty());

    // Next-event estimation from the centre of the umbra returns zero.
    let mut rng = Rng::new(1);
    let scene = mapper.scene();
    let down = Ray::new(Point3f::new(5.0, 2.0, 5.0), Vector3f::new(0.0, -1.0, 0.0), 1.0);
    let isect = scene.intersect(&down).unwrap();
    let ia = Interaction::new(scene, &isect, &down, &mut rng);
    assert!(sample_direct(scene, &ia, &mut rng).is_black());

    // A corner of the floor still sees the light.
    let corner = Ray::new(Point3f::new(0.5, 2.0, 0.5), Vector3f::new(0.0, -1.0, 0.0), 1.0);
    let isect = scene.intersect(&corner).unwrap();
    let ia = Interaction::new(scene, &isect, &corner, &mut rng);
    assert!(sample_direct(scene, &ia, &mut rng).max_component() > 0.0);
}

#[test]
fn russian_roulette_conserves_energy_across_maps() {
    // Every surface, the light included, carries the same tinted
    // reflectance, so each stored vertex of a surviving path carries flux
    // rescaled by max-channel Russian roulette and the expected stored
    // total per channel is the emitted flux times the survival series:
    // Φ_c · Σ ρ_c^k = Φ_c / (1 - ρ_c).
    let reflectance = Vector3f::new(0.8, 0.6, 0.4);
    let walls = Material {
        reflectance,
        reflect_probability: 0.8,
        ..Default::default()
    };
    let tinted_light = Material {
        reflectance,
        emittance: Vector3f::ONE,
        reflect_probability: 0.8,
        ..Default::default()
    };
    let scene = Scene::new(
        box_surfaces(0, 1),
        vec![walls, tinted_light],
        1.0,
        Vector3f::ZERO,
    );

    let emissions = 50_000;
    let mapper = PhotonMapper::new(&config(emissions), settings(2, 61), scene, true).unwrap();

    let mut total = Vector3f::ZERO;
    let maps = [
        mapper.direct_map().data(),
        mapper.indirect_map().data(),
        mapper.caustic_map().data(),
    ];
    for photons in maps {
        for p in photons {
            total += p.flux;
        }
    }

    // The light emits (1,1,1) over area 4.
    let emitted = Vector3f::splat(4.0);
    for channel in 0..3 {
        let expected = emitted[channel] / (1.0 - reflectance[channel]);
        let ratio = total[channel] / expected;
        assert!(
            (ratio - 1.0).abs() < 0.08,
            "channel {channel}: stored flux {} deviates from expected {expected}",
            total[channel]
        );
    }
}

#[test]
fn fixed_seed_single_thread_is_reproducible() {
    let run = || {
        let scene = cornell_box(None, vec![]);
        PhotonMapper::new(&config(5_000), settings(1, 23), scene, true).unwrap()
    };
    let a = run();
    let b = run();

    assert_eq!(a.direct_map().len(), b.direct_map().len());
    assert_eq!(a.indirect_map().len(), b.indirect_map().len());
    assert_eq!(a.shadow_map().len(), b.shadow_map().len());

    for (pa, pb) in a.direct_map().data().iter().zip(b.direct_map().data()) {
        assert_eq!(pa.position, pb.position);
        assert_eq!(pa.flux, pb.flux);
        assert_eq!(pa.direction, pb.direction);
    }
}

#[test]
fn floor_radiance_is_positive_and_finite() {
    let scene = cornell_box(None, vec![]);
    let mapper = PhotonMapper::new(&config(30_000), settings(2, 29), scene, true).unwrap();

    let mut rng = Rng::new(31);
    let mut mean = Vector3f::ZERO;
    let n = 100;
    for _ in 0..n {
        let ray = Ray::new(
            Point3f::new(5.0, 5.0, 5.0),
            Vector3f::new(0.0, -1.0, 0.0),
            1.0,
        );
        let radiance = mapper.sample_ray(ray, &mut rng);
        assert!(radiance.is_finite());
        assert!(radiance.min_component() >= 0.0);
        mean += radiance / n as Float;
    }
    assert!(mean.max_component() > 0.0, "floor radiance is zero");
}

#[test]
fn empty_scene_returns_sky_radiance() {
    let sky = Vector3f::new(0.2, 0.4, 0.8);
    let scene = Scene::new(vec![], vec![], 1.0, sky);
    let mapper = PhotonMapper::new(&config(1_000), settings(1, 37), scene, true).unwrap();

    let mut rng = Rng::new(41);
    let ray = Ray::new(Point3f::ZERO, Vector3f::new(0.0, 0.0, 1.0), 1.0);
    assert_eq!(mapper.sample_ray(ray, &mut rng), sky);
}

#[test]
fn unlit_box_estimates_zero_without_nans() {
    // A closed box with no emitters: all maps are empty, direct-light
    // sampling finds nothing, and the estimate must come out zero.
    let template = cornell_box(None, vec![]);
    let surfaces: Vec<Surface> = template
        .surfaces
        .iter()
        .filter(|surface| surface.material() != LIGHT)
        .cloned()
        .collect();
    let scene = Scene::new(surfaces, template.materials.clone(), 1.0, Vector3f::ZERO);
    let mapper = PhotonMapper::new(&config(1_000), settings(1, 43), scene, true).unwrap();
    assert!(mapper.direct_map().is_empty());

    let mut rng = Rng::new(47);
    for _ in 0..50 {
        let ray = Ray::new(
            Point3f::new(5.0, 5.0, 5.0),
            Vector3f::new(0.3, -1.0, 0.2).normalize(),
            1.0,
        );
        let radiance = mapper.sample_ray(ray, &mut rng);
        assert!(radiance.is_finite());
        assert_eq!(radiance, Vector3f::ZERO);
    }
}
