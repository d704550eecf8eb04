//! Photon mapping integrator.
//!
//! Pass 1 shoots particles from the emitters and classifies every stored
//! particle by its path history into one of four maps: direct, indirect,
//! caustic and shadow. Pass 2 estimates radiance along camera rays by
//! combining next-event estimation, photon density estimation and a
//! cone-filtered caustic estimate.

use super::{sample_direct, Integrator, RenderSettings};
use crate::accelerators::{LinearOctree, Octree, PointData, SearchResult};
use crate::core::common::*;
use crate::core::geometry::{CoordinateSystem, Point3f, Ray, Vector3f};
use crate::core::interaction::{Interaction, ScatterType};
use crate::core::parallel::{create_progress_bar, WorkQueue};
use crate::core::rng::Rng;
use crate::core::sampling::cosine_sample_hemisphere;
use crate::core::scene::Scene;
use serde::Deserialize;

/// Emissions per work chunk.
const EPW: usize = 100_000;

/// A light-carrying particle. The direction is the direction of travel at
/// the moment of absorption, pointing toward the surface.
#[derive(Copy, Clone, Debug)]
pub struct Photon {
    /// Radiant power carried by the particle.
    pub flux: Vector3f,

    /// World-space position on a surface.
    pub position: Point3f,

    /// Unit direction of travel just before being stored.
    pub direction: Vector3f,
}

impl Photon {
    /// Create a new photon.
    ///
    /// * `flux`      - Radiant power carried by the particle.
    /// * `position`  - World-space position on a surface.
    /// * `direction` - Unit direction of travel just before being stored.
    pub fn new(flux: Vector3f, position: Point3f, direction: Vector3f) -> Self {
        Self {
            flux,
            position,
            direction,
        }
    }
}

impl PointData for Photon {
    fn position(&self) -> Point3f {
        self.position
    }
}

/// Marks a point on a diffusely-reflective surface that is occluded from at
/// least one light.
#[derive(Copy, Clone, Debug)]
pub struct ShadowPhoton {
    /// World-space position on a surface.
    pub position: Point3f,
}

impl PointData for ShadowPhoton {
    fn position(&self) -> Point3f {
        self.position
    }
}

/// Configuration of the photon mapping integrator, consumed from the scene
/// document under the `photon_map` key.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotonMapperConfig {
    /// Target photon emissions before caustic scaling.
    pub emissions: usize,

    /// Multiplier on total emissions; its inverse is the storage probability
    /// of non-caustic photons, which keeps caustic photons comparatively
    /// dense.
    pub caustic_factor: Float,

    /// Search radius for the direct, indirect and shadow maps.
    pub max_radius: Float,

    /// Search radius for the caustic map.
    pub max_caustic_radius: Float,

    /// Octree leaf capacity.
    pub max_photons_per_octree_leaf: usize,

    /// Number of neighbours gathered by every k-NN query.
    #[serde(default = "default_k_nearest_photons")]
    pub k_nearest_photons: usize,

    /// Estimate direct illumination from the direct map instead of
    /// next-event estimation.
    #[serde(default)]
    pub direct_visualization: bool,

    /// Store shadow photons and use them to skip direct-light sampling in
    /// umbra regions.
    #[serde(default = "default_use_shadow_photons")]
    pub use_shadow_photons: bool,
}

fn default_k_nearest_photons() -> usize {
    50
}

fn default_use_shadow_photons() -> bool {
    true
}

impl PhotonMapperConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.emissions == 0 {
            return Err("photon_map: emissions must be positive".to_string());
        }
        if self.caustic_factor < 1.0 {
            return Err("photon_map: caustic_factor must be at least 1".to_string());
        }
        if self.max_radius <= 0.0 || self.max_caustic_radius <= 0.0 {
            return Err("photon_map: search radii must be positive".to_string());
        }
        if self.max_photons_per_octree_leaf == 0 {
            return Err("photon_map: max_photons_per_octree_leaf must be positive".to_string());
        }
        if self.k_nearest_photons == 0 {
            return Err("photon_map: k_nearest_photons must be positive".to_string());
        }
        Ok(())
    }
}

/// The two-pass photon mapping integrator. Construction runs Pass 1
/// synchronously and freezes the four maps; `sample_ray` serves Pass 2
/// against read-only state.
pub struct PhotonMapper {
    scene: Scene,
    settings: RenderSettings,

    k_nearest_photons: usize,
    max_radius: Float,
    max_caustic_radius: Float,
    min_bounce_distance: Float,
    direct_visualization: bool,
    use_shadow_photons: bool,

    direct_map: LinearOctree<Photon>,
    indirect_map: LinearOctree<Photon>,
    caustic_map: LinearOctree<Photon>,
    shadow_map: LinearOctree<ShadowPhoton>,
}

/// One chunk of emission work.
struct EmissionWork {
    light: usize,
    num_emissions: usize,
    flux: Vector3f,
}

/// Per-thread photon storage filled during the emission phase.
#[derive(Default)]
struct PhotonBatch {
    direct: Vec<Photon>,
    indirect: Vec<Photon>,
    caustic: Vec<Photon>,
    shadow: Vec<ShadowPhoton>,
}

/// Read-only emission context shared by the worker pool.
struct Tracer<'a> {
    scene: &'a Scene,
    max_ray_depth: usize,
    min_ray_depth: usize,
    non_caustic_reject: Float,
    use_shadow_photons: bool,
}

impl PhotonMapper {
    /// Create the integrator and run the photon emission pass.
    ///
    /// * `config`   - Photon mapping configuration.
    /// * `settings` - Shared integrator settings.
    /// * `scene`    - The scene; the integrator takes ownership.
    /// * `quiet`    - Suppress progress output.
    pub fn new(
        config: &PhotonMapperConfig,
        settings: RenderSettings,
        scene: Scene,
        quiet: bool,
    ) -> Result<Self, String> {
        config.validate()?;

        let non_caustic_reject = 1.0 / config.caustic_factor;
        let scaled_emissions = (config.emissions as Float * config.caustic_factor) as usize;

        let mut work = emission_work(&scene, scaled_emissions);
        let chunk_count = work.len();
        settings.rng_for(0).shuffle(&mut work);

        let queue = WorkQueue::new(work);
        let progress = create_progress_bar(chunk_count as u64, "Emitting photons", quiet);

        let tracer = Tracer {
            scene: &scene,
            max_ray_depth: settings.max_ray_depth,
            min_ray_depth: settings.min_ray_depth,
            non_caustic_reject,
            use_shadow_photons: config.use_shadow_photons,
        };

        let mut batches: Vec<PhotonBatch> = crossbeam::scope(|scope| {
            let handles: Vec<_> = (0..settings.threads())
                .map(|worker| {
                    let queue = queue.clone();
                    let tracer = &tracer;
                    let progress = &progress;
                    let mut rng = settings.rng_for(1 + worker as u64);
                    scope.spawn(move |_| {
                        let mut batch = PhotonBatch::default();
                        while let Some(work) = queue.pop() {
                            let light = &tracer.scene.surfaces[work.light];
                            for _ in 0..work.num_emissions {
                                let p = light.point(rng.uniform_float(), rng.uniform_float());
                                let normal = light.normal(&p);
                                let direction = CoordinateSystem::new(normal)
                                    .to_world(&cosine_sample_hemisphere(&mut rng));
                                let ray =
                                    Ray::new(p + normal * EPSILON, direction, tracer.scene.ior);
                                tracer.emit(ray, work.flux, &mut batch, &mut rng);
                            }
                            progress.inc(1);
                        }
                        batch
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();
        progress.finish_with_message("Photons emitted");

        // Fold the per-thread vectors into the octrees, draining from the
        // back so memory falls as insertion proceeds, then freeze each map
        // into its packed form.
        let bounds = scene.bounding_box();
        let leaf = config.max_photons_per_octree_leaf;
        let mut direct_map = Octree::new(bounds, leaf);
        let mut indirect_map = Octree::new(bounds, leaf);
        let mut caustic_map = Octree::new(bounds, leaf);
        let mut shadow_map = Octree::new(bounds, leaf);

        for batch in &mut batches {
            while let Some(photon) = batch.direct.pop() {
                direct_map.insert(photon);
            }
            while let Some(photon) = batch.indirect.pop() {
                indirect_map.insert(photon);
            }
            while let Some(photon) = batch.caustic.pop() {
                caustic_map.insert(photon);
            }
            while let Some(photon) = batch.shadow.pop() {
                shadow_map.insert(photon);
            }
        }

        info!(
            "Photon maps built: {} direct, {} indirect, {} caustic, {} shadow",
            direct_map.len(),
            indirect_map.len(),
            caustic_map.len(),
            shadow_map.len()
        );

        Ok(Self {
            scene,
            settings,
            k_nearest_photons: config.k_nearest_photons,
            max_radius: config.max_radius,
            max_caustic_radius: config.max_caustic_radius,
            min_bounce_distance: 5.0 * config.max_radius,
            direct_visualization: config.direct_visualization,
            use_shadow_photons: config.use_shadow_photons,
            direct_map: LinearOctree::from(direct_map),
            indirect_map: LinearOctree::from(indirect_map),
            caustic_map: LinearOctree::from(caustic_map),
            shadow_map: LinearOctree::from(shadow_map),
        })
    }

    /// Returns the direct photon map.
    pub fn direct_map(&self) -> &LinearOctree<Photon> {
        &self.direct_map
    }

    /// Returns the indirect photon map.
    pub fn indirect_map(&self) -> &LinearOctree<Photon> {
        &self.indirect_map
    }

    /// Returns the caustic photon map.
    pub fn caustic_map(&self) -> &LinearOctree<Photon> {
        &self.caustic_map
    }

    /// Returns the shadow photon map.
    pub fn shadow_map(&self) -> &LinearOctree<ShadowPhoton> {
        &self.shadow_map
    }

    /// Density-estimate radiance from gathered photons. The kth neighbour
    /// bounds the gather disc; photons arriving from behind the surface are
    /// rejected.
    fn density_estimate(photons: &[SearchResult<Photon>], ia: &Interaction) -> Vector3f {
        let Some(farthest) = photons.last() else {
            return Vector3f::ZERO;
        };
        let r2 = farthest.distance2;
        if r2 <= 0.0 {
            return Vector3f::ZERO;
        }

        let mut radiance = Vector3f::ZERO;
        for p in photons {
            if p.data.direction.dot(&ia.cs.normal) >= 0.0 {
                continue;
            }
            radiance += p.data.flux * ia.brdf(&p.data.direction);
        }
        radiance / r2
    }

    /// Density-estimate radiance from the indirect map at a diffuse
    /// interaction.
    ///
    /// * `ia` - The interaction.
    pub fn estimate_indirect_radiance(&self, ia: &Interaction) -> Vector3f {
        let photons =
            self.indirect_map
                .knn_search(&ia.position, self.k_nearest_photons, self.max_radius);
        Self::density_estimate(&photons, ia)
    }

    /// Cone-filtered caustic estimate, sharper than the plain density
    /// estimate. The 3/r² factor normalises the cone kernel for `k = 1`.
    ///
    /// * `ia` - The interaction.
    pub fn estimate_caustic_radiance(&self, ia: &Interaction) -> Vector3f {
        let photons =
            self.caustic_map
                .knn_search(&ia.position, self.k_nearest_photons, self.max_caustic_radius);
        let Some(farthest) = photons.last() else {
            return Vector3f::ZERO;
        };
        let r2 = farthest.distance2;
        if r2 <= 0.0 {
            return Vector3f::ZERO;
        }

        let mut radiance = Vector3f::ZERO;
        for p in &photons {
            if p.data.direction.dot(&ia.cs.normal) >= 0.0 {
                continue;
            }
            let wp = max(0.0, 1.0 - (p.distance2 / r2).sqrt());
            radiance += p.data.flux * ia.brdf(&p.data.direction) * wp;
        }
        radiance * (3.0 / r2)
    }

    fn has_shadow_photons(&self, position: &Point3f) -> bool {
        self.use_shadow_photons && !self.shadow_map.radius_empty(position, self.max_radius)
    }
}

impl Integrator for PhotonMapper {
    fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Estimate incident radiance along a camera ray. The recursion
    /// `L = α + β·L_next` is affine in the tail radiance, so it is carried
    /// iteratively as an accumulated term and a running throughput.
    fn sample_ray(&self, ray: Ray, rng: &mut Rng) -> Vector3f {
        let mut accumulated = Vector3f::ZERO;
        let mut throughput = Vector3f::ONE;
        let mut ray = ray;
        let mut depth = 0;

        loop {
            if depth == self.settings.max_ray_depth {
                warn!("Bias introduced: max ray depth reached during radiance estimation");
                return accumulated;
            }

            let Some(isect) = self.scene.intersect(&ray) else {
                return accumulated + throughput * self.scene.sky_radiance(&ray);
            };

            let absorb = if depth > self.settings.min_ray_depth {
                1.0 - self.scene.material(isect.surface).reflect_probability
            } else {
                0.0
            };
            if rng.trial(absorb) {
                return accumulated;
            }
            let survive = 1.0 - absorb;

            let ia = Interaction::new(&self.scene, &isect, &ray, rng);

            // Emittance is only added where it is not already accounted for
            // by direct-light sampling or the photon maps.
            let emittance = if depth == 0 || ray.specular {
                ia.material.emittance
            } else {
                Vector3f::ZERO
            };
            let arrived_diffuse = depth > 0 && !ray.specular;

            if ia.scatter != ScatterType::Diffuse {
                if arrived_diffuse {
                    return accumulated + throughput * emittance / survive;
                }
                let (new_ray, _) = if ia.scatter == ScatterType::Reflect {
                    Ray::reflect_specular(&ray.direction, &ia)
                } else {
                    Ray::refract_specular(&ray.direction, &ia)
                };
                let brdf = ia.brdf(&new_ray.direction);
                accumulated += throughput * emittance / survive;
                throughput = throughput * brdf / survive;
                ray = new_ray;
                depth += 1;
                continue;
            }

            let caustics = self.estimate_caustic_radiance(&ia);

            let mut continue_path = !self.direct_visualization
                && (depth == 0 || ray.specular || isect.t >= self.min_bounce_distance);

            if !continue_path {
                let indirect_photons = self.indirect_map.knn_search(
                    &ia.position,
                    self.k_nearest_photons,
                    self.max_radius,
                );
                if indirect_photons.len() < self.k_nearest_photons {
                    // Underfilled neighbourhood; the density estimate is
                    // unreliable here.
                    continue_path = true;
                } else {
                    let direct_photons = self.direct_map.knn_search(
                        &ia.position,
                        self.k_nearest_photons,
                        self.max_radius,
                    );
                    if direct_photons.is_empty() && !self.has_shadow_photons(&ia.position) {
                        continue_path = true;
                    } else {
                        let direct = Self::density_estimate(&direct_photons, &ia);
                        let indirect = Self::density_estimate(&indirect_photons, &ia);
                        return accumulated
                            + throughput * (emittance + caustics + direct + indirect) / survive;
                    }
                }
            }

            debug_assert!(continue_path);

            let direct = if self.use_shadow_photons
                && self.has_shadow_photons(&ia.position)
                && self.direct_map.radius_empty(&ia.position, self.max_radius)
            {
                Vector3f::ZERO
            } else {
                sample_direct(&self.scene, &ia, rng)
            };

            let new_ray = Ray::reflect_diffuse(&ia, rng);
            // Cosine-weighted sampling absorbs the cos/π factor; the π here
            // restores the convention the tracer stores flux in.
            let brdf = ia.brdf(&new_ray.direction) * PI;

            accumulated += throughput * (emittance + caustics + direct * brdf) / survive;
            throughput = throughput * brdf / survive;
            ray = new_ray;
            depth += 1;
        }
    }
}

impl<'t> Tracer<'t> {
    /// Trace one emitted particle through the scene, storing photons at
    /// diffuse hits according to the path-history classification.
    ///
    /// * `ray`   - The emission ray.
    /// * `flux`  - Radiant power carried by the particle.
    /// * `batch` - The worker's photon storage.
    /// * `rng`   - The worker's random number generator.
    fn emit(&self, ray: Ray, flux: Vector3f, batch: &mut PhotonBatch, rng: &mut Rng) {
        let mut ray = ray;
        let mut flux = flux;
        let mut depth = 0;

        loop {
            if depth == self.max_ray_depth {
                warn!("Bias introduced: max ray depth reached during photon emission");
                return;
            }

            let Some(isect) = self.scene.intersect(&ray) else {
                return;
            };
            let ia = Interaction::new(self.scene, &isect, &ray, rng);

            let new_ray;
            let brdf;
            match ia.scatter {
                ScatterType::Reflect => {
                    if depth == 0 && rng.trial(self.non_caustic_reject) {
                        self.create_shadow_photons(
                            Ray::new(ia.position - ia.normal * EPSILON, ray.direction, ray.medium_ior),
                            batch,
                        );
                    }
                    let (r, _) = Ray::reflect_specular(&ray.direction, &ia);
                    brdf = ia.brdf(&r.direction);
                    new_ray = r;
                }
                ScatterType::Refract => {
                    let (r, _) = Ray::refract_specular(&ray.direction, &ia);
                    brdf = ia.brdf(&r.direction);
                    new_ray = r;
                }
                ScatterType::Diffuse => {
                    if depth == 0 {
                        if rng.trial(self.non_caustic_reject) {
                            batch.direct.push(Photon::new(
                                flux / self.non_caustic_reject,
                                ia.position,
                                ray.direction,
                            ));
                            self.create_shadow_photons(
                                Ray::new(
                                    ia.position - ia.normal * EPSILON,
                                    ray.direction,
                                    ray.medium_ior,
                                ),
                                batch,
                            );
                        }
                    } else if ray.specular {
                        // The path prefix is specular-only: S*D.
                        batch
                            .caustic
                            .push(Photon::new(flux, ia.position, ray.direction));
                    } else if rng.trial(self.non_caustic_reject) {
                        batch.indirect.push(Photon::new(
                            flux / self.non_caustic_reject,
                            ia.position,
                            ray.direction,
                        ));
                    }
                    let r = Ray::reflect_diffuse(&ia, rng);
                    brdf = ia.brdf(&r.direction) * PI;
                    new_ray = r;
                }
            }

            let new_flux = flux * brdf;
            let survive = min(
                if depth > self.min_ray_depth { 0.9 } else { 1.0 },
                new_flux.max_component() / flux.max_component(),
            );
            if !rng.trial(survive) {
                return;
            }

            flux = new_flux / survive;
            ray = new_ray;
            depth += 1;
        }
    }

    /// Push a ray through a surface and mark every diffusely-reflective
    /// surface behind it with a shadow photon.
    ///
    /// * `ray`   - Ray starting just behind the originating surface.
    /// * `batch` - The worker's photon storage.
    fn create_shadow_photons(&self, ray: Ray, batch: &mut PhotonBatch) {
        if !self.use_shadow_photons {
            return;
        }

        let mut ray = ray;
        let mut depth = 0;
        while depth <= self.max_ray_depth {
            let Some(isect) = self.scene.intersect(&ray) else {
                return;
            };
            let position = ray.at(isect.t);

            if self.scene.material(isect.surface).can_diffusely_reflect() {
                batch.shadow.push(ShadowPhoton { position });
            }

            let mut normal = self.scene.surfaces[isect.surface].normal(&position);
            if normal.dot(&ray.direction) > 0.0 {
                normal = -normal;
            }
            ray = Ray::new(position - normal * EPSILON, ray.direction, ray.medium_ior);
            depth += 1;
        }
    }
}

/// Split the emission budget over the emitters in proportion to their total
/// flux, packaged as shuffled fixed-size chunks.
///
/// * `scene`     - The scene.
/// * `emissions` - Total number of emissions, after caustic scaling.
fn emission_work(scene: &Scene, emissions: usize) -> Vec<EmissionWork> {
    let total_flux: Float = scene
        .emissives
        .iter()
        .map(|&i| (scene.material(i).emittance * scene.surfaces[i].area()).component_sum())
        .sum();
    if total_flux <= 0.0 {
        return Vec::new();
    }

    let mut work = Vec::new();
    for &light in &scene.emissives {
        let light_flux = scene.material(light).emittance * scene.surfaces[light].area();
        let share = light_flux.component_sum() / total_flux;
        let count = (emissions as Float * share).round() as usize;
        if count == 0 {
            continue;
        }
        let flux = light_flux / count as Float;

        let mut emitted = 0;
        while emitted != count {
            let num_emissions = min(EPW, count - emitted);
            work.push(EmissionWork {
                light,
                num_emissions,
                flux,
            });
            emitted += num_emissions;
        }
    }
    work
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
