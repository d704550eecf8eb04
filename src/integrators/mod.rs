//! Integrators.

mod photon_mapper;

// Re-export
pub use photon_mapper::*;

use crate::core::camera::Camera;
use crate::core::common::*;
use crate::core::film::{Film, FilmTile};
use crate::core::geometry::{Ray, Vector3f};
use crate::core::interaction::Interaction;
use crate::core::parallel::{create_progress_bar, WorkQueue};
use crate::core::rng::Rng;
use crate::core::scene::Scene;
use serde::Deserialize;

/// Side length of the square pixel tiles handed to render workers.
const TILE_SIZE: usize = 32;

/// Settings shared by integrators.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    /// Hard recursion cap; reaching it terminates a path and introduces
    /// bias.
    pub max_ray_depth: usize,

    /// Depth after which Russian roulette may terminate paths.
    pub min_ray_depth: usize,

    /// Fixed RNG seed. When absent, every run seeds from entropy.
    pub seed: Option<u64>,

    /// Worker pool size; zero selects the number of hardware cores.
    #[serde(skip)]
    pub num_threads: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_ray_depth: 64,
            min_ray_depth: 3,
            seed: None,
            num_threads: 0,
        }
    }
}

impl RenderSettings {
    /// Returns the worker pool size.
    pub fn threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            self.num_threads
        }
    }

    /// Returns the generator for a worker. With a fixed seed each stream
    /// index is deterministic; otherwise streams are seeded from entropy.
    ///
    /// * `stream` - Stream index, unique per worker per pass.
    pub fn rng_for(&self, stream: u64) -> Rng {
        match self.seed {
            Some(seed) => Rng::new(seed.wrapping_add(stream)),
            None => Rng::from_entropy(),
        }
    }
}

/// An integrator estimates radiance along camera rays against a fixed scene.
pub trait Integrator: Send + Sync {
    /// Returns the shared settings.
    fn settings(&self) -> &RenderSettings;

    /// Returns the scene.
    fn scene(&self) -> &Scene;

    /// Returns the incident radiance at the origin of a camera ray.
    ///
    /// * `ray` - The camera ray.
    /// * `rng` - The worker's random number generator.
    fn sample_ray(&self, ray: Ray, rng: &mut Rng) -> Vector3f;

    /// Render the scene into a film. Workers render disjoint pixel tiles
    /// against read-only integrator state.
    ///
    /// * `camera` - The camera.
    /// * `film`   - The film to accumulate into.
    /// * `quiet`  - Suppress the progress bar.
    fn render(&self, camera: &Camera, film: &mut Film, quiet: bool) {
        let mut tiles = Vec::new();
        let mut y = 0;
        while y < camera.height {
            let mut x = 0;
            while x < camera.width {
                tiles.push((x, y, min(TILE_SIZE, camera.width - x), min(TILE_SIZE, camera.height - y)));
                x += TILE_SIZE;
            }
            y += TILE_SIZE;
        }

        let tile_count = tiles.len();
        let queue = WorkQueue::new(tiles);
        let progress = create_progress_bar(tile_count as u64, "Rendering", quiet);
        let (tile_tx, tile_rx) = crossbeam_channel::unbounded::<FilmTile>();

        info!(
            "Rendering {}x{} pixels in {} tiles on {} threads",
            camera.width,
            camera.height,
            tile_count,
            self.settings().threads()
        );

        crossbeam::scope(|scope| {
            for worker in 0..self.settings().threads() {
                let queue = queue.clone();
                let tile_tx = tile_tx.clone();
                let mut rng = self.settings().rng_for(0x52454e44 + worker as u64);
                scope.spawn(move |_| {
                    while let Some((x0, y0, width, height)) = queue.pop() {
                        tile_tx
                            .send(self.render_tile(camera, x0, y0, width, height, &mut rng))
                            .unwrap();
                    }
                });
            }
            drop(tile_tx);

            for tile in tile_rx.iter() {
                film.merge_tile(&tile);
                progress.inc(1);
            }
        })
        .unwrap();

        progress.finish_with_message("Render complete");
    }

    /// Render one pixel tile.
    ///
    /// * `camera` - The camera.
    /// * `x0`     - First pixel column of the tile.
    /// * `y0`     - First pixel row of the tile.
    /// * `width`  - Tile width in pixels.
    /// * `height` - Tile height in pixels.
    /// * `rng`    - The worker's random number generator.
    fn render_tile(
        &self,
        camera: &Camera,
        x0: usize,
        y0: usize,
        width: usize,
        height: usize,
        rng: &mut Rng,
    ) -> FilmTile {
        let spp = camera.samples_per_pixel.max(1);
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let mut radiance = Vector3f::ZERO;
                for _ in 0..spp {
                    let ray = camera.primary_ray(x0 + col, y0 + row, self.scene().ior, rng);
                    let sample = self.sample_ray(ray, rng);
                    if sample.has_nans() {
                        error!(
                            "Not-a-number radiance at pixel ({}, {}); setting to black",
                            x0 + col,
                            y0 + row
                        );
                        continue;
                    }
                    radiance += sample;
                }
                pixels.push(radiance / spp as Float);
            }
        }
        FilmTile {
            x0,
            y0,
            width,
            height,
            pixels,
        }
    }
}

/// Estimate direct illumination at a diffuse interaction by next-event
/// estimation: sample a point on each emitter, test visibility, and weight
/// by the geometric coupling over the area pdf.
///
/// * `scene` - The scene.
/// * `ia`    - The interaction.
/// * `rng`   - The worker's random number generator.
pub fn sample_direct(scene: &Scene, ia: &Interaction, rng: &mut Rng) -> Vector3f {
    let mut radiance = Vector3f::ZERO;

    for &light_index in &scene.emissives {
        let light = &scene.surfaces[light_index];
        let x = light.point(rng.uniform_float(), rng.uniform_float());

        let to_light = x - ia.position;
        let distance2 = to_light.length_squared();
        if distance2 < 1e-12 {
            continue;
        }
        let wi = to_light / distance2.sqrt();

        let cos_surface = ia.shading_normal.dot(&wi);
        if cos_surface <= 0.0 {
            continue;
        }
        let cos_light = -light.normal(&x).dot(&wi);
        if cos_light <= 0.0 {
            continue;
        }

        let shadow_ray = Ray::new(ia.position + ia.normal * EPSILON, wi, ia.n1);
        let visible = scene
            .intersect(&shadow_ray)
            .map_or(false, |hit| hit.surface == light_index);
        if !visible {
            continue;
        }

        let emittance = scene.material(light_index).emittance;
        radiance += emittance * (cos_surface * cos_light * light.area() / (PI * distance2));
    }

    radiance
}
