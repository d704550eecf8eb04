#[macro_use]
extern crate log;

use lumen::app::OPTIONS;
use lumen::core::film::Film;
use lumen::integrators::{Integrator, PhotonMapper};
use lumen::parser;

fn main() {
    env_logger::init();

    if let Err(e) = render() {
        error!("{e}");
        std::process::exit(1);
    }
}

fn render() -> Result<(), String> {
    let description = parser::load_scene(&OPTIONS.scene, OPTIONS.n_threads)?;

    // Pass 1: emit photons and freeze the maps.
    let integrator = PhotonMapper::new(
        &description.photon_map,
        description.settings,
        description.scene,
        OPTIONS.quiet,
    )?;

    // Pass 2: estimate radiance per camera sample.
    let mut film = Film::new(description.camera.width, description.camera.height);
    integrator.render(&description.camera, &mut film, OPTIONS.quiet);

    film.write_png(&OPTIONS.image_file, OPTIONS.exposure)?;
    info!("Wrote {}", OPTIONS.image_file);
    Ok(())
}
