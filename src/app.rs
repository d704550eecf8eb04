//! Application related stuff

use clap::Parser;

lazy_static! {
    /// The global application options.
    pub static ref OPTIONS: Options = Options::parse();
}

/// System wide options.
#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Number of threads to use for rendering.
    #[arg(
        long = "nthreads",
        short = 't',
        value_name = "NUM",
        default_value_t = 0,
        help = "Use specified number of threads for rendering (0 = all hardware cores)."
    )]
    pub n_threads: usize,

    /// Suppress all text output other than error messages.
    #[arg(long, help = "Suppress all text output other than error messages.")]
    pub quiet: bool,

    /// Path to the output image file.
    #[arg(
        long = "outfile",
        short = 'o',
        value_name = "FILE",
        default_value = "render.png",
        help = "Write the final image to the given filename."
    )]
    pub image_file: String,

    /// Linear exposure scale applied before gamma correction.
    #[arg(
        long,
        short = 'e',
        value_name = "FLOAT",
        default_value_t = 1.0,
        help = "Exposure scale applied to the image."
    )]
    pub exposure: f64,

    /// Path to the scene file.
    #[arg(value_name = "SCENE", help = "Scene description file")]
    pub scene: String,
}
