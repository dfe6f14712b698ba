//! Monte Carlo renderer.
//!
//! Every pixel averages `samples` evaluations at stratified, jittered points
//! inside its cell. Rows render in parallel, each with its own circuit clone
//! and a random stream derived from the render seed, so the image does not
//! depend on thread scheduling.

use crate::grid::PixelGrid;
use evoimg_core::{Color, PixelRect, RenderConfig, Result};
use evoimg_ir::Circuit;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::{debug, instrument};

/// Entry inputs for the point `(x, y)`: position, distance to the center and
/// angle around it scaled to [0,1].
pub fn features(x: f64, y: f64) -> [f64; 4] {
    let (dx, dy) = (x - 0.5, y - 0.5);
    let r = (dx * dx + dy * dy).sqrt();
    let t = dy.atan2(dx) / (2.0 * PI) + 0.5;
    [x, y, r, t]
}

/// `samples` points inside `rect`: one jittered point per stratum on each
/// axis, with the two axes shuffled independently.
pub fn sample_points<R: Rng + ?Sized>(rect: &PixelRect, samples: usize, rng: &mut R) -> Vec<(f64, f64)> {
    let n = samples as f64;
    let (xsz, ysz) = (rect.width() / n, rect.height() / n);
    let mut xs: Vec<f64> = (0..samples)
        .map(|i| rect.xlow + i as f64 * xsz + xsz * rng.gen::<f64>())
        .collect();
    let mut ys: Vec<f64> = (0..samples)
        .map(|i| rect.ylow + i as f64 * ysz + ysz * rng.gen::<f64>())
        .collect();
    xs.shuffle(rng);
    ys.shuffle(rng);
    xs.into_iter().zip(ys).collect()
}

/// Average color of the circuit over `rect`.
pub fn render_pixel<R: Rng + ?Sized>(
    circuit: &mut Circuit,
    rect: &PixelRect,
    samples: usize,
    rng: &mut R,
) -> Result<Color> {
    let mut color = Color::default();
    for (x, y) in sample_points(rect, samples, rng) {
        let out = circuit.eval(&features(x, y))?;
        color += Color::from_channels(&out);
    }
    Ok(color.divide(samples as f64))
}

pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Random stream for one row
    fn row_rng(&self, row: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(row as u64);
        rng
    }

    fn render_row(&self, circuit: &mut Circuit, y: usize, row: &mut [[u8; 3]]) -> Result<()> {
        let size = self.config.size;
        let mut rng = self.row_rng(y);
        for (x, pixel) in row.iter_mut().enumerate() {
            let rect = PixelRect::for_pixel(x, y, size, size);
            *pixel = render_pixel(circuit, &rect, self.config.samples, &mut rng)?.to_rgb8();
        }
        Ok(())
    }

    fn prepare(&self, circuit: &Circuit) -> Circuit {
        circuit.clone().with_noise_seed(self.config.noise_seed)
    }

    /// Render a `size`×`size` image, rows in parallel.
    #[instrument(level = "debug", skip_all, fields(size = self.config.size, samples = self.config.samples))]
    pub fn render(&self, circuit: &Circuit) -> Result<PixelGrid> {
        let base = self.prepare(circuit);
        let mut grid = PixelGrid::square(self.config.size);
        let width = self.config.size.max(1);
        grid.pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .try_for_each_init(
                || base.clone(),
                |circuit, (y, row)| self.render_row(circuit, y, row),
            )?;
        debug!("image rendered");
        Ok(grid)
    }

    /// Same image as [`Renderer::render`], on the calling thread.
    pub fn render_sequential(&self, circuit: &Circuit) -> Result<PixelGrid> {
        let mut circuit = self.prepare(circuit);
        let mut grid = PixelGrid::square(self.config.size);
        for (y, row) in grid.rows_mut().enumerate() {
            self.render_row(&mut circuit, y, row)?;
        }
        Ok(grid)
    }
}
