//! Rendering circuits to images.

pub mod grid;
pub mod renderer;

pub use grid::PixelGrid;
pub use renderer::{features, render_pixel, sample_points, Renderer};
