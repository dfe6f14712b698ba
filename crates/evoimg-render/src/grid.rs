//! Pixel grid holding a rendered image.

use serde::{Deserialize, Serialize};

/// Row-major 8-bit RGB pixels. `x` is the column, `y` the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelGrid {
    pub width: usize,
    pub height: usize,
    pixels: Vec<[u8; 3]>,
}

impl PixelGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 3]; width * height],
        }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        self.pixels[self.index(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let index = self.index(x, y);
        self.pixels[index] = rgb;
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Mutable rows, top to bottom
    pub fn rows_mut(&mut self) -> std::slice::ChunksMut<'_, [u8; 3]> {
        self.pixels.chunks_mut(self.width.max(1))
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [[u8; 3]] {
        &mut self.pixels
    }

    /// Iterator over `(x, y, rgb)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, [u8; 3])> + '_ {
        let width = self.width.max(1);
        self.pixels
            .iter()
            .enumerate()
            .map(move |(i, &rgb)| (i % width, i / width, rgb))
    }

    /// Packed `RGBRGB...` bytes, row by row
    pub fn to_raw(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut grid = PixelGrid::new(3, 2);
        grid.set(2, 1, [1, 2, 3]);
        assert_eq!(grid.get(2, 1), [1, 2, 3]);
        assert_eq!(grid.get(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_raw_is_row_major() {
        let mut grid = PixelGrid::new(2, 2);
        grid.set(1, 0, [10, 11, 12]);
        grid.set(0, 1, [20, 21, 22]);
        let raw = grid.to_raw();
        assert_eq!(raw.len(), 12);
        assert_eq!(&raw[3..6], &[10, 11, 12]);
        assert_eq!(&raw[6..9], &[20, 21, 22]);
    }

    #[test]
    fn test_iter_positions() {
        let grid = PixelGrid::new(3, 2);
        let positions: Vec<(usize, usize)> = grid.iter().map(|(x, y, _)| (x, y)).collect();
        assert_eq!(positions[4], (1, 1));
        assert_eq!(positions.len(), 6);
    }

    #[test]
    fn test_rows() {
        let mut grid = PixelGrid::square(4);
        assert_eq!(grid.rows_mut().count(), 4);
        for row in grid.rows_mut() {
            row[0] = [255, 0, 0];
        }
        assert_eq!(grid.get(0, 3), [255, 0, 0]);
    }
}
