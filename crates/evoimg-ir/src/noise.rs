//! Coherent 2D gradient noise for the `noise` operator.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::FRAC_1_SQRT_2;

const GRADIENTS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (0.0, 1.0),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (-1.0, 0.0),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    (0.0, -1.0),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// Perlin noise over a seeded permutation table.
///
/// Values lie in about [-0.71, 0.71] and are 0 on every integer lattice
/// point.
#[derive(Debug, Clone)]
pub struct Perlin {
    perm: [u8; 512],
    seed: u64,
}

impl Perlin {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm, seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn at(&self, x: f64, y: f64) -> f64 {
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let xi = (x0 as i64 & 255) as usize;
        let yi = (y0 as i64 & 255) as usize;

        let p = &self.perm;
        let aa = p[p[xi] as usize + yi];
        let ab = p[p[xi] as usize + yi + 1];
        let ba = p[p[xi + 1] as usize + yi];
        let bb = p[p[xi + 1] as usize + yi + 1];

        let u = fade(fx);
        let v = fade(fy);

        let bottom = lerp(u, gradient(aa, fx, fy), gradient(ba, fx - 1.0, fy));
        let top = lerp(u, gradient(ab, fx, fy - 1.0), gradient(bb, fx - 1.0, fy - 1.0));
        lerp(v, bottom, top)
    }
}

impl Default for Perlin {
    fn default() -> Self {
        Self::new(0)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn gradient(hash: u8, x: f64, y: f64) -> f64 {
    let (gx, gy) = GRADIENTS[(hash & 7) as usize];
    gx * x + gy * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_on_lattice() {
        let noise = Perlin::new(7);
        for i in -3..3 {
            for j in -3..3 {
                assert_eq!(noise.at(i as f64, j as f64), 0.0);
            }
        }
    }

    #[test]
    fn test_bounded_and_deterministic() {
        let a = Perlin::new(42);
        let b = Perlin::new(42);
        for k in 0..500 {
            let x = k as f64 * 0.137;
            let y = k as f64 * 0.071 - 3.0;
            let v = a.at(x, y);
            assert!(v.abs() <= 0.75, "noise out of range: {}", v);
            assert_eq!(v, b.at(x, y));
        }
    }

    #[test]
    fn test_seed_changes_field() {
        let a = Perlin::new(1);
        let b = Perlin::new(2);
        let differs = (0..100).any(|k| {
            let x = 0.31 + k as f64 * 0.53;
            a.at(x, x * 0.7) != b.at(x, x * 0.7)
        });
        assert!(differs);
    }

    #[test]
    fn test_non_finite_input_does_not_panic() {
        let noise = Perlin::default();
        assert!(noise.at(f64::NAN, 0.5).is_nan());
        let _ = noise.at(f64::INFINITY, f64::NEG_INFINITY);
    }
}
