use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of independent uniform draws in `(0, 1)`.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

/// Uniform draws from a seeded `StdRng`.
pub struct SeededUniforms {
    rng: StdRng,
}

impl SeededUniforms {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl UniformSource for SeededUniforms {
    fn next_uniform(&mut self) -> f64 {
        // ln(0) is undefined for the Box-Muller radius.
        self.rng.r#gen::<f64>().max(1e-12)
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedUniforms {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedUniforms {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl UniformSource for ScriptedUniforms {
    fn next_uniform(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}

/// Draws one year's rate of return as a fraction.
///
/// The draw is normal with mean `mean_percent / 100` and standard deviation
/// `(variance_percent / 2) / 100`, produced with the Box-Muller cosine form
/// from two uniforms. The result is not clamped.
pub fn sample_return<S: UniformSource + ?Sized>(
    mean_percent: f64,
    variance_percent: f64,
    source: &mut S,
) -> f64 {
    let standard_deviation = variance_percent / 2.0;
    let u1 = source.next_uniform();
    let u2 = source.next_uniform();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    (mean_percent + z * standard_deviation) / 100.0
}

pub(crate) fn derive_seed(base_seed: u64, trial_id: u32) -> u64 {
    splitmix64(base_seed ^ ((trial_id as u64) << 17) ^ trial_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
