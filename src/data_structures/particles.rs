//! Randomised point clouds for ambient backgrounds.
//!
//! A [`ParticleBuffer`] is a flat position array and a parallel colour array,
//! three floats per particle each. Positions are drawn by a
//! [`PositionSampler`]; two strategies are provided:
//!
//! - [`RejectionSampler`] picks points in the unit cube until one lands in the
//!   unit ball (rejecting the zero vector, which cannot be normalised) and
//!   rescales it to a random radius in `(0, radius]`.
//! - [`SphericalSampler`] draws spherical coordinates directly.
//!
//! Whatever a sampler returns, non-finite components never reach the buffer:
//! they are replaced by `0.0`. If the primary strategy fails, generation
//! restarts with the spherical strategy at a smaller particle count.

use std::{f32::consts::PI, fmt};

use cgmath::{InnerSpace, Vector3};
use rand::{Rng, RngCore};

use crate::data_structures::shape::Color;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleBuffer {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
}

impl ParticleBuffer {
    pub fn with_capacity(count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(count * 3),
            colors: Vec::with_capacity(count * 3),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, idx: usize) -> Option<Vector3<f32>> {
        self.positions
            .get(idx * 3..idx * 3 + 3)
            .map(|p| Vector3::new(p[0], p[1], p[2]))
    }

    pub fn color(&self, idx: usize) -> Option<Color> {
        self.colors
            .get(idx * 3..idx * 3 + 3)
            .map(|c| Color::new(c[0], c[1], c[2]))
    }

    fn push(&mut self, position: Vector3<f32>, color: Color) {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        self.positions
            .extend_from_slice(&[finite(position.x), finite(position.y), finite(position.z)]);
        self.colors
            .extend_from_slice(&[finite(color.r), finite(color.g), finite(color.b)]);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParticleError {
    /// Rejection sampling did not find a usable point within its budget.
    SamplingExhausted { attempts: u32 },
    /// A sampler refused to produce a point.
    Sampler(String),
}

impl fmt::Display for ParticleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticleError::SamplingExhausted { attempts } => {
                write!(f, "no point inside the unit sphere after {} attempts", attempts)
            }
            ParticleError::Sampler(msg) => write!(f, "sampler failed: {}", msg),
        }
    }
}

impl std::error::Error for ParticleError {}

/// Source of particle positions.
pub trait PositionSampler {
    fn sample(&mut self, rng: &mut dyn RngCore, radius: f32) -> Result<Vector3<f32>, ParticleError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RejectionSampler {
    pub max_attempts: u32,
    /// Place every particle on the sphere surface instead of inside the ball.
    pub shell: bool,
}

impl Default for RejectionSampler {
    fn default() -> Self {
        Self {
            max_attempts: 64,
            shell: false,
        }
    }
}

impl PositionSampler for RejectionSampler {
    fn sample(&mut self, rng: &mut dyn RngCore, radius: f32) -> Result<Vector3<f32>, ParticleError> {
        for _ in 0..self.max_attempts {
            let candidate = Vector3::new(
                (rng.random::<f32>() - 0.5) * 2.0,
                (rng.random::<f32>() - 0.5) * 2.0,
                (rng.random::<f32>() - 0.5) * 2.0,
            );
            let length = candidate.magnitude();
            if length == 0.0 || length > 1.0 || !length.is_finite() {
                continue;
            }
            let r = if self.shell {
                radius
            } else {
                radius_in(rng, radius)
            };
            return Ok(candidate / length * r);
        }
        Err(ParticleError::SamplingExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Random radius in `(0, radius]`, so the origin is never produced.
fn radius_in(rng: &mut dyn RngCore, radius: f32) -> f32 {
    (1.0 - rng.random::<f32>()) * radius
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SphericalSampler {
    pub shell: bool,
}

impl PositionSampler for SphericalSampler {
    fn sample(&mut self, rng: &mut dyn RngCore, radius: f32) -> Result<Vector3<f32>, ParticleError> {
        let theta = rng.random::<f32>() * PI * 2.0;
        let phi = (2.0 * rng.random::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
        let r = if self.shell {
            radius
        } else {
            radius_in(rng, radius)
        };
        Ok(Vector3::new(
            r * phi.sin() * theta.cos(),
            r * phi.sin() * theta.sin(),
            r * phi.cos(),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SamplingStrategy {
    Rejection,
    Spherical,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColorMode {
    Uniform(Color),
    /// Base colour scaled by a random intensity in `[min, 1]`.
    Jitter { base: Color, min: f32 },
    /// Random blend between two colours.
    Gradient { from: Color, to: Color },
}

impl ColorMode {
    fn pick(&self, rng: &mut dyn RngCore) -> Color {
        match *self {
            ColorMode::Uniform(color) => color,
            ColorMode::Jitter { base, min } => {
                let min = min.clamp(0.0, 1.0);
                base.scaled(min + rng.random::<f32>() * (1.0 - min))
            }
            ColorMode::Gradient { from, to } => from.lerp(to, rng.random::<f32>()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleFieldConfig {
    pub count: usize,
    pub radius: f32,
    pub strategy: SamplingStrategy,
    pub shell: bool,
    pub color: ColorMode,
    /// Particle count used when the primary strategy fails.
    pub fallback_count: usize,
    pub size: f32,
    pub opacity: f32,
    pub additive: bool,
}

impl ParticleFieldConfig {
    pub fn new(count: usize, radius: f32, strategy: SamplingStrategy, color: ColorMode) -> Self {
        Self {
            count,
            radius,
            strategy,
            shell: false,
            color,
            fallback_count: count.min(500),
            size: 0.02,
            opacity: 0.6,
            additive: true,
        }
    }
}

/// Generate a field with the configured strategy, falling back to spherical
/// sampling at `fallback_count` particles if it fails.
pub fn generate(config: &ParticleFieldConfig, rng: &mut dyn RngCore) -> ParticleBuffer {
    let mut fallback = SphericalSampler {
        shell: config.shell,
    };
    match config.strategy {
        SamplingStrategy::Rejection => {
            let mut primary = RejectionSampler {
                shell: config.shell,
                ..Default::default()
            };
            generate_with(config, &mut primary, &mut fallback, rng)
        }
        SamplingStrategy::Spherical => {
            let mut primary = SphericalSampler {
                shell: config.shell,
            };
            generate_with(config, &mut primary, &mut fallback, rng)
        }
    }
}

pub fn generate_with(
    config: &ParticleFieldConfig,
    primary: &mut dyn PositionSampler,
    fallback: &mut dyn PositionSampler,
    rng: &mut dyn RngCore,
) -> ParticleBuffer {
    match fill(config.count, config, primary, rng) {
        Ok(buffer) => {
            log::debug!("generated {} particles", buffer.len());
            buffer
        }
        Err(e) => {
            log::warn!(
                "particle generation failed ({}), retrying with {} particles",
                e,
                config.fallback_count
            );
            // The fallback never aborts: a failed sample degrades to the origin.
            let mut buffer = ParticleBuffer::with_capacity(config.fallback_count);
            for _ in 0..config.fallback_count {
                let position = fallback
                    .sample(rng, config.radius)
                    .unwrap_or_else(|_| Vector3::new(0.0, 0.0, 0.0));
                let color = config.color.pick(rng);
                buffer.push(position, color);
            }
            buffer
        }
    }
}

fn fill(
    count: usize,
    config: &ParticleFieldConfig,
    sampler: &mut dyn PositionSampler,
    rng: &mut dyn RngCore,
) -> Result<ParticleBuffer, ParticleError> {
    let mut buffer = ParticleBuffer::with_capacity(count);
    for _ in 0..count {
        let position = sampler.sample(rng, config.radius)?;
        let color = config.color.pick(rng);
        buffer.push(position, color);
    }
    Ok(buffer)
}
