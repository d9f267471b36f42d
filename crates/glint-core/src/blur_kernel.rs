//! Discretized Gaussian kernels for the separable blur.

use serde::{Deserialize, Serialize};

/// Number of taps in the default kernel.
pub const DEFAULT_KERNEL_SIZE: usize = 21;

/// Standard deviation of the default kernel, in taps.
pub const DEFAULT_SIGMA: f32 = 4.0;

/// Radius scale of the second pass in [`BlurQuality::TwoPass`] mode.
pub const SECOND_PASS_SCALE: f32 = 0.4;

/// Error function approximation (Abramowitz and Stegun 7.1.26, |error| < 1.5e-7).
#[must_use]
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let t = 1.0 / (1.0 + P * x.abs());
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    y.copysign(x)
}

/// Integral of the unit-area Gaussian from the center up to `x`.
fn gaussian_integral(x: f64, sigma: f64) -> f64 {
    0.5 * erf(x / (std::f64::consts::SQRT_2 * sigma))
}

/// A single kernel sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurTap {
    /// Offset from the center, in kernel steps.
    pub offset: f32,
    pub weight: f32,
}

/// An ordered, normalized set of symmetric blur taps.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurKernel {
    size: usize,
    sigma: f32,
    taps: Vec<BlurTap>,
}

impl BlurKernel {
    /// Builds a `size`-tap kernel by integrating a Gaussian of `sigma` over each tap's unit cell.
    ///
    /// `size` is clamped to at least one tap. Non-positive `sigma` yields an identity kernel.
    pub fn gaussian(size: usize, sigma: f32) -> Self {
        let size = size.max(1);
        if sigma.is_nan() || sigma <= 0.0 {
            let center = (size as f32 - 1.0) * 0.5;
            let taps = (0..size)
                .map(|i| BlurTap {
                    offset: i as f32 - center,
                    weight: if i == size / 2 { 1.0 } else { 0.0 },
                })
                .collect();
            return Self { size, sigma, taps };
        }

        let sigma_f64 = f64::from(sigma);
        let start = -0.5 * size as f64;
        let mut last = gaussian_integral(start, sigma_f64);
        let mut raw = Vec::with_capacity(size);
        for i in 1..=size {
            let next = gaussian_integral(start + i as f64, sigma_f64);
            raw.push(next - last);
            last = next;
        }

        let sum: f64 = raw.iter().sum();
        let center = (size as f64 - 1.0) * 0.5;
        let taps = raw
            .iter()
            .enumerate()
            .map(|(i, w)| BlurTap {
                offset: (i as f64 - center) as f32,
                weight: (w / sum) as f32,
            })
            .collect();

        Self { size, sigma, taps }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn taps(&self) -> &[BlurTap] {
        &self.taps
    }

    pub fn weight_sum(&self) -> f32 {
        self.taps.iter().map(|t| t.weight).sum()
    }

    /// Whether `gaussian(size, sigma)` would differ from this kernel.
    pub fn needs_rebuild(&self, size: usize, sigma: f32) -> bool {
        size.max(1) != self.size || sigma.to_bits() != self.sigma.to_bits()
    }
}

impl Default for BlurKernel {
    fn default() -> Self {
        Self::gaussian(DEFAULT_KERNEL_SIZE, DEFAULT_SIGMA)
    }
}

/// How many separable passes a blur runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlurQuality {
    /// One horizontal + vertical pass at the configured radius.
    Fast,
    /// A second pass at a reduced radius to suppress ringing.
    #[default]
    TwoPass,
}

impl BlurQuality {
    pub fn from_fast_flag(fast: bool) -> Self {
        if fast {
            Self::Fast
        } else {
            Self::TwoPass
        }
    }
}

/// Radii of the passes to run for a blur of `radius`. Empty when there is nothing to do.
pub fn blur_passes(radius: f32, quality: BlurQuality) -> Vec<f32> {
    if radius.is_nan() || radius <= 0.0 {
        return Vec::new();
    }
    match quality {
        BlurQuality::Fast => vec![radius],
        BlurQuality::TwoPass => vec![radius, radius * SECOND_PASS_SCALE],
    }
}
