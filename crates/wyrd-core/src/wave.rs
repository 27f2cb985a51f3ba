//! Continuous-wave generators that steer threading and treadling.
//!
//! Each channel sums two sines and one smoothed gradient-noise signal, then the
//! result is remapped onto the shaft range.

use serde::{Deserialize, Serialize};

/// Permutation table from Ken Perlin's reference implementation.
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline]
fn perm(x: i32) -> u8 {
    PERM[(x & 255) as usize]
}

#[inline]
fn grad(hash: u8, x: f32) -> f32 {
    // Eight magnitudes in (0, 1], signed by bit 3.
    let magnitude = f32::from((hash & 7) + 1) / 8.0;
    if hash & 8 != 0 { -magnitude * x } else { magnitude * x }
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// 1D gradient noise returning values in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perlin1D;

impl Perlin1D {
    #[must_use]
    pub fn sample(self, x: f32) -> f32 {
        if !x.is_finite() {
            return 0.5;
        }
        let floor = x.floor();
        let xi = floor as i32;
        let xf = x - floor;
        let u = fade(xf);

        let a = perm(xi);
        let b = perm(xi.wrapping_add(1));

        (lerp(grad(a, xf), grad(b, xf - 1.0), u) + 0.5).clamp(0.0, 1.0)
    }

    /// Sample remapped onto [-1, 1].
    #[must_use]
    pub fn sample_signed(self, x: f32) -> f32 {
        self.sample(x) * 2.0 - 1.0
    }
}

/// Angular frequencies for one wave channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WaveSettings {
    /// Angular frequency of the first sine.
    pub sin_a: f32,
    /// Angular frequency of the second sine.
    pub sin_b: f32,
    /// Rate at which the noise channel is traversed.
    pub noise_rate: f32,
}

impl WaveSettings {
    /// Frequencies used for the threading wave.
    pub const THREADING: Self = Self {
        sin_a: 6.1,
        sin_b: 3.1,
        noise_rate: 1.1,
    };

    /// Frequencies used for the treadling wave.
    pub const TREADLING: Self = Self {
        sin_a: 3.1,
        sin_b: 4.1,
        noise_rate: 2.1,
    };

    pub(crate) fn is_finite(&self) -> bool {
        self.sin_a.is_finite() && self.sin_b.is_finite() && self.noise_rate.is_finite()
    }
}

/// A configured wave source with its own noise offset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WaveChannel {
    settings: WaveSettings,
    noise_seed: f32,
    noise: Perlin1D,
}

impl WaveChannel {
    #[must_use]
    pub fn new(settings: WaveSettings, noise_seed: f32) -> Self {
        Self {
            settings,
            noise_seed,
            noise: Perlin1D,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> WaveSettings {
        self.settings
    }

    #[must_use]
    pub const fn noise_seed(&self) -> f32 {
        self.noise_seed
    }

    /// Raw summed signal at time `t`, nominally within [-3, 3].
    #[must_use]
    pub fn sample(&self, t: f32) -> f32 {
        let noise = self
            .noise
            .sample_signed(t * self.settings.noise_rate + self.noise_seed);
        (t * self.settings.sin_a).sin() + (t * self.settings.sin_b).sin() + noise
    }

    /// Map the signal from [-1, 1] onto `[0, num_shafts)` as a shaft index.
    ///
    /// Values outside [-1, 1] saturate at the first or last shaft.
    #[must_use]
    pub fn shaft_index(&self, t: f32, num_shafts: usize) -> usize {
        remap_to_shaft(self.sample(t), num_shafts)
    }
}

pub(crate) fn remap_to_shaft(signal: f32, num_shafts: usize) -> usize {
    if num_shafts == 0 {
        return 0;
    }
    let max = num_shafts as f32;
    let mapped = (signal + 1.0) * 0.5 * max;
    if mapped.is_nan() {
        return 0;
    }
    mapped.clamp(0.0, max - 1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_stays_in_unit_range() {
        let noise = Perlin1D;
        for step in 0..2_000 {
            let x = step as f32 * 0.037 - 20.0;
            let value = noise.sample(x);
            assert!((0.0..=1.0).contains(&value), "x={x} value={value}");
        }
    }

    #[test]
    fn noise_is_smooth_and_deterministic() {
        let noise = Perlin1D;
        assert_eq!(noise.sample(3.25), noise.sample(3.25));
        for step in 0..500 {
            let x = step as f32 * 0.01;
            let delta = (noise.sample(x + 0.001) - noise.sample(x)).abs();
            assert!(delta < 0.01, "jump of {delta} at {x}");
        }
    }

    #[test]
    fn noise_is_centred_on_lattice_points() {
        let noise = Perlin1D;
        for xi in -5..5 {
            assert!((noise.sample(xi as f32) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn remap_saturates() {
        assert_eq!(remap_to_shaft(-5.0, 4), 0);
        assert_eq!(remap_to_shaft(-1.0, 4), 0);
        assert_eq!(remap_to_shaft(0.0, 4), 2);
        assert_eq!(remap_to_shaft(1.0, 4), 3);
        assert_eq!(remap_to_shaft(7.0, 4), 3);
        assert_eq!(remap_to_shaft(f32::NAN, 4), 0);
    }

    #[test]
    fn shaft_index_is_always_valid() {
        let channel = WaveChannel::new(WaveSettings::TREADLING, 1234.5);
        for step in 0..1_000 {
            let t = step as f32 * 0.1;
            assert!(channel.shaft_index(t, 5) < 5);
        }
    }
}
