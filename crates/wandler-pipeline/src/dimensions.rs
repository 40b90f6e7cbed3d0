// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dimension policy: clamp output sizes to a bound while keeping the aspect
// ratio. Pure arithmetic, no image data involved.

use wandler_core::Dimensions;

/// Default longest edge for any produced raster.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Aspect-preserving size clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionPolicy {
    max_dimension: u32,
}

impl Default for DimensionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl DimensionPolicy {
    /// A bound of zero is treated as one.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Clamp `(width, height)` so neither side exceeds the bound.
    ///
    /// Sizes already inside the bound come back unchanged. Otherwise the
    /// longer side (width on ties) is pinned to the bound and the other side
    /// is scaled and rounded, never below one pixel.
    ///
    /// ```
    /// # use wandler_pipeline::DimensionPolicy;
    /// let dims = DimensionPolicy::default().clamp(4000, 1000);
    /// assert_eq!((dims.width, dims.height), (2048, 512));
    /// ```
    pub fn clamp(&self, width: u32, height: u32) -> Dimensions {
        let width = width.max(1);
        let height = height.max(1);
        let bound = self.max_dimension;

        if width <= bound && height <= bound {
            return Dimensions { width, height };
        }

        let aspect = width as f64 / height as f64;
        if width >= height {
            Dimensions {
                width: bound,
                height: scaled_side(bound as f64 / aspect, bound),
            }
        } else {
            Dimensions {
                width: scaled_side(bound as f64 * aspect, bound),
                height: bound,
            }
        }
    }
}

/// Clamp with the default 2048 px bound.
pub fn clamp(width: u32, height: u32) -> Dimensions {
    DimensionPolicy::default().clamp(width, height)
}

fn scaled_side(exact: f64, bound: u32) -> u32 {
    (exact.round() as u32).clamp(1, bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic spread of sizes from tiny to huge, both orientations.
    fn sample_sizes() -> Vec<(u32, u32)> {
        let mut sizes = Vec::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let w = (seed % 20_000) as u32 + 1;
            let h = ((seed >> 24) % 20_000) as u32 + 1;
            sizes.push((w, h));
        }
        sizes.extend([(1, 1), (2048, 2048), (2049, 1), (1, 2049), (30_000, 30_000)]);
        sizes
    }

    #[test]
    fn inside_bound_is_unchanged() {
        assert_eq!(clamp(800, 600), Dimensions { width: 800, height: 600 });
        assert_eq!(clamp(2048, 2048), Dimensions { width: 2048, height: 2048 });
    }

    #[test]
    fn wide_image_pins_width() {
        assert_eq!(clamp(4000, 1000), Dimensions { width: 2048, height: 512 });
    }

    #[test]
    fn tall_image_pins_height() {
        assert_eq!(clamp(1000, 4000), Dimensions { width: 512, height: 2048 });
    }

    #[test]
    fn square_over_bound() {
        assert_eq!(clamp(5000, 5000), Dimensions { width: 2048, height: 2048 });
    }

    #[test]
    fn extreme_ratio_never_hits_zero() {
        assert_eq!(clamp(100_000, 1), Dimensions { width: 2048, height: 1 });
        assert_eq!(clamp(1, 100_000), Dimensions { width: 1, height: 2048 });
    }

    #[test]
    fn custom_bound() {
        let policy = DimensionPolicy::new(100);
        assert_eq!(policy.clamp(400, 300), Dimensions { width: 100, height: 75 });
    }

    #[test]
    fn never_exceeds_bound() {
        for (w, h) in sample_sizes() {
            let dims = clamp(w, h);
            assert!(dims.fits_within(DEFAULT_MAX_DIMENSION), "{w}x{h} -> {dims}");
            assert!(dims.width > 0 && dims.height > 0);
            assert!(dims.width <= w && dims.height <= h, "{w}x{h} grew to {dims}");
        }
    }

    #[test]
    fn aspect_within_one_pixel() {
        for (w, h) in sample_sizes() {
            let dims = clamp(w, h);
            let aspect = w as f64 / h as f64;
            if w >= h {
                let ideal = dims.width as f64 / aspect;
                assert!(
                    (dims.height as f64 - ideal).abs() <= 1.0 || dims.height == 1,
                    "{w}x{h} -> {dims}"
                );
            } else {
                let ideal = dims.height as f64 * aspect;
                assert!(
                    (dims.width as f64 - ideal).abs() <= 1.0 || dims.width == 1,
                    "{w}x{h} -> {dims}"
                );
            }
        }
    }

    #[test]
    fn idempotent() {
        for (w, h) in sample_sizes() {
            let once = clamp(w, h);
            assert_eq!(clamp(once.width, once.height), once);
        }
    }
}
