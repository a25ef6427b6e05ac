// ============================================================================
// KERNEL CACHE - precomputed, mirror-normalised 1-D Gaussian kernels
// ============================================================================
//
// A kernel stores the centre tap and one side; the programs apply every
// non-centre tap twice (uv + k, uv - k), so
//
//     taps[0] + 2 * sum(taps[1..]) == 1
//
// Two synthesis rules exist, one per blur family:
//
//   * SearchedSigma  (linear family)  for radius r, the smallest sigma on a
//     1/500 grid whose tail weight at r + 1 exceeds 1/640, taps 0..=r.
//   * Oversampled    (Gaussian family) sigma = size, 2 * size taps, so the
//     kernel reaches twice as far as the nominal size.

use crate::gfx::catalog::KERNEL_SIZE;

/// Largest radius of the searched-sigma family.
pub const MAX_SEARCHED_RADIUS: usize = KERNEL_SIZE - 1;
/// Largest size of the oversampled family (2 * 64 taps fill the buffer).
pub const MAX_OVERSAMPLED_SIZE: usize = KERNEL_SIZE / 2;

const SEARCH_STEP: f64 = 1.0 / 500.0;
const SEARCH_LIMIT: f64 = 256.0;
const SEARCH_TAIL: f64 = 1.0 / 640.0;

/// Normal distribution density at `x`.
pub fn gaussian(x: f64, sigma: f64) -> f64 {
    let two_pi = std::f64::consts::PI * 2.0;
    (1.0 / (sigma * two_pi.sqrt())) * (-(x * x) / (2.0 * sigma * sigma)).exp()
}

/// Smallest grid sigma whose density at `target` exceeds the tail weight,
/// or 1.0 when no sigma below the search limit qualifies.
fn search_sigma(target: f64) -> f64 {
    let mut h = SEARCH_STEP;
    while h < SEARCH_LIMIT {
        if gaussian(target, h) > SEARCH_TAIL {
            return h;
        }
        h += SEARCH_STEP;
    }
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelSynthesis {
    SearchedSigma,
    Oversampled,
}

impl KernelSynthesis {
    pub fn max_size(self) -> usize {
        match self {
            KernelSynthesis::SearchedSigma => MAX_SEARCHED_RADIUS,
            KernelSynthesis::Oversampled => MAX_OVERSAMPLED_SIZE,
        }
    }
}

/// One discretised kernel, padded to the upload size.
#[derive(Clone, Debug)]
pub struct Kernel {
    size: usize,
    sigma: f64,
    taps: usize,
    weights: Vec<f32>,
}

impl Kernel {
    fn searched(radius: usize) -> Self {
        Self::build(radius, search_sigma((radius + 1) as f64), radius + 1)
    }

    fn oversampled(size: usize) -> Self {
        Self::build(size, size as f64, size * 2)
    }

    fn build(size: usize, sigma: f64, taps: usize) -> Self {
        let taps = taps.min(KERNEL_SIZE);
        let raw: Vec<f64> = (0..taps).map(|p| gaussian(p as f64, sigma)).collect();
        let total: f64 = raw
            .iter()
            .enumerate()
            .map(|(p, v)| if p == 0 { *v } else { v * 2.0 })
            .sum();

        let mut weights = vec![0.0f32; KERNEL_SIZE];
        for (w, v) in weights.iter_mut().zip(&raw) {
            *w = (v / total) as f32;
        }
        Self {
            size,
            sigma,
            taps,
            weights,
        }
    }

    /// The blur size this kernel was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Centre tap followed by one side.
    pub fn taps(&self) -> &[f32] {
        &self.weights[..self.taps]
    }

    /// All `KERNEL_SIZE` floats, zero padded, as uploaded to `pKernel`.
    pub fn padded(&self) -> &[f32] {
        &self.weights
    }

    /// `taps[0] + 2 * sum(taps[1..])`.
    pub fn mirrored_sum(&self) -> f64 {
        self.taps()
            .iter()
            .enumerate()
            .map(|(p, v)| if p == 0 { *v as f64 } else { *v as f64 * 2.0 })
            .sum()
    }
}

/// Every kernel of one family, computed once at construction.
#[derive(Debug)]
pub struct KernelCache {
    synthesis: KernelSynthesis,
    kernels: Vec<Kernel>,
}

impl KernelCache {
    pub fn new(synthesis: KernelSynthesis) -> Self {
        let max = synthesis.max_size();
        let kernels = (1..=max)
            .map(|size| match synthesis {
                KernelSynthesis::SearchedSigma => Kernel::searched(size),
                KernelSynthesis::Oversampled => Kernel::oversampled(size),
            })
            .collect();
        log::debug!("<blur::kernel> built {} {:?} kernels", max, synthesis);
        Self { synthesis, kernels }
    }

    pub fn synthesis(&self) -> KernelSynthesis {
        self.synthesis
    }

    pub fn max_size(&self) -> usize {
        self.kernels.len()
    }

    /// Kernel for `size`, clamped into `[1, max_size]`.
    pub fn get_kernel(&self, size: usize) -> &Kernel {
        let index = size.clamp(1, self.kernels.len()) - 1;
        &self.kernels[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_peak_matches_closed_form() {
        let expected = 1.0 / (2.0 * (2.0 * std::f64::consts::PI).sqrt());
        assert!((gaussian(0.0, 2.0) - expected).abs() < 1e-12);
        assert!(gaussian(3.0, 1.0) < gaussian(1.0, 1.0));
    }

    #[test]
    fn searched_kernels_mirror_sum_to_one() {
        let cache = KernelCache::new(KernelSynthesis::SearchedSigma);
        assert_eq!(cache.max_size(), MAX_SEARCHED_RADIUS);
        for r in 1..=cache.max_size() {
            let k = cache.get_kernel(r);
            assert_eq!(k.taps().len(), r + 1);
            assert!((k.mirrored_sum() - 1.0).abs() < 1e-4, "radius {}", r);
            assert!(gaussian((r + 1) as f64, k.sigma()) > SEARCH_TAIL);
        }
    }

    #[test]
    fn unreachable_tail_falls_back_to_unit_sigma() {
        // Peak density at any sigma is below the tail weight this far out
        assert_eq!(search_sigma(1.0e6), 1.0);
        let small = search_sigma(2.0);
        assert!(small < 2.0 && gaussian(2.0, small) > SEARCH_TAIL);
    }

    #[test]
    fn oversampled_kernels_mirror_sum_to_one() {
        let cache = KernelCache::new(KernelSynthesis::Oversampled);
        assert_eq!(cache.max_size(), MAX_OVERSAMPLED_SIZE);
        for s in 1..=cache.max_size() {
            let k = cache.get_kernel(s);
            assert_eq!(k.taps().len(), s * 2);
            assert_eq!(k.padded().len(), KERNEL_SIZE);
            assert!((k.mirrored_sum() - 1.0).abs() < 1e-4, "size {}", s);
        }
    }

    #[test]
    fn out_of_range_sizes_clamp() {
        let cache = KernelCache::new(KernelSynthesis::Oversampled);
        assert_eq!(cache.get_kernel(0).size(), 1);
        assert_eq!(cache.get_kernel(500).size(), MAX_OVERSAMPLED_SIZE);
    }

    #[test]
    fn weights_decrease_from_centre() {
        let cache = KernelCache::new(KernelSynthesis::SearchedSigma);
        let taps = cache.get_kernel(8).taps();
        assert!(taps.windows(2).all(|w| w[0] >= w[1]));
    }
}
