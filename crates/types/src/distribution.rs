//! Id samplers for seller and product selection.

use crate::workload::{DistributionType, Interval};
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::Rng;

/// Samples ids from an inclusive range following a configured distribution.
#[derive(Debug, Clone)]
pub enum IdSampler {
    /// Every id in the range equally likely.
    Uniform { range: Interval, dist: Uniform<u32> },

    /// Zipf distribution over the range: P(min + k) ~ 1 / (k + 1)^skew.
    Zipfian {
        range: Interval,
        index: WeightedIndex<f64>,
    },
}

impl IdSampler {
    /// Build a sampler for `range` following `distribution`.
    pub fn new(range: Interval, distribution: DistributionType) -> Result<Self, SamplerError> {
        if !range.is_valid() {
            return Err(SamplerError::EmptyRange {
                min: range.min,
                max: range.max,
            });
        }

        match distribution {
            DistributionType::Uniform => Ok(IdSampler::Uniform {
                range,
                dist: Uniform::new_inclusive(range.min, range.max),
            }),
            DistributionType::Zipfian { skew } => {
                if !skew.is_finite() || skew < 0.0 {
                    return Err(SamplerError::InvalidSkew(skew));
                }
                // Rank 1 is the hottest key and maps to `range.min`.
                let weights = (1..=range.len()).map(|rank| 1.0 / (rank as f64).powf(skew));
                let index = WeightedIndex::new(weights)
                    .map_err(|e| SamplerError::Weights(e.to_string()))?;
                Ok(IdSampler::Zipfian { range, index })
            }
        }
    }

    /// Draw one id.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            IdSampler::Uniform { dist, .. } => dist.sample(rng),
            IdSampler::Zipfian { range, index } => range.min + index.sample(rng) as u32,
        }
    }

    /// The range this sampler draws from.
    pub fn range(&self) -> Interval {
        match self {
            IdSampler::Uniform { range, .. } | IdSampler::Zipfian { range, .. } => *range,
        }
    }
}

/// Errors building an id sampler.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Cannot sample from empty range [{min}, {max}]")]
    EmptyRange { min: u32, max: u32 },

    #[error("Zipfian skew must be a finite non-negative number, got {0}")]
    InvalidSkew(f64),

    #[error("Invalid sampling weights: {0}")]
    Weights(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_uniform_stays_in_range() {
        let sampler = IdSampler::new(Interval::new(5, 9), DistributionType::Uniform).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut seen = [false; 5];

        for _ in 0..1_000 {
            let id = sampler.sample(&mut rng);
            assert!((5..=9).contains(&id), "id {} out of range", id);
            seen[(id - 5) as usize] = true;
        }

        assert!(seen.iter().all(|s| *s), "Every id should be drawn eventually");
    }

    #[test]
    fn test_zipfian_favours_low_ids() {
        let sampler = IdSampler::new(
            Interval::new(1, 100),
            DistributionType::Zipfian { skew: 1.5 },
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut counts = vec![0u32; 101];

        for _ in 0..20_000 {
            let id = sampler.sample(&mut rng);
            assert!((1..=100).contains(&id));
            counts[id as usize] += 1;
        }

        assert!(counts[1] > counts[2], "Rank 1 should be hotter than rank 2");
        assert!(counts[1] > counts[50] * 10, "Hot key should dominate the tail");
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(matches!(
            IdSampler::new(Interval::new(3, 2), DistributionType::Uniform),
            Err(SamplerError::EmptyRange { min: 3, max: 2 })
        ));
        assert!(matches!(
            IdSampler::new(
                Interval::new(1, 10),
                DistributionType::Zipfian { skew: f64::NAN }
            ),
            Err(SamplerError::InvalidSkew(_))
        ));
    }
}
