//! Transaction mix: cumulative cutoffs over transaction types.

use crate::error::WorkloadError;
use indexmap::IndexMap;
use marketbench_types::TransactionType;
use rand::Rng;
use std::fmt;

/// Ordered table of cumulative cutoffs in `0..=100`.
///
/// A draw `x` uniform over `[0, 100]` selects the first type, in configured
/// order, whose cutoff is at least `x`. Draws above the last cutoff select
/// [`TransactionType::None`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMix {
    cutoffs: IndexMap<TransactionType, u32>,
}

impl TransactionMix {
    /// Validate and build a mix. Cutoffs must be non-decreasing and at most 100.
    pub fn new<I>(entries: I) -> Result<Self, WorkloadError>
    where
        I: IntoIterator<Item = (TransactionType, u32)>,
    {
        let mut cutoffs = IndexMap::new();
        let mut previous = 0;
        for (tx_type, cutoff) in entries {
            if cutoff > 100 {
                return Err(WorkloadError::CutoffOutOfRange { tx_type, cutoff });
            }
            if cutoff < previous {
                return Err(WorkloadError::CutoffDecreasing {
                    tx_type,
                    cutoff,
                    previous,
                });
            }
            if cutoffs.insert(tx_type, cutoff).is_some() {
                return Err(WorkloadError::DuplicateType(tx_type));
            }
            previous = cutoff;
        }
        Ok(Self { cutoffs })
    }

    /// Pick the next transaction type.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> TransactionType {
        let x: u32 = rng.gen_range(0..=100);
        self.cutoffs
            .iter()
            .find(|(_, &cutoff)| cutoff >= x)
            .map(|(tx_type, _)| *tx_type)
            .unwrap_or(TransactionType::None)
    }

    /// Entries in configured order.
    pub fn iter(&self) -> impl Iterator<Item = (TransactionType, u32)> + '_ {
        self.cutoffs.iter().map(|(t, c)| (*t, *c))
    }

    pub fn contains(&self, tx_type: TransactionType) -> bool {
        self.cutoffs.contains_key(&tx_type)
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }
}

impl fmt::Display for TransactionMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (tx_type, cutoff) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{tx_type}<={cutoff}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn frequencies(mix: &TransactionMix, draws: usize, seed: u64) -> HashMap<TransactionType, f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut counts: HashMap<TransactionType, usize> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(mix.pick(&mut rng)).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(t, c)| (t, c as f64 / draws as f64))
            .collect()
    }

    #[test]
    fn test_pick_frequencies_follow_cutoffs() {
        let mix = TransactionMix::new([
            (TransactionType::PriceUpdate, 10),
            (TransactionType::QueryDashboard, 30),
            (TransactionType::CustomerSession, 90),
        ])
        .unwrap();

        let freq = frequencies(&mix, 1_000_000, 42);
        let expect = |t| freq.get(&t).copied().unwrap_or(0.0);

        // Draws are over 101 values, 0 included.
        assert!((expect(TransactionType::PriceUpdate) - 11.0 / 101.0).abs() < 0.015);
        assert!((expect(TransactionType::QueryDashboard) - 20.0 / 101.0).abs() < 0.015);
        assert!((expect(TransactionType::CustomerSession) - 60.0 / 101.0).abs() < 0.015);
        assert!((expect(TransactionType::None) - 10.0 / 101.0).abs() < 0.015);
    }

    #[test]
    fn test_equal_cutoffs_shadow_later_types() {
        let mix = TransactionMix::new([
            (TransactionType::PriceUpdate, 100),
            (TransactionType::UpdateDelivery, 100),
        ])
        .unwrap();

        let freq = frequencies(&mix, 10_000, 7);
        assert_eq!(freq.get(&TransactionType::PriceUpdate), Some(&1.0));
    }

    #[test]
    fn test_pick_is_deterministic_for_seed() {
        let mix = TransactionMix::new([
            (TransactionType::CustomerSession, 50),
            (TransactionType::UpdateDelivery, 100),
        ])
        .unwrap();

        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        let left: Vec<_> = (0..100).map(|_| mix.pick(&mut a)).collect();
        let right: Vec<_> = (0..100).map(|_| mix.pick(&mut b)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_invalid_mixes_rejected() {
        assert!(matches!(
            TransactionMix::new([(TransactionType::PriceUpdate, 101)]),
            Err(WorkloadError::CutoffOutOfRange { cutoff: 101, .. })
        ));
        assert!(matches!(
            TransactionMix::new([
                (TransactionType::PriceUpdate, 50),
                (TransactionType::UpdateProduct, 40),
            ]),
            Err(WorkloadError::CutoffDecreasing { previous: 50, .. })
        ));
        assert!(matches!(
            TransactionMix::new([
                (TransactionType::PriceUpdate, 50),
                (TransactionType::PriceUpdate, 60),
            ]),
            Err(WorkloadError::DuplicateType(TransactionType::PriceUpdate))
        ));
    }

    #[test]
    fn test_empty_mix_always_none() {
        let mix = TransactionMix::new(Vec::new()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!((0..100).all(|_| mix.pick(&mut rng) == TransactionType::None));
    }
}
