//! Single-outcome sampling for interactive play.

use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

use crate::{Outcome, OutcomeDistribution};

/// Draws one outcome with probability proportional to its weight.
///
/// Returns `None` for an empty distribution.
pub fn sample_outcome<'a, R>(
    distribution: &'a OutcomeDistribution,
    rng: &mut R,
) -> Option<&'a Outcome>
where
    R: Rng + ?Sized,
{
    let weights = WeightedIndex::new(distribution.iter().map(|outcome| outcome.probability)).ok()?;
    distribution.iter().nth(weights.sample(rng))
}
