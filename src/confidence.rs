//! Confidence scoring
//!
//! Reduces a per-class probability vector to a single scalar confidence:
//! the maximum class probability. Pure reduction, no side effects.

use crate::error::PipelineError;
use std::collections::BTreeMap;

/// Per-class probabilities keyed by class name; values sum to 1.
pub type ClassProbabilities = BTreeMap<String, f64>;

/// The arg-max class and its probability. Ties resolve to the maximal value
/// regardless of which class attains it (the first such class by name wins
/// the label). Fails when the probability vector is empty.
pub fn max_probability(probabilities: &ClassProbabilities) -> Result<(String, f64), PipelineError> {
    probabilities
        .iter()
        .fold(None::<(&String, f64)>, |best, (class, p)| match best {
            Some((_, best_p)) if best_p >= *p => best,
            _ => Some((class, *p)),
        })
        .map(|(class, p)| (class.clone(), p))
        .ok_or_else(|| {
            PipelineError::Model("empty probability vector, no confidence defined".to_string())
        })
}
