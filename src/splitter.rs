//! Stratified train/test splitting
//!
//! Partitions labeled examples into disjoint train and test sets, stratified
//! by label, with a fixed RNG seed for reproducibility. Every class with at
//! least two examples appears in both partitions.

use crate::types::LabeledExample;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// A disjoint, exhaustive partition of the input examples.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
}

/// Split examples into train/test with the given training proportion.
pub fn stratified_split(examples: Vec<LabeledExample>, proportion: f64, seed: u64) -> Split {
    // BTreeMap keeps class iteration order deterministic for a fixed seed.
    let mut by_label: BTreeMap<String, Vec<LabeledExample>> = BTreeMap::new();
    for example in examples {
        by_label.entry(example.label.clone()).or_default().push(example);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut group) in by_label {
        group.shuffle(&mut rng);
        let n = group.len();
        let mut n_train = (n as f64 * proportion).round() as usize;
        if n >= 2 {
            // Both partitions see the class when its count allows.
            n_train = n_train.clamp(1, n - 1);
        } else {
            n_train = n;
        }
        let rest = group.split_off(n_train);
        train.extend(group);
        test.extend(rest);
    }

    Split { train, test }
}
