//! Synthetic labelled trajectories for demos and tests.
//!
//! Class `c` is a sinusoid completing `c + 1` periods over the trajectory,
//! with a random phase and uniform noise, so classes are separable but not
//! trivially identical.

use std::f64::consts::PI;

use rand::seq::SliceRandom;
use rand::Rng;

use super::types::TrajectorySet;

/// Peak-to-peak amplitude of the additive noise.
const NOISE: f64 = 0.3;

/// Generate `counts[c]` trajectories of `length` samples for every class `c`,
/// in shuffled order.
pub fn synthetic<R: Rng>(counts: &[usize], length: usize, rng: &mut R) -> TrajectorySet {
    let num_classes = counts.len();
    let mut order: Vec<usize> = counts
        .iter()
        .enumerate()
        .flat_map(|(c, &n)| std::iter::repeat(c).take(n))
        .collect();
    order.shuffle(rng);

    let mut set = TrajectorySet::new();
    for class in order {
        let phase = rng.gen_range(0.0..2.0 * PI);
        let freq = (class + 1) as f64;
        let trajectory = (0..length)
            .map(|t| {
                let x = 2.0 * PI * freq * t as f64 / length.max(1) as f64;
                (x + phase).sin() + rng.gen_range(-NOISE / 2.0..NOISE / 2.0)
            })
            .collect();

        let mut label = vec![0.0; num_classes];
        label[class] = 1.0;
        set.push(trajectory, label);
    }
    set
}
