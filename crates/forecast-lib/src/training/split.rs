//! Seeded train/test partitioning

use crate::rng::SeededRng;

/// Shuffle indices with `seed` and carve off `ceil(n * test_ratio)` for
/// testing. Both partitions are non-empty whenever `n >= 2`.
pub fn train_test_split<T: Clone>(items: &[T], test_ratio: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    if n < 2 {
        return (items.to_vec(), Vec::new());
    }

    let ratio = test_ratio.clamp(0.0, 1.0);
    let n_test = ((n as f64 * ratio).ceil() as usize).clamp(1, n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    SeededRng::new(seed).shuffle(&mut order);

    let (test_idx, train_idx) = order.split_at(n_test);
    let pick = |idx: &[usize]| -> Vec<T> { idx.iter().map(|&i| items[i].clone()).collect() };
    (pick(train_idx), pick(test_idx))
}
