use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Approximate distinct-count estimator (HyperLogLog). Precision is the
/// number of bits used to select a register; `m = 1 << precision` registers
/// are kept, giving a standard error of roughly `1.04 / sqrt(m)`.
///
/// Grounded on the usage contract shown by `ShardedMetricsAggregator`'s
/// sketch fields (`new`, `add`, `cardinality`, `merge`, `Clone`) — no pack
/// crate supplies an importable HLL implementation, so the estimator itself
/// is hand-written here.
#[derive(Debug, Clone)]
pub struct CardinalitySketch {
    precision: u8,
    registers: Vec<u8>,
}

const DEFAULT_PRECISION: u8 = 14;

impl CardinalitySketch {
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_PRECISION)
    }

    pub fn with_precision(precision: u8) -> Self {
        assert!((4..=18).contains(&precision), "precision out of range");
        let m = 1usize << precision;
        CardinalitySketch { precision, registers: vec![0u8; m] }
    }

    pub fn add(&mut self, item: &[u8]) {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        let h = hasher.finish();

        let m = self.registers.len() as u64;
        let idx = (h & (m - 1)) as usize;
        let rest = h >> self.precision;
        // +1 so an all-zero remainder still counts as one leading zero.
        let rho = (rest.trailing_zeros() as u8) + 1;
        if rho > self.registers[idx] {
            self.registers[idx] = rho;
        }
    }

    pub fn merge(&mut self, other: &CardinalitySketch) {
        assert_eq!(self.precision, other.precision, "cannot merge sketches of different precision");
        for (a, b) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *b > *a {
                *a = *b;
            }
        }
    }

    pub fn cardinality(&self) -> u64 {
        let m = self.registers.len() as f64;
        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };

        let sum: f64 = self.registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
        let raw = alpha * m * m / sum;

        let zeros = self.registers.iter().filter(|&&r| r == 0).count();
        let estimate = if raw <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else {
            raw
        };

        estimate.round().max(0.0) as u64
    }

    pub fn bytes(&self) -> usize {
        self.registers.len() + std::mem::size_of::<u8>()
    }
}

impl Default for CardinalitySketch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sketch_is_zero() {
        let s = CardinalitySketch::new();
        assert_eq!(s.cardinality(), 0);
    }

    #[test]
    fn test_estimate_within_bound() {
        let mut s = CardinalitySketch::new();
        let n = 10_000u64;
        for i in 0..n {
            s.add(&i.to_le_bytes());
        }
        let est = s.cardinality() as f64;
        let err = (est - n as f64).abs() / n as f64;
        assert!(err < 0.05, "estimate {} too far from {} (err {})", est, n, err);
    }

    #[test]
    fn test_merge_is_union_like() {
        let mut a = CardinalitySketch::new();
        let mut b = CardinalitySketch::new();
        for i in 0..5_000u64 {
            a.add(&i.to_le_bytes());
        }
        for i in 4_000..9_000u64 {
            b.add(&i.to_le_bytes());
        }
        a.merge(&b);
        let est = a.cardinality() as f64;
        let err = (est - 9_000.0).abs() / 9_000.0;
        assert!(err < 0.07, "merged estimate {} too far off", est);
    }

    #[test]
    fn test_repeated_add_does_not_inflate() {
        let mut s = CardinalitySketch::new();
        for _ in 0..1000 {
            s.add(b"same-item");
        }
        assert!(s.cardinality() <= 2);
    }
}
