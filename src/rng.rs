//! Seeded random streams for workload generation and transaction parameters.
//!
//! TPC-C prescribes both uniform draws and the non-uniform NURand formula
//! used to select customer and item identifiers with intentional skew. Every
//! worker owns its own stream, derived from the run seed and the worker
//! index, so runs are reproducible for a fixed seed and thread count.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Alphabet for general alphanumeric strings.
const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The fixed syllable table for customer last names.
const SYLLABLES: [&str; 10] = [
    "BAR", "OUGHT", "ABLE", "PRI", "PRES", "ESE", "ANTI", "CALLY", "ATION", "EING",
];

/// NURand A constant for last-name selection over [0, 999].
pub const A_C_LAST: i64 = 1023;
/// NURand A constant for customer-id selection over [1, 3000].
pub const A_C_ID: i64 = 8191;
/// NURand A constant for item-id selection over [1, 100000].
pub const A_OL_I_ID: i64 = 8191;

/// A seeded random stream with the TPC-C value-synthesis primitives.
///
/// The NURand C constants are drawn once from the base seed, so all workers
/// of a run agree on the skew targets while drawing from independent streams.
pub struct TpccRng {
    rng: StdRng,
    c_last: i64,
    c_id: i64,
    c_item: i64,
}

impl TpccRng {
    /// Creates the stream for the given base seed (worker index 0).
    pub fn new(seed: u64) -> Self {
        Self::for_worker(seed, 0)
    }

    /// Derives an owned, independent stream for one worker.
    ///
    /// The stream is seeded with `seed ^ worker_index`; the NURand constants
    /// come from the base seed alone and are identical across workers.
    pub fn for_worker(seed: u64, worker_index: usize) -> Self {
        let mut constants = StdRng::seed_from_u64(seed);
        let c_last = constants.gen_range(0..=A_C_LAST);
        let c_id = constants.gen_range(0..=A_C_ID);
        let c_item = constants.gen_range(0..=A_OL_I_ID);
        Self {
            rng: StdRng::seed_from_u64(seed ^ worker_index as u64),
            c_last,
            c_id,
            c_item,
        }
    }

    /// Uniform integer in `[min, max]`, inclusive on both ends.
    pub fn uniform(&mut self, min: i64, max: i64) -> i64 {
        self.rng.gen_range(min..=max)
    }

    /// The TPC-C non-uniform random formula.
    ///
    /// `(((uniform(0,A) | uniform(x,y)) + C) % (y - x + 1)) + x`, where `|`
    /// is bitwise OR. The OR clusters probability mass on values sharing set
    /// bits, giving the prescribed skew.
    pub fn nurand(&mut self, a: i64, x: i64, y: i64, c: i64) -> i64 {
        (((self.uniform(0, a) | self.uniform(x, y)) + c) % (y - x + 1)) + x
    }

    /// Skewed customer id in [1, 3000].
    pub fn customer_id(&mut self) -> i64 {
        self.nurand(A_C_ID, 1, 3000, self.c_id)
    }

    /// Skewed item id in [1, 100000].
    pub fn item_id(&mut self) -> i64 {
        self.nurand(A_OL_I_ID, 1, 100_000, self.c_item)
    }

    /// Skewed last-name index in [0, 999], for customer lookup by name.
    pub fn last_name_index(&mut self) -> i64 {
        self.nurand(A_C_LAST, 0, 999, self.c_last)
    }

    /// Random alphanumeric string with length uniform in `[min_len, max_len]`.
    pub fn alphanumeric(&mut self, min_len: usize, max_len: usize) -> String {
        let len = self.rng.gen_range(min_len..=max_len);
        (0..len)
            .map(|_| ALNUM[self.rng.gen_range(0..ALNUM.len())] as char)
            .collect()
    }

    /// Random string of exactly `len` decimal digits.
    pub fn numeric_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.rng.gen_range(0..10u8)))
            .collect()
    }

    /// Synthesizes a last name from the fixed syllable table.
    ///
    /// Three syllables indexed by the hundreds, tens and units digit of
    /// `num`, which must be in [0, 999].
    pub fn last_name(num: i64) -> String {
        let n = num as usize;
        let mut name = String::with_capacity(15);
        name.push_str(SYLLABLES[n / 100]);
        name.push_str(SYLLABLES[n / 10 % 10]);
        name.push_str(SYLLABLES[n % 10]);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = TpccRng::new(7);
        let mut b = TpccRng::new(7);
        for _ in 0..100 {
            assert_eq!(a.uniform(1, 1_000_000), b.uniform(1, 1_000_000));
        }
        assert_eq!(a.alphanumeric(10, 20), b.alphanumeric(10, 20));
    }

    #[test]
    fn test_worker_streams_are_independent() {
        let mut a = TpccRng::for_worker(7, 1);
        let mut b = TpccRng::for_worker(7, 2);
        let draws_a: Vec<i64> = (0..32).map(|_| a.uniform(0, i64::MAX - 1)).collect();
        let draws_b: Vec<i64> = (0..32).map(|_| b.uniform(0, i64::MAX - 1)).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[test]
    fn test_workers_share_nurand_constants() {
        let a = TpccRng::for_worker(7, 1);
        let b = TpccRng::for_worker(7, 5);
        assert_eq!(a.c_last, b.c_last);
        assert_eq!(a.c_id, b.c_id);
        assert_eq!(a.c_item, b.c_item);
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = TpccRng::new(1);
        for _ in 0..10_000 {
            let v = rng.uniform(5, 15);
            assert!((5..=15).contains(&v));
        }
    }

    #[test]
    fn test_nurand_range_and_skew() {
        let mut rng = TpccRng::new(42);
        let mut histogram = [0u32; 1000];
        for _ in 0..100_000 {
            let v = rng.nurand(A_C_LAST, 0, 999, 177);
            assert!((0..=999).contains(&v));
            histogram[v as usize] += 1;
        }
        // A uniform draw would put ~100 samples in each bucket; the OR in
        // NURand concentrates mass on bit-heavy values.
        let max = histogram.iter().max().unwrap();
        let min = histogram.iter().min().unwrap();
        assert!(
            *max > 2 * min.max(&1),
            "expected non-uniform histogram, got max={max} min={min}"
        );
    }

    #[test]
    fn test_last_name_synthesis() {
        assert_eq!(TpccRng::last_name(0), "BARBARBAR");
        assert_eq!(TpccRng::last_name(371), "PRICALLYOUGHT");
        assert_eq!(TpccRng::last_name(999), "EINGEINGEING");
    }

    #[test]
    fn test_customer_and_item_ids_in_range() {
        let mut rng = TpccRng::new(3);
        for _ in 0..10_000 {
            let c = rng.customer_id();
            assert!((1..=3000).contains(&c));
            let i = rng.item_id();
            assert!((1..=100_000).contains(&i));
        }
    }
}
