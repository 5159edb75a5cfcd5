use rand::SeedableRng;
use rand_pcg::Pcg64;

// golden ratio increment, spreads consecutive indices over the seed space
const INDEX_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

pub(crate) fn get_default_rng_from_seed(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}

/// Generator owned by record `index` of a run seeded with `seed`. Independent of which worker
/// produces the record.
pub(crate) fn get_rng_for_index(seed: u64, index: usize) -> Pcg64 {
    get_default_rng_from_seed(seed ^ (index as u64).wrapping_mul(INDEX_SEED_MIX))
}

/// Get a new seed from the thread local random generator
pub(crate) fn random_seed() -> u64 {
    rand::random::<u64>()
}
