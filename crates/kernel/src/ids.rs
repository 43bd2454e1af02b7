use trellis_common::EntityId;

/// Source of fresh entity ids.
///
/// Seeded generators produce the same id stream on every run, which keeps
/// replays and tests reproducible. Unseeded generators draw their seed from
/// a random v4 UUID.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    state: u64,
}

impl IdGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn from_entropy() -> Self {
        let (hi, lo) = uuid::Uuid::new_v4().as_u64_pair();
        Self::with_seed(hi ^ lo)
    }

    /// Next id. Only the low 32 bits of the underlying draw are kept.
    pub fn next_id(&mut self) -> EntityId {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        EntityId::from_raw(splitmix64(self.state))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Splitmix64 finalizer.
fn splitmix64(state: u64) -> u64 {
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
