use anyhow::bail;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Random state used to draw sample indexes
#[derive(Clone, Debug)]
pub struct RandomState {
    rng: StdRng,
}

impl RandomState {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    ///
    /// Choose `k` distinct indexes from `[0, n)` without
    /// replacement. The indexes come in the order they were drawn.
    ///
    pub fn choice(&mut self, n: usize, k: usize) -> anyhow::Result<Vec<usize>> {
        if k > n {
            bail!("cannot choose {} distinct indexes out of {}", k, n);
        }
        Ok(rand::seq::index::sample(&mut self.rng, n, k).into_vec())
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl From<u64> for RandomState {
    fn from(seed: u64) -> Self {
        Self::from_seed(seed)
    }
}

impl From<StdRng> for RandomState {
    fn from(rng: StdRng) -> Self {
        Self { rng }
    }
}

/// Take the given random state, or a fresh one seeded from the OS
pub fn check_random_state(random_state: Option<RandomState>) -> RandomState {
    random_state.unwrap_or_else(RandomState::from_entropy)
}
