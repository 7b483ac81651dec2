use anyhow::bail;

/// A half-open range of sample indexes `[lb, ub)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRange {
    pub lb: usize,
    pub ub: usize,
}

impl ChunkRange {
    pub fn new(lb: usize, ub: usize) -> Self {
        debug_assert!(lb <= ub);
        Self { lb, ub }
    }

    pub fn len(&self) -> usize {
        self.ub - self.lb
    }

    pub fn is_empty(&self) -> bool {
        self.lb == self.ub
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.lb..self.ub
    }
}

///
/// Split `[0, ntot)` into consecutive chunks of `batch_size`.
///
/// Full-size chunks come first; if `ntot` is not a multiple of
/// `batch_size`, one more chunk covers the tail and ends at `ntot`.
/// The chunks partition `[0, ntot)` and none of them is empty.
///
/// * `ntot` - total number of samples
/// * `batch_size` - maximum number of samples per chunk (> 0)
///
pub fn batch_chunks(ntot: usize, batch_size: usize) -> anyhow::Result<Vec<ChunkRange>> {
    if batch_size == 0 {
        bail!("batch size must be positive");
    }

    let nfull = ntot / batch_size;
    let nremain = ntot % batch_size;

    let mut chunks = (0..nfull)
        .map(|b| ChunkRange::new(b * batch_size, (b + 1) * batch_size))
        .collect::<Vec<_>>();

    if nremain > 0 {
        chunks.push(ChunkRange::new(ntot - nremain, ntot));
    }

    Ok(chunks)
}
