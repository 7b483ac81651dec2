use crate::candle_batch_chunks::batch_chunks;
use crate::candle_model_traits::{EvalModeGuard, ModelStateT, SampleT};

use anyhow::bail;
use candle_core::{Device, Tensor};
use log::debug;

///
/// Collect `num_samples` samples by calling `generate`.
///
/// Without `batch_size` everything comes from a single call.
/// Otherwise `num_samples / batch_size` calls of `batch_size` are
/// followed by one call for the remainder (if any). Each batch is
/// moved to the host as soon as it arrives, and the batches are
/// concatenated in call order.
///
/// * `generate` - fn (count) -> `count` samples
/// * `num_samples` - total number of samples
/// * `batch_size` - optional number of samples per call
///
pub fn collect_samples_with<GenFn>(
    generate: &mut GenFn,
    num_samples: usize,
    batch_size: Option<usize>,
) -> anyhow::Result<Tensor>
where
    GenFn: FnMut(usize) -> anyhow::Result<Tensor>,
{
    if num_samples == 0 {
        bail!("need at least one sample");
    }

    let Some(batch_size) = batch_size else {
        return Ok(generate(num_samples)?.to_device(&Device::Cpu)?);
    };

    let chunks = batch_chunks(num_samples, batch_size)?;
    let mut batches = Vec::with_capacity(chunks.len());

    for chunk in chunks.iter() {
        let samples = generate(chunk.len())?.to_device(&Device::Cpu)?;
        debug!("sampled [{}, {})", chunk.lb, chunk.ub);
        batches.push(samples);
    }

    let samples = Tensor::cat(&batches, 0)?;
    if samples.dim(0)? != num_samples {
        bail!(
            "collected {} samples instead of {}",
            samples.dim(0)?,
            num_samples
        );
    }
    Ok(samples)
}

///
/// Collect samples from a model in evaluation mode. The previous
/// training mode is restored afterwards.
///
pub fn collect_samples<M>(
    model: &mut M,
    num_samples: usize,
    batch_size: Option<usize>,
) -> anyhow::Result<Tensor>
where
    M: SampleT + ModelStateT + ?Sized,
{
    let model = EvalModeGuard::new(model);
    collect_samples_with(&mut |k| model.sample(k), num_samples, batch_size)
}
