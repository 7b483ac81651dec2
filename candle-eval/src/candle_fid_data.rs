use crate::candle_data_loader::{DatasetT, SubsetData};
use crate::candle_model_traits::{ModelStateT, SampleT};
use crate::candle_random_state::RandomState;
use crate::candle_sampler::collect_samples;

use anyhow::bail;
use candle_core::Tensor;
use log::info;

pub const DEFAULT_FID_NUM_SAMPLES: usize = 1000;
pub const DEFAULT_FID_BATCH_SIZE: usize = 100;
pub const DEFAULT_FID_SEED: u64 = 42;

///
/// Prepare the two data sets compared by the FID score: a random
/// subset of the test data and as many samples from the model.
///
/// The subset indexes and the model samples are independent draws;
/// no pairing between the two is implied.
///
/// * `model` - generative model, sampled in evaluation mode
/// * `data_test` - test data
/// * `num_samples` - size of both data sets (at most `data_test.len()`)
/// * `batch_size` - number of model samples per call
/// * `random_state` - seed or random state for the test subset
///
/// # Returns `(test subset, model samples)`
///
pub fn sample_fid_datasets<'a, M, D>(
    model: &mut M,
    data_test: &'a D,
    num_samples: usize,
    batch_size: usize,
    random_state: impl Into<RandomState>,
) -> anyhow::Result<(SubsetData<'a, D>, Tensor)>
where
    M: SampleT + ModelStateT + ?Sized,
    D: DatasetT,
{
    if num_samples > data_test.len() {
        bail!(
            "the number of samples ({}) cannot be greater than the number of test samples ({})",
            num_samples,
            data_test.len()
        );
    }

    let mut random_state = random_state.into();

    let samples = collect_samples(model, num_samples, Some(batch_size))?;

    let indices = random_state.choice(data_test.len(), num_samples)?;
    let subset = SubsetData::new(data_test, indices)?;

    info!(
        "FID data sets: {} test samples, {} model samples",
        subset.len(),
        samples.dim(0)?
    );

    Ok((subset, samples))
}
