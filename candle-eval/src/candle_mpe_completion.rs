use crate::candle_data_loader::DatasetT;
use crate::candle_model_traits::{EvalModeGuard, ModelStateT, MpeT};
use crate::candle_random_state::{check_random_state, RandomState};

use anyhow::bail;
use candle_core::{Device, Tensor};
use log::info;

/// Which half of an image is hidden
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskPattern {
    Top,
    Bottom,
    Left,
    Right,
}

impl MaskPattern {
    /// the order in which completions appear after each original
    pub const ALL: [MaskPattern; 4] = [
        MaskPattern::Top,
        MaskPattern::Bottom,
        MaskPattern::Left,
        MaskPattern::Right,
    ];

    ///
    /// Copy `x_nchw` and overwrite the masked half with `NaN`.
    /// Rows `< H/2` are the top half; columns `< W/2` the left half.
    ///
    pub fn apply(&self, x_nchw: &Tensor) -> anyhow::Result<Tensor> {
        if !x_nchw.dtype().is_float() {
            bail!("missing values need a float tensor, got {:?}", x_nchw.dtype());
        }

        let (n, c, h, w) = x_nchw.dims4()?;
        let (half_h, half_w) = (h / 2, w / 2);

        let (rows, cols) = match self {
            MaskPattern::Top => (0..half_h, 0..w),
            MaskPattern::Bottom => (half_h..h, 0..w),
            MaskPattern::Left => (0..h, 0..half_w),
            MaskPattern::Right => (0..h, half_w..w),
        };

        if n == 0 || c == 0 || rows.is_empty() || cols.is_empty() {
            return Ok(x_nchw.copy()?);
        }

        let nan = Tensor::full(f32::NAN, (n, c, rows.len(), cols.len()), x_nchw.device())?
            .to_dtype(x_nchw.dtype())?;

        Ok(x_nchw.slice_assign(&[0..n, 0..c, rows, cols], &nan)?)
    }
}

///
/// Complete four masked copies of `x_nchw` with a single `mpe` call
/// and interleave the results per sample:
///
/// `x[0], top[0], bottom[0], left[0], right[0], x[1], top[1], ...`
///
/// * `mpe` - fn (images with `NaN`) -> completed images
/// * `x_nchw` - original images (n x C x H x W)
///
/// # Returns host-resident images (5n x C x H x W)
///
pub fn complete_images_with<MpeFn>(mpe: &MpeFn, x_nchw: &Tensor) -> anyhow::Result<Tensor>
where
    MpeFn: Fn(&Tensor) -> anyhow::Result<Tensor>,
{
    let (n, c, h, w) = x_nchw.dims4()?;

    let masked = MaskPattern::ALL
        .iter()
        .map(|m| m.apply(x_nchw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let masked = Tensor::cat(&masked, 0)?;

    let completed = mpe(&masked)?;
    if completed.dims() != masked.dims() {
        bail!(
            "completions {:?} do not match the masked images {:?}",
            completed.dims(),
            masked.dims()
        );
    }

    let nvar = MaskPattern::ALL.len() + 1;
    let out = Tensor::cat(&[x_nchw, &completed], 0)?
        .reshape((nvar, n, c, h, w))?
        .transpose(0, 1)?
        .reshape((nvar * n, c, h, w))?;

    Ok(out.to_device(&Device::Cpu)?)
}

///
/// Pick `num_samples` random test images, hide each half of them in
/// turn and let the model fill them in.
///
/// * `model` - model answering MPE queries; moved to `device` and
///   kept in evaluation mode for the call
/// * `data_test` - image data with `features_shape` `[C, H, W]`
/// * `num_samples` - number of distinct test images
/// * `random_state` - `None` draws a fresh state from the OS
/// * `device` - `None` uses CUDA when available, CPU otherwise
///
/// # Returns originals and completions (5n x C x H x W), see
/// `complete_images_with` for the ordering
///
pub fn collect_image_completions<M, D>(
    model: &mut M,
    data_test: &D,
    num_samples: usize,
    random_state: Option<RandomState>,
    device: Option<&Device>,
) -> anyhow::Result<Tensor>
where
    M: MpeT + ModelStateT + ?Sized,
    D: DatasetT,
{
    if num_samples == 0 || num_samples > data_test.len() {
        bail!(
            "the number of samples ({}) must be in [1, {}]",
            num_samples,
            data_test.len()
        );
    }

    let &[channels, height, width] = data_test.features_shape() else {
        bail!(
            "expected [channels, height, width] images, got {:?}",
            data_test.features_shape()
        );
    };

    let device = match device {
        Some(device) => device.clone(),
        None => Device::cuda_if_available(0)?,
    };

    model.to_device(&device)?;
    let model = EvalModeGuard::new(model);

    let mut random_state = check_random_state(random_state);
    let indices = random_state.choice(data_test.len(), num_samples)?;
    let samples = data_test.stack(&indices)?.to_device(&device)?;

    info!(
        "completing {} images of {} x {} x {}",
        num_samples, channels, height, width
    );

    complete_images_with(&|x: &Tensor| model.mpe(x), &samples)
}
