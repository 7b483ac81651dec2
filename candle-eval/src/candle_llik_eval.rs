use crate::candle_batch_chunks::batch_chunks;
use crate::candle_data_loader_util::BatchSourceT;
use crate::candle_inference::{chunk_progress_bar, EvalConfig};
use crate::candle_model_traits::LogLikelihoodT;

use anyhow::bail;
use candle_core::{DType, Tensor};
use log::debug;
use ndarray::{s, Array1, ArrayView1};

///
/// Evaluate the average log-likelihood and two standard errors,
/// calling `llik` on one chunk of at most `config.batch_size`
/// samples at a time to bound memory.
///
/// * `llik` - fn (chunk) -> per-sample log-likelihood
/// * `x` - samples to evaluate
/// * `config` - chunk size, target device, progress display
///
/// # Returns `(mean, 2 * sd / sqrt(n))`
///
pub fn evaluate_log_likelihoods<X, LlikFn>(
    llik: &LlikFn,
    x: &X,
    config: &EvalConfig,
) -> anyhow::Result<(f64, f64)>
where
    X: BatchSourceT + ?Sized,
    LlikFn: Fn(&Tensor) -> anyhow::Result<Tensor>,
{
    let ntot = x.num_samples();
    if ntot == 0 {
        bail!("no samples to evaluate");
    }

    let chunks = batch_chunks(ntot, config.batch_size)?;
    let pb = chunk_progress_bar(chunks.len(), config.show_progress);

    let mut llik_n = Array1::<f32>::zeros(ntot);

    for chunk in chunks.iter() {
        let x_chunk = x.take_lb_ub(chunk.lb, chunk.ub, &config.device)?;
        let llik_chunk = llik(&x_chunk)?
            .flatten_all()?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;

        if llik_chunk.len() != chunk.len() {
            bail!(
                "{} log-likelihood values for {} samples [{}, {})",
                llik_chunk.len(),
                chunk.len(),
                chunk.lb,
                chunk.ub
            );
        }

        llik_n
            .slice_mut(s![chunk.lb..chunk.ub])
            .assign(&ArrayView1::from(&llik_chunk[..]));

        debug!("log-likelihood [{}, {}) done", chunk.lb, chunk.ub);
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(summarize_log_likelihoods(&llik_n))
}

/// Same as `evaluate_log_likelihoods` with a model's own `log_likelihood`
pub fn evaluate_model_log_likelihoods<M, X>(
    model: &M,
    x: &X,
    config: &EvalConfig,
) -> anyhow::Result<(f64, f64)>
where
    M: LogLikelihoodT + ?Sized,
    X: BatchSourceT + ?Sized,
{
    evaluate_log_likelihoods(&|x_nd: &Tensor| model.log_likelihood(x_nd), x, config)
}

/// mean and `2 * sd / sqrt(n)` with the population standard deviation
pub fn summarize_log_likelihoods(llik_n: &Array1<f32>) -> (f64, f64) {
    let llik_n = llik_n.mapv(f64::from);
    let ntot = llik_n.len() as f64;
    let mean = llik_n.mean().unwrap_or(f64::NAN);
    let sd = llik_n.std(0.);
    (mean, 2. * sd / ntot.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use candle_core::Device;
    use std::cell::RefCell;

    fn config(batch_size: usize) -> EvalConfig {
        EvalConfig {
            batch_size,
            ..Default::default()
        }
    }

    fn gaussian_llik(x: &Tensor) -> anyhow::Result<Tensor> {
        let half_ln_2pi = 0.5 * (2. * std::f64::consts::PI).ln();
        Ok(((x.sqr()? * -0.5)? - half_ln_2pi)?.sum(1)?)
    }

    #[test]
    fn test_constant_scores() -> anyhow::Result<()> {
        let x = Tensor::randn(0f32, 1f32, (37, 4), &Device::Cpu)?;
        let constant = |x: &Tensor| -> anyhow::Result<Tensor> {
            Ok((Tensor::ones(x.dim(0)?, DType::F32, x.device())? * -3.5)?)
        };

        for batch_size in [1, 5, 36, 37, 100] {
            let (mean, stderr2) = evaluate_log_likelihoods(&constant, &x, &config(batch_size))?;
            assert_abs_diff_eq!(mean, -3.5, epsilon = 1e-9);
            assert_abs_diff_eq!(stderr2, 0., epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_chunk_size_invariance() -> anyhow::Result<()> {
        let x = Tensor::randn(0f32, 1f32, (50, 3), &Device::Cpu)?;

        let (mean_full, sd_full) = evaluate_log_likelihoods(&gaussian_llik, &x, &config(50))?;

        for batch_size in [1, 2, 5, 7, 25, 49] {
            let (mean, sd) = evaluate_log_likelihoods(&gaussian_llik, &x, &config(batch_size))?;
            assert_abs_diff_eq!(mean, mean_full, epsilon = 1e-9);
            assert_abs_diff_eq!(sd, sd_full, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_known_statistics() -> anyhow::Result<()> {
        // scores are the inputs themselves: 1, 2, 3, 4
        let x = Tensor::new(&[[1f32], [2.], [3.], [4.]], &Device::Cpu)?;
        let identity = |x: &Tensor| -> anyhow::Result<Tensor> { Ok(x.clone()) };
        let (mean, stderr2) = evaluate_log_likelihoods(&identity, &x, &config(3))?;
        assert_abs_diff_eq!(mean, 2.5, epsilon = 1e-9);
        // population sd = sqrt(1.25)
        assert_abs_diff_eq!(stderr2, 2. * 1.25f64.sqrt() / 2., epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_chunk_calls_in_order() -> anyhow::Result<()> {
        let x = Tensor::zeros((10, 2), DType::F32, &Device::Cpu)?;
        let sizes = RefCell::new(vec![]);
        let record = |x: &Tensor| -> anyhow::Result<Tensor> {
            let n = x.dim(0)?;
            sizes.borrow_mut().push(n);
            Ok(Tensor::zeros(n, DType::F32, x.device())?)
        };
        evaluate_log_likelihoods(&record, &x, &config(3))?;
        assert_eq!(*sizes.borrow(), vec![3, 3, 3, 1]);
        Ok(())
    }

    #[test]
    fn test_error_propagates() -> anyhow::Result<()> {
        let x = Tensor::zeros((10, 2), DType::F32, &Device::Cpu)?;
        let calls = RefCell::new(0);
        let failing = |x: &Tensor| -> anyhow::Result<Tensor> {
            *calls.borrow_mut() += 1;
            if *calls.borrow() == 2 {
                anyhow::bail!("model failure");
            }
            Ok(Tensor::zeros(x.dim(0)?, DType::F32, x.device())?)
        };
        let err = evaluate_log_likelihoods(&failing, &x, &config(4)).unwrap_err();
        assert!(err.to_string().contains("model failure"));
        assert_eq!(*calls.borrow(), 2);
        Ok(())
    }

    #[test]
    fn test_wrong_score_length() -> anyhow::Result<()> {
        let x = Tensor::zeros((6, 2), DType::F32, &Device::Cpu)?;
        let short = |_: &Tensor| -> anyhow::Result<Tensor> {
            Ok(Tensor::zeros(1, DType::F32, &Device::Cpu)?)
        };
        assert!(evaluate_log_likelihoods(&short, &x, &config(3)).is_err());

        let empty = Tensor::zeros((0, 2), DType::F32, &Device::Cpu)?;
        assert!(evaluate_log_likelihoods(&gaussian_llik, &empty, &config(3)).is_err());
        Ok(())
    }
}
