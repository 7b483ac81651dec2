use crate::candle_batch_chunks::batch_chunks;
use crate::candle_classification_report::ClassificationReport;
use crate::candle_data_loader::{DatasetT, LabelledDataT};
use crate::candle_data_loader_util::{BatchSourceT, DatasetBatches};
use crate::candle_inference::{chunk_progress_bar, EvalConfig, TrainConfig};
use crate::candle_llik_eval::evaluate_model_log_likelihoods;
use crate::candle_model_traits::{ClassifierT, EvalModeGuard, FitT, LogLikelihoodT, ModelStateT};

use anyhow::bail;
use candle_core::{DType, Tensor};
use log::{debug, info};

///
/// Average test log-likelihood with two standard errors
///
/// * `model` - evaluated in evaluation mode, previous mode restored
/// * `data` - test data
/// * `config` - chunk size and device
///
pub fn test_generative<M, D>(model: &mut M, data: &D, config: &EvalConfig) -> anyhow::Result<(f64, f64)>
where
    M: LogLikelihoodT + ModelStateT + ?Sized,
    D: DatasetT,
{
    let model = EvalModeGuard::new(model);
    let (mean, stderr2) = evaluate_model_log_likelihoods(&*model, &DatasetBatches::new(data), config)?;
    info!("test log-likelihood: {:.4} +/- {:.4}", mean, stderr2);
    Ok((mean, stderr2))
}

///
/// Average test negative log-likelihood (cross entropy) and a
/// classification report of the argmax predictions
///
/// * `model` - evaluated in evaluation mode, previous mode restored
/// * `data` - labelled test data
/// * `config` - chunk size and device
///
pub fn test_discriminative<M, D>(
    model: &mut M,
    data: &D,
    config: &EvalConfig,
) -> anyhow::Result<(f64, ClassificationReport)>
where
    M: ClassifierT + ModelStateT + ?Sized,
    D: LabelledDataT,
{
    let model = EvalModeGuard::new(model);
    let batches = DatasetBatches::new(data);

    let ntot = batches.num_samples();
    if ntot == 0 {
        bail!("no samples to evaluate");
    }

    let chunks = batch_chunks(ntot, config.batch_size)?;
    let pb = chunk_progress_bar(chunks.len(), config.show_progress);

    let mut nll_tot = 0_f64;
    let mut y_true = Vec::with_capacity(ntot);
    let mut y_pred = Vec::with_capacity(ntot);

    for chunk in chunks.iter() {
        let x = batches.take_lb_ub(chunk.lb, chunk.ub, &config.device)?;
        let labels = chunk
            .as_range()
            .map(|i| data.label(i))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let logits = model.logits(&x)?.to_dtype(DType::F32)?;
        let (nb, nclass) = logits.dims2()?;
        if nb != chunk.len() {
            bail!("{} predictions for {} samples", nb, chunk.len());
        }
        if let Some(&bad) = labels.iter().find(|&&k| k >= nclass) {
            bail!("label {} out of {} classes", bad, nclass);
        }

        let target = Tensor::from_iter(labels.iter().map(|&k| k as u32), logits.device())?;
        let nll = candle_nn::loss::cross_entropy(&logits, &target)?.to_scalar::<f32>()?;
        nll_tot += nll as f64 * nb as f64;

        let pred = logits.argmax(1)?.to_vec1::<u32>()?;
        y_pred.extend(pred.into_iter().map(|k| k as usize));
        y_true.extend(labels);

        debug!("classified [{}, {})", chunk.lb, chunk.ub);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let nll = nll_tot / ntot as f64;
    let report = ClassificationReport::from_labels(&y_true, &y_pred)?;
    info!(
        "test negative log-likelihood: {:.4}, accuracy: {:.4}",
        nll, report.accuracy
    );
    Ok((nll, report))
}

fn log_fit_trace(trace: &[f32], train_config: &TrainConfig) {
    if let Some(last) = trace.last() {
        info!("trained {} epochs, last loss: {}", trace.len(), last);
    }
    if train_config.verbose {
        for (epoch, loss) in trace.iter().enumerate() {
            info!("[{}] loss: {}", epoch + 1, loss);
        }
    }
}

///
/// Train the model, then report the test log-likelihood
///
/// # Returns `(mean, 2 * sd / sqrt(n))` of the test log-likelihood
///
pub fn collect_results_generative<M, D>(
    model: &mut M,
    data_train: &D,
    data_valid: &D,
    data_test: &D,
    train_config: &TrainConfig,
) -> anyhow::Result<(f64, f64)>
where
    M: FitT<D> + LogLikelihoodT + ModelStateT,
    D: DatasetT,
{
    let trace = model.fit(data_train, data_valid, train_config)?;
    log_fit_trace(&trace, train_config);
    test_generative(model, data_test, &EvalConfig::from(train_config))
}

///
/// Train the model, then classify the test data
///
/// # Returns `(test negative log-likelihood, classification report)`
///
pub fn collect_results_discriminative<M, D>(
    model: &mut M,
    data_train: &D,
    data_valid: &D,
    data_test: &D,
    train_config: &TrainConfig,
) -> anyhow::Result<(f64, ClassificationReport)>
where
    M: FitT<D> + ClassifierT + ModelStateT,
    D: LabelledDataT,
{
    let trace = model.fit(data_train, data_valid, train_config)?;
    log_fit_trace(&trace, train_config);
    test_discriminative(model, data_test, &EvalConfig::from(train_config))
}
