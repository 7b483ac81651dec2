use crate::candle_data_loader::DatasetT;
use crate::candle_inference::TrainConfig;

use candle_core::{Device, Tensor};
use std::ops::{Deref, DerefMut};

pub trait LogLikelihoodT {
    /// Per-sample log-likelihood
    ///
    /// * `x_nd` - input data (n x ...)
    ///
    /// # Returns `llik_n` of shape `(n,)` or `(n, 1)`
    fn log_likelihood(&self, x_nd: &Tensor) -> anyhow::Result<Tensor>;
}

pub trait SampleT {
    /// Draw `num_samples` samples, stacked along the leading axis
    fn sample(&self, num_samples: usize) -> anyhow::Result<Tensor>;
}

pub trait MpeT {
    /// Most probable explanation of `x_nd`; `NaN` entries are treated
    /// as missing and get filled in. Same shape as the input.
    fn mpe(&self, x_nd: &Tensor) -> anyhow::Result<Tensor>;
}

pub trait ClassifierT {
    /// Unnormalized class scores (n x classes)
    fn logits(&self, x_nd: &Tensor) -> anyhow::Result<Tensor>;
}

/// Mode and placement of a model
pub trait ModelStateT {
    fn is_training(&self) -> bool;

    fn set_training(&mut self, train: bool);

    fn to_device(&mut self, device: &Device) -> anyhow::Result<()>;
}

/// Training routine provided by the model itself
pub trait FitT<D>
where
    D: DatasetT,
{
    /// Fit the model and return the per-epoch loss trace
    fn fit(&mut self, train: &D, valid: &D, train_config: &TrainConfig) -> anyhow::Result<Vec<f32>>;
}

///
/// Puts a model in evaluation mode for as long as the guard lives;
/// the previous mode comes back on drop, whichever way the scope is
/// left.
///
pub struct EvalModeGuard<'a, M>
where
    M: ModelStateT + ?Sized,
{
    model: &'a mut M,
    was_training: bool,
}

impl<'a, M> EvalModeGuard<'a, M>
where
    M: ModelStateT + ?Sized,
{
    pub fn new(model: &'a mut M) -> Self {
        let was_training = model.is_training();
        model.set_training(false);
        Self {
            model,
            was_training,
        }
    }
}

impl<M> Deref for EvalModeGuard<'_, M>
where
    M: ModelStateT + ?Sized,
{
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M> DerefMut for EvalModeGuard<'_, M>
where
    M: ModelStateT + ?Sized,
{
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M> Drop for EvalModeGuard<'_, M>
where
    M: ModelStateT + ?Sized,
{
    fn drop(&mut self) {
        self.model.set_training(self.was_training);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag {
        training: bool,
        seen: Vec<bool>,
    }

    impl ModelStateT for Flag {
        fn is_training(&self) -> bool {
            self.training
        }

        fn set_training(&mut self, train: bool) {
            self.training = train;
            self.seen.push(train);
        }

        fn to_device(&mut self, _device: &Device) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn failing_eval(model: &mut Flag) -> anyhow::Result<()> {
        let guard = EvalModeGuard::new(model);
        assert!(!guard.is_training());
        anyhow::bail!("inference failed")
    }

    #[test]
    fn test_restores_training_mode() {
        let mut model = Flag {
            training: true,
            seen: vec![],
        };
        {
            let guard = EvalModeGuard::new(&mut model);
            assert!(!guard.is_training());
        }
        assert!(model.training);
        assert_eq!(model.seen, vec![false, true]);
    }

    #[test]
    fn test_restores_on_error() {
        let mut model = Flag {
            training: true,
            seen: vec![],
        };
        assert!(failing_eval(&mut model).is_err());
        assert!(model.training);
    }

    #[test]
    fn test_keeps_eval_mode() {
        let mut model = Flag {
            training: false,
            seen: vec![],
        };
        drop(EvalModeGuard::new(&mut model));
        assert!(!model.training);
    }
}
