use crate::candle_data_loader::DatasetT;

use anyhow::bail;
use candle_core::{Device, Tensor};

/// Anything that can hand out contiguous chunks of samples
pub trait BatchSourceT {
    fn num_samples(&self) -> usize;

    /// Samples `[lb, ub)` stacked along the leading axis, moved to
    /// `target_device`
    fn take_lb_ub(&self, lb: usize, ub: usize, target_device: &Device) -> anyhow::Result<Tensor>;
}

fn check_lb_ub(lb: usize, ub: usize, ntot: usize) -> anyhow::Result<()> {
    if lb >= ub || ub > ntot {
        bail!("check lb {}, ub {} vs. ntot {}", lb, ub, ntot);
    }
    Ok(())
}

impl BatchSourceT for Tensor {
    fn num_samples(&self) -> usize {
        self.dims().first().copied().unwrap_or(0)
    }

    fn take_lb_ub(&self, lb: usize, ub: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        check_lb_ub(lb, ub, self.num_samples())?;
        Ok(self.narrow(0, lb, ub - lb)?.to_device(target_device)?)
    }
}

/// Read a `DatasetT` chunk by chunk
pub struct DatasetBatches<'a, D>
where
    D: DatasetT,
{
    data: &'a D,
}

impl<'a, D> DatasetBatches<'a, D>
where
    D: DatasetT,
{
    pub fn new(data: &'a D) -> Self {
        Self { data }
    }
}

impl<D> BatchSourceT for DatasetBatches<'_, D>
where
    D: DatasetT,
{
    fn num_samples(&self) -> usize {
        self.data.len()
    }

    fn take_lb_ub(&self, lb: usize, ub: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        check_lb_ub(lb, ub, self.num_samples())?;
        let indices = (lb..ub).collect::<Vec<_>>();
        Ok(self.data.stack(&indices)?.to_device(target_device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle_data_loader::InMemoryData;

    #[test]
    fn test_tensor_and_dataset_agree() -> anyhow::Result<()> {
        let x = Tensor::arange(0f32, 20., &Device::Cpu)?.reshape((10, 2))?;
        let data = InMemoryData::from_tensor(&x)?;
        let batches = DatasetBatches::new(&data);

        assert_eq!(x.num_samples(), 10);
        assert_eq!(batches.num_samples(), 10);

        let a = x.take_lb_ub(3, 7, &Device::Cpu)?;
        let b = batches.take_lb_ub(3, 7, &Device::Cpu)?;
        assert_eq!(a.to_vec2::<f32>()?, b.to_vec2::<f32>()?);
        assert_eq!(a.dims(), &[4, 2]);
        Ok(())
    }

    #[test]
    fn test_bad_bounds() -> anyhow::Result<()> {
        let x = Tensor::arange(0f32, 5., &Device::Cpu)?;
        assert!(x.take_lb_ub(3, 3, &Device::Cpu).is_err());
        assert!(x.take_lb_ub(2, 6, &Device::Cpu).is_err());
        Ok(())
    }
}
