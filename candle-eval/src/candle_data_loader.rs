use anyhow::{anyhow, bail};
use candle_core::{Device, Tensor};
use nalgebra::DMatrix;
use ndarray::Array2;
use rayon::prelude::*;

/// Fixed-length, integer-indexable collection of samples
pub trait DatasetT {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One sample without the leading sample axis, e.g., `(C, H, W)`
    fn get(&self, idx: usize) -> anyhow::Result<Tensor>;

    /// Shape of each sample, e.g., `[channels, height, width]`
    fn features_shape(&self) -> &[usize];

    /// Stack the samples at `indices` along a new leading axis
    fn stack(&self, indices: &[usize]) -> anyhow::Result<Tensor> {
        if indices.is_empty() {
            bail!("cannot stack an empty set of samples");
        }
        let chunk = indices
            .iter()
            .map(|&i| self.get(i))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Tensor::stack(&chunk, 0)?)
    }
}

/// A dataset with one class label per sample
pub trait LabelledDataT: DatasetT {
    fn label(&self, idx: usize) -> anyhow::Result<usize>;
}

///
/// A simple in-memory dataset. Each sample is kept as its own
/// tensor; optional class labels go along with them.
///
pub struct InMemoryData {
    samples: Vec<Tensor>,
    labels: Option<Vec<usize>>,
    features_shape: Vec<usize>,
}

impl InMemoryData {
    ///
    /// Create a dataset from the rows of `data`; each row becomes a
    /// flat feature vector
    ///
    pub fn new<D>(data: &D) -> anyhow::Result<Self>
    where
        D: RowsToTensorVec,
    {
        let rows = data.rows_to_tensor_vec()?;
        let samples = rows
            .into_iter()
            .map(|r| r.squeeze(0))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let features_shape = samples
            .first()
            .map(|x| x.dims().to_vec())
            .unwrap_or_default();

        Ok(InMemoryData {
            samples,
            labels: None,
            features_shape,
        })
    }

    ///
    /// Create a dataset from a tensor whose leading axis runs over
    /// samples, e.g., `(n, C, H, W)` images
    ///
    pub fn from_tensor(x: &Tensor) -> anyhow::Result<Self> {
        let dims = x.dims();
        if dims.is_empty() {
            bail!("need at least one sample axis");
        }
        let samples = (0..dims[0])
            .map(|i| x.get(i))
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(InMemoryData {
            samples,
            labels: None,
            features_shape: dims[1..].to_vec(),
        })
    }

    /// Attach one class label per sample
    pub fn with_labels(mut self, labels: Vec<usize>) -> anyhow::Result<Self> {
        if labels.len() != self.samples.len() {
            bail!(
                "{} labels vs. {} samples",
                labels.len(),
                self.samples.len()
            );
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Move every sample to `device`
    pub fn to_device(&self, device: &Device) -> anyhow::Result<Self> {
        let samples = self
            .samples
            .iter()
            .map(|x| x.to_device(device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(InMemoryData {
            samples,
            labels: self.labels.clone(),
            features_shape: self.features_shape.clone(),
        })
    }
}

impl DatasetT for InMemoryData {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, idx: usize) -> anyhow::Result<Tensor> {
        self.samples.get(idx).cloned().ok_or_else(|| {
            anyhow!("invalid index = {} vs. total # = {}", idx, self.len())
        })
    }

    fn features_shape(&self) -> &[usize] {
        &self.features_shape
    }
}

impl LabelledDataT for InMemoryData {
    fn label(&self, idx: usize) -> anyhow::Result<usize> {
        let labels = self
            .labels
            .as_ref()
            .ok_or_else(|| anyhow!("this dataset has no labels"))?;
        labels
            .get(idx)
            .copied()
            .ok_or_else(|| anyhow!("invalid index = {} vs. total # = {}", idx, labels.len()))
    }
}

///
/// A view of `data` restricted to `indices`. Nothing is copied;
/// the `i`-th sample of the subset is `data[indices[i]]`.
///
pub struct SubsetData<'a, D>
where
    D: DatasetT,
{
    data: &'a D,
    indices: Vec<usize>,
}

impl<'a, D> SubsetData<'a, D>
where
    D: DatasetT,
{
    pub fn new(data: &'a D, indices: Vec<usize>) -> anyhow::Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= data.len()) {
            bail!("invalid index = {} vs. total # = {}", bad, data.len());
        }
        Ok(Self { data, indices })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl<D> DatasetT for SubsetData<'_, D>
where
    D: DatasetT,
{
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, idx: usize) -> anyhow::Result<Tensor> {
        let &j = self.indices.get(idx).ok_or_else(|| {
            anyhow!("invalid index = {} vs. total # = {}", idx, self.len())
        })?;
        self.data.get(j)
    }

    fn features_shape(&self) -> &[usize] {
        self.data.features_shape()
    }
}

impl<D> LabelledDataT for SubsetData<'_, D>
where
    D: LabelledDataT,
{
    fn label(&self, idx: usize) -> anyhow::Result<usize> {
        let &j = self.indices.get(idx).ok_or_else(|| {
            anyhow!("invalid index = {} vs. total # = {}", idx, self.len())
        })?;
        self.data.label(j)
    }
}

///
/// Convert rows of a matrix to a vector of `1 x d` `Tensor`s
///
pub trait RowsToTensorVec {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>>;
}

impl RowsToTensorVec for Array2<f32> {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>> {
        let mut idx_data = self
            .axis_iter(ndarray::Axis(0))
            .enumerate()
            .par_bridge()
            .map(|(i, row)| -> anyhow::Result<(usize, Tensor)> {
                let v = Tensor::from_iter(row.iter().copied(), &Device::Cpu)?
                    .reshape((1, row.len()))?;
                Ok((i, v))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        idx_data.sort_by_key(|(i, _)| *i);
        Ok(idx_data.into_iter().map(|(_, t)| t).collect())
    }
}

impl RowsToTensorVec for DMatrix<f32> {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>> {
        let mut idx_data = self
            .row_iter()
            .enumerate()
            .par_bridge()
            .map(|(i, row)| -> anyhow::Result<(usize, Tensor)> {
                let v = Tensor::from_iter(row.iter().copied(), &Device::Cpu)?
                    .reshape((1, row.len()))?;
                Ok((i, v))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        idx_data.sort_by_key(|(i, _)| *i);
        Ok(idx_data.into_iter().map(|(_, t)| t).collect())
    }
}

impl RowsToTensorVec for Tensor {
    fn rows_to_tensor_vec(&self) -> anyhow::Result<Vec<Tensor>> {
        let (nrows, _) = self.dims2()?;
        Ok((0..nrows)
            .map(|i| self.narrow(0, i, 1))
            .collect::<candle_core::Result<Vec<_>>>()?)
    }
}
