use candle_core::Device;
use indicatif::{ProgressBar, ProgressDrawTarget};

pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub patience: Option<usize>,
    pub device: Device,
    pub verbose: bool,
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 100,
            num_epochs: 100,
            patience: Some(5),
            device: Device::Cpu,
            verbose: false,
            show_progress: false,
        }
    }
}

/// Settings for chunked evaluation
pub struct EvalConfig {
    /// maximum number of samples per model call
    pub batch_size: usize,
    /// where each chunk is moved before the model call
    pub device: Device,
    pub show_progress: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            batch_size: 2048,
            device: Device::Cpu,
            show_progress: false,
        }
    }
}

impl From<&TrainConfig> for EvalConfig {
    fn from(train_config: &TrainConfig) -> Self {
        Self {
            batch_size: train_config.batch_size,
            device: train_config.device.clone(),
            show_progress: train_config.show_progress,
        }
    }
}

pub(crate) fn chunk_progress_bar(num_chunks: usize, show_progress: bool) -> ProgressBar {
    let pb = ProgressBar::new(num_chunks as u64);
    if !show_progress {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}
