pub mod candle_batch_chunks;
pub mod candle_classification_report;
pub mod candle_data_loader;
pub mod candle_data_loader_util;
pub mod candle_fid_data;
pub mod candle_image_grid;
pub mod candle_inference;
pub mod candle_llik_eval;
pub mod candle_model_traits;
pub mod candle_mpe_completion;
pub mod candle_random_state;
pub mod candle_routines;
pub mod candle_sampler;

pub use candle_core;
pub use candle_nn;
