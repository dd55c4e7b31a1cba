//! # 핵심 파이프라인
//!
//! 색 공간 변환, 리샘플링, 양자화, 변환 인터페이스, 타일 추론, 학습 루프

pub mod color;
pub mod config;
pub mod error;
pub mod optimizers;
pub mod quantizer;
pub mod resample;
pub mod tiling;
pub mod training;
pub mod transform;
pub mod types;

// 주요 타입들 재수출
pub use color::{to_encoded, to_linear};
pub use config::{GansrConfig, LossWeights, QuantizerConfig, TileConfig, TrainingConfig};
pub use error::{is_transient, PipelineError};
pub use optimizers::AdamState;
pub use quantizer::{quantize, Codebook, Quantized};
pub use resample::{LanczosFilter, Padding};
pub use tiling::{partition, stitch, TileProcessor};
pub use training::{Checkpoint, CheckpointStore, ImageStream, LossTerms, Trainer};
pub use transform::{LanczosResidualTransform, TrainableTransform, Transform};
pub use types::*;
