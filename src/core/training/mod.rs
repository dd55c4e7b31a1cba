//! # 코드북 학습
//!
//! 이미지 스트림에서 크롭을 뽑아 인코드 → 양자화 → 디코드 후 손실을 계산하고,
//! Adam으로 코드북을 갱신한다. 일시적 수치 오류가 난 배치는 버리고 다시 뽑는다.

pub mod checkpoint;
pub mod data;
pub mod loss;
pub mod trainer;

#[cfg(test)]
mod __tests__;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use data::{
    list_images, prepare_batch, prepare_sample, random_crop, ImageStream, TrainingBatch, TrainingSample,
    CONTEXT_BORDER,
};
pub use loss::{mean_squared_error, mean_squared_error_gradient, LossTerms};
pub use trainer::{RoundSummary, StepReport, Trainer};
