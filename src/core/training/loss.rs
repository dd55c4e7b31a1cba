//! 재구성 오차와 두 커밋먼트 항

use std::ops::AddAssign;

use anyhow::Result;
use ndarray::{Array, ArrayView, Dimension};
use serde::{Deserialize, Serialize};

use crate::core::config::LossWeights;
use crate::core::error::{ensure_shape, PipelineError};

/// 가중치가 적용된 손실 항
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossTerms {
    /// `w_r · mean((real - decoded)²)`
    pub reconstruction: f32,
    /// `w_c · mean((sg(latent) - code)²)`, 코드북으로 흐름
    pub codebook_commitment: f32,
    /// `w_e · mean((latent - sg(code))²)`, 잠재 벡터로 흐름
    pub encoder_commitment: f32,
}

impl LossTerms {
    pub fn total(&self) -> f32 {
        self.reconstruction + self.codebook_commitment + self.encoder_commitment
    }

    pub fn is_finite(&self) -> bool {
        self.reconstruction.is_finite()
            && self.codebook_commitment.is_finite()
            && self.encoder_commitment.is_finite()
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            reconstruction: self.reconstruction * factor,
            codebook_commitment: self.codebook_commitment * factor,
            encoder_commitment: self.encoder_commitment * factor,
        }
    }

    /// 한 샘플의 세 항. 커밋먼트 항은 같은 식을 서로 다른 쪽에 그래디언트를 흘리는 용도로 쓴다.
    pub fn evaluate<D: Dimension, E: Dimension>(
        weights: &LossWeights,
        real: ArrayView<f32, D>,
        decoded: ArrayView<f32, D>,
        latent: ArrayView<f32, E>,
        code: ArrayView<f32, E>,
    ) -> Result<Self> {
        let reconstruction = mean_squared_error("reconstruction loss", real, decoded)?;
        let commitment = mean_squared_error("commitment loss", latent, code)?;
        Ok(Self {
            reconstruction: weights.reconstruction * reconstruction,
            codebook_commitment: weights.codebook_commitment * commitment,
            encoder_commitment: weights.encoder_commitment * commitment,
        })
    }
}

impl AddAssign for LossTerms {
    fn add_assign(&mut self, other: Self) {
        self.reconstruction += other.reconstruction;
        self.codebook_commitment += other.codebook_commitment;
        self.encoder_commitment += other.encoder_commitment;
    }
}

/// `mean((target - prediction)²)`
pub fn mean_squared_error<D: Dimension>(
    context: &str,
    target: ArrayView<f32, D>,
    prediction: ArrayView<f32, D>,
) -> Result<f32> {
    ensure_shape(context, prediction.shape(), target.shape())?;
    if target.is_empty() {
        return Err(PipelineError::shape(context, &[1], &[0]).into());
    }
    let sum: f32 = target
        .iter()
        .zip(prediction.iter())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / target.len() as f32)
}

/// `scale · mean((target - prediction)²)`의 prediction에 대한 그래디언트
pub fn mean_squared_error_gradient<D: Dimension>(
    context: &str,
    target: ArrayView<f32, D>,
    prediction: ArrayView<f32, D>,
    scale: f32,
) -> Result<Array<f32, D>> {
    ensure_shape(context, prediction.shape(), target.shape())?;
    if target.is_empty() {
        return Err(PipelineError::shape(context, &[1], &[0]).into());
    }
    let factor = 2.0 * scale / target.len() as f32;
    Ok((&prediction - &target) * factor)
}
