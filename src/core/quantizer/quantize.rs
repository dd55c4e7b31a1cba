//! 최근접 코드워드 양자화와 straight-through 그래디언트

use anyhow::Result;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::codebook::Codebook;
use crate::core::error::{ensure_finite, ensure_shape, PipelineError};

/// 양자화 결과
#[derive(Debug, Clone)]
pub struct Quantized {
    /// `[N][D]`, 각 행은 선택된 코드워드와 정확히 같다
    pub quantized: Array2<f32>,
    /// `[N]`, 값은 항상 `0..K`
    pub indices: Vec<usize>,
}

/// 역전파 결과
#[derive(Debug, Clone)]
pub struct QuantizeGradients {
    /// 잠재 벡터 그래디언트 (`[N][D]`)
    pub latent: Array2<f32>,
    /// 코드북 그래디언트 (`[K][D]`)
    pub codebook: Array2<f32>,
}

#[inline]
fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 한 벡터의 최근접 코드워드 인덱스. 동률이면 가장 작은 인덱스.
pub fn nearest_index(vector: ArrayView1<f32>, codebook: &Codebook) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (k, code) in codebook.vectors().outer_iter().enumerate() {
        let distance = squared_distance(vector, code);
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

/// 각 잠재 벡터를 가장 가까운 코드워드로 대체
pub fn quantize(latent: ArrayView2<f32>, codebook: &Codebook) -> Result<Quantized> {
    let (count, dim) = latent.dim();
    ensure_shape("quantize latent", &[count, dim], &[count, codebook.dim()])?;
    ensure_finite("quantize latent", &latent)?;

    let indices: Vec<usize> = latent
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| nearest_index(row, codebook))
        .collect();

    Ok(Quantized {
        quantized: codebook.gather(&indices),
        indices,
    })
}

/// straight-through: 양자화 출력의 그래디언트를 그대로 잠재 벡터로 전달
pub fn straight_through(d_quantized: ArrayView2<f32>) -> Array2<f32> {
    d_quantized.to_owned()
}

/// gather의 역: 같은 인덱스를 고른 행들의 그래디언트를 해당 코드워드에 누적
pub fn scatter_codebook_gradient(
    d_code: ArrayView2<f32>,
    indices: &[usize],
    codebook_size: usize,
) -> Result<Array2<f32>> {
    let (count, dim) = d_code.dim();
    if indices.len() != count {
        return Err(PipelineError::shape("codebook gradient indices", &[count], &[indices.len()]).into());
    }

    let mut grad = Array2::<f32>::zeros((codebook_size, dim));
    for (row, &k) in d_code.outer_iter().zip(indices.iter()) {
        if k >= codebook_size {
            return Err(PipelineError::shape("codebook gradient index", &[codebook_size], &[k]).into());
        }
        let mut target = grad.row_mut(k);
        target += &row;
    }
    Ok(grad)
}

/// 양자화 출력을 하나의 텐서로 다루는 호출자를 위한 결합 역전파
pub fn backward(
    d_quantized: ArrayView2<f32>,
    indices: &[usize],
    codebook_size: usize,
) -> Result<QuantizeGradients> {
    Ok(QuantizeGradients {
        latent: straight_through(d_quantized),
        codebook: scatter_codebook_gradient(d_quantized, indices, codebook_size)?,
    })
}
