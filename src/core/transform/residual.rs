//! 학습 파라미터 없는 기본 변환: Lanczos 확대 + 2×2 잔차 블록
//!
//! 인코더는 `원본 - 확대(축소(원본))` 잔차를 2×2×4 블록 단위로 잠재 벡터 앞 16차원에
//! 담는다. 디코더는 확대 결과에 잠재 벡터의 잔차를 되돌려 더한다. 잠재 벡터가 코드북으로
//! 양자화되면 코드북이 자주 나오는 잔차 패턴을 학습하게 된다.

use anyhow::{bail, Result};
use ndarray::{Array3, ArrayView3};

use super::{TrainableTransform, Transform};
use crate::core::error::ensure_shape;
use crate::core::resample::{LanczosFilter, Padding};
use crate::core::types::{LatentMap, LinearImage, CHANNELS, SCALE_FACTOR};

/// 잔차 블록이 차지하는 잠재 차원 수 (2 × 2 × 4)
pub const RESIDUAL_DIMS: usize = SCALE_FACTOR * SCALE_FACTOR * CHANNELS;

#[derive(Debug, Clone)]
pub struct LanczosResidualTransform {
    filter: LanczosFilter,
    latent_dim: usize,
}

#[inline]
fn slot(dy: usize, dx: usize, c: usize) -> usize {
    (dy * SCALE_FACTOR + dx) * CHANNELS + c
}

impl LanczosResidualTransform {
    pub fn new(latent_dim: usize) -> Result<Self> {
        if latent_dim < RESIDUAL_DIMS {
            bail!(
                "Latent dimension {} is too small for {} residual samples",
                latent_dim,
                RESIDUAL_DIMS
            );
        }
        Ok(Self {
            filter: LanczosFilter::new(),
            latent_dim,
        })
    }

    pub fn filter(&self) -> &LanczosFilter {
        &self.filter
    }

    /// `[2h][2w][4]` 잔차 → `[h][w][D]` 잠재 맵
    fn pack_blocks(&self, residual: ArrayView3<f32>) -> LatentMap {
        let (height, width, _) = residual.dim();
        let (h, w) = (height / SCALE_FACTOR, width / SCALE_FACTOR);
        let mut latent = LatentMap::zeros((h, w, self.latent_dim));
        for i in 0..h {
            for j in 0..w {
                for dy in 0..SCALE_FACTOR {
                    for dx in 0..SCALE_FACTOR {
                        for c in 0..CHANNELS {
                            latent[[i, j, slot(dy, dx, c)]] =
                                residual[[i * SCALE_FACTOR + dy, j * SCALE_FACTOR + dx, c]];
                        }
                    }
                }
            }
        }
        latent
    }

    /// `target[2i+dy][2j+dx][c] += latent[i][j][slot]`
    fn unpack_blocks(latent: ArrayView3<f32>, target: &mut Array3<f32>) {
        let (h, w, _) = latent.dim();
        for i in 0..h {
            for j in 0..w {
                for dy in 0..SCALE_FACTOR {
                    for dx in 0..SCALE_FACTOR {
                        for c in 0..CHANNELS {
                            target[[i * SCALE_FACTOR + dy, j * SCALE_FACTOR + dx, c]] +=
                                latent[[i, j, slot(dy, dx, c)]];
                        }
                    }
                }
            }
        }
    }
}

impl Transform for LanczosResidualTransform {
    fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    fn encode(&self, large: ArrayView3<f32>) -> Result<LatentMap> {
        let (height, width, channels) = large.dim();
        let even = [
            height - height % SCALE_FACTOR,
            width - width % SCALE_FACTOR,
            CHANNELS,
        ];
        ensure_shape("residual encode", &[height, width, channels], &even)?;

        let small = self.filter.downscale(large, Padding::Same)?;
        let upscaled = self.filter.upscale(small.view())?;
        let residual = &large - &upscaled;
        Ok(self.pack_blocks(residual.view()))
    }

    fn decode(&self, small: ArrayView3<f32>, latent: ArrayView3<f32>) -> Result<LinearImage> {
        let (h, w, _) = small.dim();
        ensure_shape("residual decode latent", latent.shape(), &[h, w, self.latent_dim])?;

        let mut output = self.filter.upscale(small)?;
        Self::unpack_blocks(latent, &mut output);
        Ok(output)
    }
}

impl TrainableTransform for LanczosResidualTransform {
    fn decode_backward(
        &self,
        small: ArrayView3<f32>,
        latent: ArrayView3<f32>,
        d_output: ArrayView3<f32>,
    ) -> Result<LatentMap> {
        let (h, w, _) = small.dim();
        ensure_shape("residual backward latent", latent.shape(), &[h, w, self.latent_dim])?;
        ensure_shape(
            "residual backward gradient",
            d_output.shape(),
            &[h * SCALE_FACTOR, w * SCALE_FACTOR, CHANNELS],
        )?;
        // 출력은 잔차 슬롯에 대해 선형이므로 그래디언트는 같은 슬롯으로 그대로 모인다
        Ok(self.pack_blocks(d_output))
    }
}
