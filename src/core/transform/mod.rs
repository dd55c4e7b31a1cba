//! 인코드/디코드 변환 - 학습된 네트워크 등 외부 구현을 주입받는 능력 인터페이스
//!
//! 디코드는 공간 해상도를 정확히 2배로 만들어야 하고, 인코드는 고해상도 입력의 2×2 블록마다
//! 잠재 벡터 하나를 만든다. 두 계약은 `checked_encode`/`checked_decode`가 검증한다.

pub mod residual;


pub use residual::{LanczosResidualTransform, RESIDUAL_DIMS};

use anyhow::Result;
use ndarray::ArrayView3;

use crate::core::error::{ensure_finite, ensure_shape};
use crate::core::types::{LatentMap, LinearImage, CHANNELS, SCALE_FACTOR};

/// 순전파 변환
pub trait Transform: Send + Sync {
    /// 잠재 벡터 차원 (D)
    fn latent_dim(&self) -> usize;

    /// `[H][W][4]` 선형 이미지 → `[H/2][W/2][D]` 잠재 맵
    fn encode(&self, large: ArrayView3<f32>) -> Result<LatentMap>;

    /// `[h][w][4]` 축소 이미지 + `[h][w][D]` 잠재 맵 → `[2h][2w][4]` 선형 이미지
    fn decode(&self, small: ArrayView3<f32>, latent: ArrayView3<f32>) -> Result<LinearImage>;
}

/// 학습 가능한 변환. 파라미터 갱신 방식은 구현체가 정한다.
pub trait TrainableTransform: Transform {
    /// 디코드 출력 그래디언트 → 잠재 입력 그래디언트
    fn decode_backward(
        &self,
        small: ArrayView3<f32>,
        latent: ArrayView3<f32>,
        d_output: ArrayView3<f32>,
    ) -> Result<LatentMap>;

    /// 잠재 맵 그래디언트로 인코더 파라미터를 한 스텝 갱신
    fn apply_encoder_gradient(&mut self, _large: ArrayView3<f32>, _d_latent: ArrayView3<f32>) -> Result<()> {
        Ok(())
    }
}

/// 인코드 후 shape/유한성 검사
pub fn checked_encode<T: Transform + ?Sized>(transform: &T, large: ArrayView3<f32>) -> Result<LatentMap> {
    let (height, width, _) = large.dim();
    let latent = transform.encode(large)?;
    ensure_shape(
        "transform encode",
        latent.shape(),
        &[height / SCALE_FACTOR, width / SCALE_FACTOR, transform.latent_dim()],
    )?;
    ensure_finite("transform encode", &latent)?;
    Ok(latent)
}

/// 디코드 전후 shape/유한성 검사
pub fn checked_decode<T: Transform + ?Sized>(
    transform: &T,
    small: ArrayView3<f32>,
    latent: ArrayView3<f32>,
) -> Result<LinearImage> {
    let (height, width, _) = small.dim();
    ensure_shape("transform decode input", small.shape(), &[height, width, CHANNELS])?;
    ensure_shape(
        "transform decode latent",
        latent.shape(),
        &[height, width, transform.latent_dim()],
    )?;

    let output = transform.decode(small, latent)?;
    ensure_shape(
        "transform decode output",
        output.shape(),
        &[height * SCALE_FACTOR, width * SCALE_FACTOR, CHANNELS],
    )?;
    ensure_finite("transform decode output", &output)?;
    Ok(output)
}
