//! 학습되는 코드북 (K개의 D차원 코드워드)

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// 코드북. 학습 스텝만이 값을 수정한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    vectors: Array2<f32>,
}

impl Codebook {
    /// `[K][D]` 행렬로 생성
    pub fn new(vectors: Array2<f32>) -> Result<Self> {
        let (size, dim) = vectors.dim();
        if size == 0 || dim == 0 {
            bail!("Codebook must have at least one codeword of non-zero dimension, got {}x{}", size, dim);
        }
        if vectors.iter().any(|v| !v.is_finite()) {
            bail!("Codebook contains non-finite values");
        }
        Ok(Self { vectors })
    }

    /// 표준 정규분포로 초기화
    pub fn random_normal<R: Rng + ?Sized>(size: usize, dim: usize, rng: &mut R) -> Result<Self> {
        let vectors = Array2::from_shape_simple_fn((size, dim), || rng.sample::<f32, _>(StandardNormal));
        Self::new(vectors)
    }

    /// 코드워드 개수 (K)
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    /// 코드워드 차원 (D)
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> ArrayView2<f32> {
        self.vectors.view()
    }

    /// 옵티마이저 전용 가변 접근
    pub fn vectors_mut(&mut self) -> ArrayViewMut2<f32> {
        self.vectors.view_mut()
    }

    pub fn entry(&self, index: usize) -> ArrayView1<f32> {
        self.vectors.row(index)
    }

    /// 인덱스별 코드워드를 모은다 (`quantized[n] = codebook[index[n]]`)
    pub fn gather(&self, indices: &[usize]) -> Array2<f32> {
        self.vectors.select(Axis(0), indices)
    }

    /// 공간 위치마다 코드워드를 균일하게 뽑는다. 인코더 입력이 없는 추론에서 사용.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> (Array2<f32>, Vec<usize>) {
        let indices: Vec<usize> = (0..count).map(|_| rng.gen_range(0..self.len())).collect();
        (self.gather(&indices), indices)
    }

    /// 차원별 표준편차의 평균 (코드워드 분산 요약값)
    pub fn spread(&self) -> f32 {
        mean_axis_std(self.vectors.view())
    }
}

/// 행 방향 표준편차를 열마다 구해 평균낸다
pub fn mean_axis_std(values: ArrayView2<f32>) -> f32 {
    if values.nrows() == 0 || values.ncols() == 0 {
        return 0.0;
    }
    let std = values.std_axis(Axis(0), 0.0);
    std.mean().unwrap_or(0.0)
}
