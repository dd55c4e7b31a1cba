use anyhow::Result;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

use crate::core::error::ensure_shape;

/// 원소별 Adam 최적화기 상태 (코드북 행렬용)
#[derive(Debug, Clone)]
pub struct AdamState {
    pub m: Array2<f32>, // 1차 모멘트
    pub v: Array2<f32>, // 2차 모멘트
    pub t: i32,         // 시간 스텝
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub learning_rate: f32,
}

impl AdamState {
    pub fn new(shape: (usize, usize), learning_rate: f32) -> Self {
        Self::with_config(shape, learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_config(shape: (usize, usize), learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            m: Array2::zeros(shape),
            v: Array2::zeros(shape),
            t: 0,
            beta1,
            beta2,
            epsilon,
            learning_rate,
        }
    }

    /// Adam 업데이트 수행
    pub fn update(&mut self, mut params: ArrayViewMut2<f32>, gradient: ArrayView2<f32>) -> Result<()> {
        ensure_shape("adam params", params.shape(), self.m.shape())?;
        ensure_shape("adam gradient", gradient.shape(), self.m.shape())?;

        self.t += 1;
        let (beta1, beta2, epsilon, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);

        // 편향 보정 계수
        let bias1 = 1.0 - beta1.powi(self.t);
        let bias2 = 1.0 - beta2.powi(self.t);

        Zip::from(&mut params)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(&gradient)
            .for_each(|p, m, v, &g| {
                // 모멘텀 업데이트
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;

                let m_hat = *m / bias1;
                let v_hat = *v / bias2;

                // 파라미터 업데이트
                *p -= lr * m_hat / (v_hat.sqrt() + epsilon);
            });
        Ok(())
    }

    /// 상태 초기화
    pub fn reset(&mut self) {
        self.m.fill(0.0);
        self.v.fill(0.0);
        self.t = 0;
    }
}
