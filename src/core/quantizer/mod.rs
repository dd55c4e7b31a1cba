//! # 코드북 벡터 양자화
//!
//! 순전파(최근접 탐색)와 역전파(그래디언트 누적)를 일반 함수 두 개로 제공한다.
//! 자동 미분은 외부 학습 코드가 담당한다.

pub mod codebook;
pub mod quantize;

#[cfg(test)]
mod __tests__;

pub use codebook::{mean_axis_std, Codebook};
pub use quantize::{
    backward, nearest_index, quantize, scatter_codebook_gradient, straight_through, QuantizeGradients,
    Quantized,
};
