//! # 리샘플링
//!
//! 선형 색 공간 버퍼에 대한 분리형 Lanczos-3 축소/확대

pub mod lanczos;


pub use lanczos::{lanczos3, LanczosFilter, Padding, KERNEL_TAPS, STRIDE};
