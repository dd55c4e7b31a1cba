//! # 색 공간 변환
//!
//! 리샘플링과 양자화는 모두 premultiplied 선형 XYZ 공간에서 이루어진다.

pub mod srgb;


pub use srgb::{
    encode_pixel, linear_to_srgb, linearize_pixel, srgb_to_linear, to_encoded, to_linear,
    to_linear_with_noise, to_linear_with_offset, ALPHA_FLOOR,
};
