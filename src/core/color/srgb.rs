//! 8비트 sRGB+알파 ↔ 선형 CIE XYZ+알파 변환
//!
//! 인코딩 쪽은 디더링 노이즈를 더한 뒤 256으로 나누고, 색상을 알파로 premultiply 한 다음
//! 역감마와 D65 행렬을 적용한다. 디코딩은 정확히 그 역순이다.

use anyhow::Result;
use ndarray::{ArrayView3, Array3, Axis, Zip};
use rand::Rng;

use crate::core::error::ensure_shape;
use crate::core::types::{EncodedImage, LinearImage, CHANNELS};

/// 선형 sRGB → XYZ (D65)
pub const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

/// XYZ (D65) → 선형 sRGB
pub const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// un-premultiply 시 알파 하한 (완전 투명 픽셀의 0 나눗셈 방지)
pub const ALPHA_FLOOR: f32 = 1.0 / 256.0;

/// 8비트 양자화 스케일
const SAMPLE_SCALE: f32 = 256.0;

/// 행렬 반올림 오차로 정수 경계 바로 아래에 떨어진 값이 한 단계 내려가지 않도록 더하는 여유
const TRUNCATION_GUARD: f32 = 1e-3;

const ENCODED_GAMMA_KNEE: f32 = 0.04045;
const LINEAR_GAMMA_KNEE: f32 = 0.003131;

/// sRGB 역감마 (비선형 → 선형)
#[inline]
pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= ENCODED_GAMMA_KNEE {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB 순감마 (선형 → 비선형). 음수 입력은 선형 구간으로 처리된다.
#[inline]
pub fn linear_to_srgb(value: f32) -> f32 {
    if value <= LINEAR_GAMMA_KNEE {
        12.92 * value
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn apply_matrix(matrix: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for (row, o) in matrix.iter().zip(out.iter_mut()) {
        *o = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    out
}

/// 디더링된 [0,1) 샘플 하나의 픽셀을 선형 XYZA로 변환
#[inline]
pub fn linearize_pixel(srgba: [f32; 4]) -> [f32; 4] {
    let alpha = srgba[3];
    let linear = [
        srgb_to_linear(srgba[0] * alpha),
        srgb_to_linear(srgba[1] * alpha),
        srgb_to_linear(srgba[2] * alpha),
    ];
    let xyz = apply_matrix(&SRGB_TO_XYZ, linear);
    [xyz[0], xyz[1], xyz[2], alpha]
}

/// 선형 XYZA 픽셀을 8비트 sRGBA로 변환
#[inline]
pub fn encode_pixel(xyza: [f32; 4]) -> [u8; 4] {
    let alpha = xyza[3];
    let linear = apply_matrix(&XYZ_TO_SRGB, [xyza[0], xyza[1], xyza[2]]);
    let denom = alpha.max(ALPHA_FLOOR);
    [
        quantize_sample(linear_to_srgb(linear[0]) / denom),
        quantize_sample(linear_to_srgb(linear[1]) / denom),
        quantize_sample(linear_to_srgb(linear[2]) / denom),
        quantize_sample(alpha),
    ]
}

#[inline]
fn quantize_sample(value: f32) -> u8 {
    // NaN은 `as` 변환에서 0이 된다
    (value * SAMPLE_SCALE + TRUNCATION_GUARD).clamp(0.0, 255.0) as u8
}

/// 균일 노이즈 [0,1)로 디더링하며 선형으로 변환
pub fn to_linear<R: Rng + ?Sized>(encoded: ArrayView3<u8>, rng: &mut R) -> Result<LinearImage> {
    let noise = Array3::from_shape_simple_fn(encoded.raw_dim(), || rng.gen::<f32>());
    to_linear_with_noise(encoded, noise.view())
}

/// 고정 오프셋으로 변환 (0.0이면 디더링 없음)
pub fn to_linear_with_offset(encoded: ArrayView3<u8>, offset: f32) -> Result<LinearImage> {
    let noise = Array3::from_elem(encoded.raw_dim(), offset);
    to_linear_with_noise(encoded, noise.view())
}

/// 샘플별 노이즈를 명시적으로 받아 변환
pub fn to_linear_with_noise(encoded: ArrayView3<u8>, noise: ArrayView3<f32>) -> Result<LinearImage> {
    let (height, width, channels) = encoded.dim();
    ensure_shape("to_linear", &[height, width, channels], &[height, width, CHANNELS])?;
    ensure_shape("to_linear noise", noise.shape(), encoded.shape())?;

    let mut linear = LinearImage::zeros((height, width, CHANNELS));
    Zip::from(linear.lanes_mut(Axis(2)))
        .and(encoded.lanes(Axis(2)))
        .and(noise.lanes(Axis(2)))
        .par_for_each(|mut out, px, n| {
            let mut srgba = [0.0f32; 4];
            for c in 0..CHANNELS {
                srgba[c] = (px[c] as f32 + n[c]) / SAMPLE_SCALE;
            }
            let xyza = linearize_pixel(srgba);
            for c in 0..CHANNELS {
                out[c] = xyza[c];
            }
        });

    Ok(linear)
}

/// 선형 XYZA 버퍼를 8비트 sRGBA로 변환
pub fn to_encoded(linear: ArrayView3<f32>) -> Result<EncodedImage> {
    let (height, width, channels) = linear.dim();
    ensure_shape("to_encoded", &[height, width, channels], &[height, width, CHANNELS])?;

    let mut encoded = EncodedImage::zeros((height, width, CHANNELS));
    Zip::from(encoded.lanes_mut(Axis(2)))
        .and(linear.lanes(Axis(2)))
        .par_for_each(|mut out, px| {
            let rgba = encode_pixel([px[0], px[1], px[2], px[3]]);
            for c in 0..CHANNELS {
                out[c] = rgba[c];
            }
        });

    Ok(encoded)
}
