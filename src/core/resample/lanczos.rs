//! 분리형 Lanczos-3 필터
//!
//! 12탭 커널을 가로/세로 1차원 패스로 나누어 적용한다. 학습 시 축소와 추론 시 확대가
//! 같은 커널을 공유하므로, 네트워크가 뒤집도록 학습하는 열화 과정과 정확히 일치한다.

use std::f64::consts::PI;

use anyhow::Result;
use ndarray::{Array3, Array4, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::core::error::{ensure_shape, PipelineError};
use crate::core::types::CHANNELS;

/// 커널 탭 수
pub const KERNEL_TAPS: usize = 12;

/// 샘플링 구간 [-2.75, 2.75]
pub const KERNEL_EXTENT: f64 = 2.75;

/// 축소/확대 보폭
pub const STRIDE: usize = 2;

/// Lanczos-3 윈도우 sinc
pub fn lanczos3(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    3.0 * (PI * x).sin() * (PI * x / 3.0).sin() / (PI * PI * x * x)
}

/// 합성곱 패딩 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    /// 패딩 없음. 출력이 커널 크기만큼 줄어든다 (타일 문맥의 경계 제거용)
    Valid,
    /// 0 패딩. 출력 길이 = ceil(n / stride)
    Same,
}

impl Padding {
    /// 주어진 입력 길이에 대한 (출력 길이, 앞쪽 패딩)
    pub fn geometry(self, input: usize, kernel: usize, stride: usize) -> Option<(usize, usize)> {
        match self {
            Padding::Valid => {
                if input < kernel {
                    return None;
                }
                Some(((input - kernel) / stride + 1, 0))
            }
            Padding::Same => {
                let output = input.div_ceil(stride);
                let total = ((output.max(1) - 1) * stride + kernel).saturating_sub(input);
                Some((output, total / 2))
            }
        }
    }
}

/// 고정된 Lanczos-3 커널과 축소/확대 연산
#[derive(Debug, Clone)]
pub struct LanczosFilter {
    taps: [f32; KERNEL_TAPS],
}

impl Default for LanczosFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanczosFilter {
    /// 커널을 샘플링하고 합이 1이 되도록 정규화
    pub fn new() -> Self {
        let step = 2.0 * KERNEL_EXTENT / (KERNEL_TAPS - 1) as f64;
        let raw: Vec<f64> = (0..KERNEL_TAPS)
            .map(|i| lanczos3(-KERNEL_EXTENT + step * i as f64))
            .collect();
        let sum: f64 = raw.iter().sum();

        let mut taps = [0.0f32; KERNEL_TAPS];
        for (tap, value) in taps.iter_mut().zip(raw.iter()) {
            *tap = (value / sum) as f32;
        }
        Self { taps }
    }

    pub fn taps(&self) -> &[f32; KERNEL_TAPS] {
        &self.taps
    }

    /// 가로 방향 필터 텐서 `[1][12][in][out]`. 채널 대각선에만 가중치가 있다.
    pub fn horizontal_filter(&self) -> Array4<f32> {
        Array4::from_shape_fn((1, KERNEL_TAPS, CHANNELS, CHANNELS), |(_, k, i, o)| {
            if i == o {
                self.taps[k]
            } else {
                0.0
            }
        })
    }

    /// 세로 방향 필터 텐서 `[12][1][in][out]`
    pub fn vertical_filter(&self) -> Array4<f32> {
        Array4::from_shape_fn((KERNEL_TAPS, 1, CHANNELS, CHANNELS), |(k, _, i, o)| {
            if i == o {
                self.taps[k]
            } else {
                0.0
            }
        })
    }

    /// 가로 → 세로 순으로 보폭 2 합성곱
    pub fn downscale(&self, x: ArrayView3<f32>, padding: Padding) -> Result<Array3<f32>> {
        let horizontal = self.convolve_axis(x, Axis(1), padding)?;
        self.convolve_axis(horizontal.view(), Axis(0), padding)
    }

    /// 가로 → 세로 순으로 전치 합성곱 (보폭 2, Same). 출력은 정확히 2배 크기다.
    pub fn upscale(&self, x: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (height, width, channels) = x.dim();
        // 전치 합성곱은 탭의 절반만 각 출력에 기여하므로 축마다 2배 보정
        let scaled = x.mapv(|v| v * 4.0);
        let horizontal = self.transpose_axis(scaled.view(), Axis(1));
        let result = self.transpose_axis(horizontal.view(), Axis(0));

        ensure_shape(
            "lanczos upscale",
            result.shape(),
            &[height * STRIDE, width * STRIDE, channels],
        )?;
        Ok(result)
    }

    fn convolve_axis(&self, x: ArrayView3<f32>, axis: Axis, padding: Padding) -> Result<Array3<f32>> {
        let input_len = x.len_of(axis);
        let (output_len, pad_before) = padding
            .geometry(input_len, KERNEL_TAPS, STRIDE)
            .ok_or_else(|| {
                PipelineError::shape(
                    format!("lanczos downscale along axis {}", axis.index()),
                    &[KERNEL_TAPS],
                    &[input_len],
                )
            })?;

        let mut out_dim = x.raw_dim();
        out_dim[axis.index()] = output_len;
        let mut out = Array3::<f32>::zeros(out_dim);

        Zip::from(out.lanes_mut(axis))
            .and(x.lanes(axis))
            .par_for_each(|out_lane, in_lane| {
                self.convolve_lane(in_lane, out_lane, pad_before);
            });
        Ok(out)
    }

    fn convolve_lane(&self, input: ArrayView1<f32>, mut output: ArrayViewMut1<f32>, pad_before: usize) {
        let n = input.len() as isize;
        for (i, o) in output.iter_mut().enumerate() {
            let origin = (i * STRIDE) as isize - pad_before as isize;
            let mut acc = 0.0f32;
            for (k, &w) in self.taps.iter().enumerate() {
                let idx = origin + k as isize;
                if idx >= 0 && idx < n {
                    acc += w * input[idx as usize];
                }
            }
            *o = acc;
        }
    }

    fn transpose_axis(&self, x: ArrayView3<f32>, axis: Axis) -> Array3<f32> {
        let input_len = x.len_of(axis);
        let output_len = input_len * STRIDE;
        // 길이 2n 입력에 대한 Same 합성곱의 앞쪽 패딩
        let pad_before = Padding::Same
            .geometry(output_len, KERNEL_TAPS, STRIDE)
            .map(|(_, pad)| pad)
            .unwrap_or(0);

        let mut out_dim = x.raw_dim();
        out_dim[axis.index()] = output_len;
        let mut out = Array3::<f32>::zeros(out_dim);

        Zip::from(out.lanes_mut(axis))
            .and(x.lanes(axis))
            .par_for_each(|out_lane, in_lane| {
                self.transpose_lane(in_lane, out_lane, pad_before);
            });
        out
    }

    fn transpose_lane(&self, input: ArrayView1<f32>, mut output: ArrayViewMut1<f32>, pad_before: usize) {
        let n = output.len() as isize;
        for (i, &v) in input.iter().enumerate() {
            let origin = (i * STRIDE) as isize - pad_before as isize;
            for (k, &w) in self.taps.iter().enumerate() {
                let idx = origin + k as isize;
                if idx >= 0 && idx < n {
                    output[idx as usize] += w * v;
                }
            }
        }
    }
}
