//! 타일 처리기 테스트

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::config::TileConfig;
use crate::core::error::{is_transient, PipelineError};
use crate::core::quantizer::Codebook;
use crate::core::tiling::{Partition, TileProcessor};
use crate::core::transform::{LanczosResidualTransform, Transform};
use crate::core::types::{EncodedImage, LatentMap, LinearImage};
use anyhow::Result;
use ndarray::{Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 최근접 2배 확대. 앞의 `failures`번 호출은 지정한 오류를 낸다.
struct NearestTransform {
    calls: AtomicUsize,
    failures: usize,
    fatal: bool,
}

impl NearestTransform {
    fn new() -> Self {
        Self::failing(0, false)
    }

    fn failing(failures: usize, fatal: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
            fatal,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transform for NearestTransform {
    fn latent_dim(&self) -> usize {
        24
    }

    fn encode(&self, large: ArrayView3<f32>) -> Result<LatentMap> {
        let (h, w, _) = large.dim();
        Ok(LatentMap::zeros((h / 2, w / 2, 24)))
    }

    fn decode(&self, small: ArrayView3<f32>, _latent: ArrayView3<f32>) -> Result<LinearImage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            if self.fatal {
                return Err(PipelineError::shape("test decode", &[1], &[2]).into());
            }
            return Err(PipelineError::transient("test decode", "degenerate input").into());
        }
        let (h, w, c) = small.dim();
        Ok(Array3::from_shape_fn((h * 2, w * 2, c), |(y, x, ch)| small[[y / 2, x / 2, ch]]))
    }
}

fn codebook() -> Codebook {
    let mut rng = StdRng::seed_from_u64(99);
    Codebook::random_normal(16, 24, &mut rng).unwrap()
}

fn random_image(seed: u64, height: usize, width: usize) -> EncodedImage {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((height, width, 4), |(_, _, c)| {
        if c == 3 {
            rng.gen_range(1..=255)
        } else {
            rng.gen::<u8>()
        }
    })
}

fn config(tile_size: usize) -> TileConfig {
    TileConfig {
        tile_size,
        seed: Some(42),
        ..TileConfig::default()
    }
}

#[test]
fn 잔차_변환으로_130_이미지_스케일() -> Result<()> {
    let transform = LanczosResidualTransform::new(24)?;
    let codebook = codebook();
    let image = Array3::<u8>::from_elem((130, 130, 4), 255);

    let processor = TileProcessor::new(&transform, &codebook, config(128))?;
    let scaled = processor.scale_image(image.view())?;
    assert_eq!(scaled.dim(), (512, 512, 4));

    let cropping = TileProcessor::new(
        &transform,
        &codebook,
        TileConfig {
            crop_to_source: true,
            ..config(128)
        },
    )?;
    assert_eq!(cropping.scale_image(image.view())?.dim(), (260, 260, 4));
    Ok(())
}

#[test]
fn 최근접_변환은_픽셀을_2x2로_복제() -> Result<()> {
    let transform = NearestTransform::new();
    let codebook = codebook();
    let image = random_image(1, 20, 12);

    let processor = TileProcessor::new(&transform, &codebook, config(16))?;
    let scaled = processor.scale_image(image.view())?;
    assert_eq!(scaled.dim(), (64, 32, 4));

    for y in 0..40 {
        for x in 0..24 {
            for c in 0..4 {
                let expected = image[[y / 2, x / 2, c]] as i32;
                let actual = scaled[[y, x, c]] as i32;
                assert!((expected - actual).abs() <= 1, "({}, {}, {}) {} vs {}", y, x, c, expected, actual);
            }
        }
    }
    // 패딩 영역은 불투명 흰색 그대로
    assert!(scaled.slice(ndarray::s![40.., .., ..]).iter().all(|&v| v == 255));
    Ok(())
}

#[test]
fn 병렬과_순차_결과가_같음() -> Result<()> {
    let transform = LanczosResidualTransform::new(24)?;
    let codebook = codebook();
    let image = random_image(2, 40, 40);

    let sequential = TileProcessor::new(&transform, &codebook, config(16))?.scale_image(image.view())?;
    let parallel = TileProcessor::new(
        &transform,
        &codebook,
        TileConfig {
            parallel: true,
            ..config(16)
        },
    )?
    .scale_image(image.view())?;
    assert_eq!(sequential, parallel);
    Ok(())
}

#[test]
fn 일시적_오류는_같은_타일을_재시도() -> Result<()> {
    let transform = NearestTransform::failing(2, false);
    let codebook = codebook();
    let image = random_image(3, 8, 8);
    let partition = Partition::new(image.view(), 8)?;

    let processor = TileProcessor::new(&transform, &codebook, config(8))?;
    let mut rng = StdRng::seed_from_u64(1);
    let output = processor.process_tile(&partition.tile(0, 0), &mut rng)?;
    assert_eq!(output.dim(), (16, 16, 4));
    assert_eq!(transform.calls(), 3);
    Ok(())
}

#[test]
fn 재시도_한도를_넘으면_실행_실패() -> Result<()> {
    let transform = NearestTransform::failing(usize::MAX, false);
    let codebook = codebook();
    let image = random_image(4, 8, 8);

    let processor = TileProcessor::new(
        &transform,
        &codebook,
        TileConfig {
            max_attempts: Some(3),
            ..config(8)
        },
    )?;
    let err = processor.scale_image(image.view()).unwrap_err();
    assert!(is_transient(&err));
    assert_eq!(transform.calls(), 3);
    Ok(())
}

#[test]
fn shape_오류는_재시도하지_않음() -> Result<()> {
    let transform = NearestTransform::failing(usize::MAX, true);
    let codebook = codebook();
    let image = random_image(5, 8, 8);

    let processor = TileProcessor::new(&transform, &codebook, config(8))?;
    let err = processor.scale_image(image.view()).unwrap_err();
    assert!(!is_transient(&err));
    assert_eq!(transform.calls(), 1);
    Ok(())
}

#[test]
fn 코드북_차원이_다르면_거부() {
    let transform = NearestTransform::new();
    let mut rng = StdRng::seed_from_u64(5);
    let codebook = Codebook::random_normal(16, 8, &mut rng).unwrap();
    assert!(TileProcessor::new(&transform, &codebook, config(8)).is_err());
}
