//! 학습 데이터 파이프라인 테스트

use crate::core::error::{is_transient, PipelineError};
use crate::core::resample::LanczosFilter;
use crate::core::training::{
    list_images, prepare_batch, prepare_sample, random_crop, ImageStream, CONTEXT_BORDER,
};
use crate::core::types::EncodedImage;
use crate::io::save_rgba;
use anyhow::Result;
use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn opaque_image(seed: u64, height: usize, width: usize) -> EncodedImage {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((height, width, 4), |(_, _, c)| if c == 3 { 255 } else { rng.gen() })
}

#[test]
fn 가장자리_폭은_5픽셀() {
    assert_eq!(CONTEXT_BORDER, 5);
}

#[test]
fn 무작위_크롭_크기와_위치() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(1);
    // 값이 위치를 담도록 구성
    let image = Array3::from_shape_fn((30, 40, 4), |(y, x, c)| if c == 3 { 255 } else { (y * 4 + x % 4) as u8 });

    let crop = random_crop(image.view(), 20, &mut rng)?;
    assert_eq!(crop.dim(), (20, 20, 4));

    let full = random_crop(image.view(), 30, &mut rng)?;
    assert_eq!(full.slice(s![.., .., 3]), image.slice(s![..30, ..30, 3]));
    // 세로 방향으로는 잘라낼 여유가 없으므로 모든 행이 그대로 남는다
    for y in 0..30 {
        assert_eq!(full[[y, 0, 0]] as usize, y * 4 + full[[0, 0, 0]] as usize);
    }
    Ok(())
}

#[test]
fn 크롭보다_작은_이미지는_일시적_오류() {
    let mut rng = StdRng::seed_from_u64(2);
    let image = opaque_image(2, 60, 100);
    let err = random_crop(image.view(), 74, &mut rng).unwrap_err();
    assert!(is_transient(&err));
}

#[test]
fn 학습_샘플_크기() -> Result<()> {
    let filter = LanczosFilter::new();
    let mut rng = StdRng::seed_from_u64(3);
    let crop = opaque_image(3, 74, 74);

    let sample = prepare_sample(crop.view(), 64, &filter, &mut rng)?;
    assert_eq!(sample.real.dim(), (64, 64, 4));
    assert_eq!(sample.downscaled.dim(), (32, 32, 4));
    Ok(())
}

#[test]
fn 균일한_이미지의_축소는_같은_값() -> Result<()> {
    let filter = LanczosFilter::new();
    let mut rng = StdRng::seed_from_u64(4);
    let crop = Array3::from_shape_fn((26, 26, 4), |(_, _, c)| [120u8, 200, 40, 255][c]);

    let sample = prepare_sample(crop.view(), 16, &filter, &mut rng)?;
    let real_mean = sample.real.slice(s![.., .., 1]).mean().unwrap_or(0.0);
    for &value in sample.downscaled.slice(s![.., .., 1]).iter() {
        // 디더링 잡음 폭 안에서 일치
        assert!((value - real_mean).abs() < 1e-2, "{} vs {}", value, real_mean);
    }
    Ok(())
}

#[test]
fn 잘못된_크롭_크기는_shape_오류() {
    let filter = LanczosFilter::new();
    let mut rng = StdRng::seed_from_u64(5);
    let crop = opaque_image(5, 70, 74);
    let err = prepare_sample(crop.view(), 64, &filter, &mut rng).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ShapeMismatch { .. })
    ));
}

#[test]
fn 배치는_이미지마다_샘플_하나() -> Result<()> {
    let filter = LanczosFilter::new();
    let mut rng = StdRng::seed_from_u64(6);
    let images = vec![opaque_image(6, 40, 50), opaque_image(7, 26, 26), opaque_image(8, 64, 30)];

    let batch = prepare_batch(&images, 16, &filter, &mut rng)?;
    assert_eq!(batch.len(), 3);
    for sample in &batch.samples {
        assert_eq!(sample.real.dim(), (16, 16, 4));
        assert_eq!(sample.downscaled.dim(), (8, 8, 4));
    }
    assert!(prepare_batch(&images, 15, &filter, &mut rng).is_err());
    Ok(())
}

#[test]
fn 메모리_스트림은_반복된다() -> Result<()> {
    let images = vec![opaque_image(9, 8, 8), opaque_image(10, 8, 8)];
    let stream = ImageStream::from_images(images.clone(), 2, Some(1))?;

    let drawn = stream.next_batch(7)?;
    assert_eq!(drawn.len(), 7);
    for image in &drawn {
        assert!(images.contains(image));
    }
    assert!(ImageStream::from_images(Vec::new(), 2, None).is_err());
    Ok(())
}

#[test]
fn 디렉토리_스트림은_png만_읽는다() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let first = opaque_image(11, 12, 10);
    let second = opaque_image(12, 6, 9);
    save_rgba(&dir.path().join("b.png"), second.view())?;
    save_rgba(&dir.path().join("a.png"), first.view())?;
    std::fs::write(dir.path().join("notes.txt"), "not an image")?;

    let paths = list_images(dir.path())?;
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("a.png"));

    let stream = ImageStream::from_directory(dir.path(), 4, Some(3))?;
    for image in stream.next_batch(4)? {
        assert!(image == first || image == second);
    }
    Ok(())
}

#[test]
fn 빈_디렉토리는_오류() -> Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(ImageStream::from_directory(dir.path(), 4, None).is_err());
    Ok(())
}
