//! 분할/재조립 테스트

use crate::core::error::PipelineError;
use crate::core::tiling::{partition, stitch, Partition, PAD_VALUE};
use crate::core::types::EncodedImage;
use anyhow::Result;
use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_image(seed: u64, height: usize, width: usize) -> EncodedImage {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_simple_fn((height, width, 4), || rng.gen::<u8>())
}

#[test]
fn 패딩은_불투명_흰색() -> Result<()> {
    let image = random_image(1, 130, 70);
    let partition = Partition::new(image.view(), 64)?;
    let grid = partition.grid();
    assert_eq!((grid.rows, grid.cols), (3, 2));
    assert_eq!(grid.padded_dims(), (192, 128));

    let padded = partition.padded();
    assert_eq!(padded.slice(s![..130, ..70, ..]), image.view());
    assert!(padded.slice(s![130.., .., ..]).iter().all(|&v| v == PAD_VALUE));
    assert!(padded.slice(s![.., 70.., ..]).iter().all(|&v| v == PAD_VALUE));
    Ok(())
}

#[test]
fn 타일은_행_우선_순서() -> Result<()> {
    let image = random_image(2, 100, 150);
    let (grid, tiles) = partition(image.view(), 64)?;
    assert_eq!(tiles.len(), grid.len());

    let order: Vec<(usize, usize)> = tiles.iter().map(|t| (t.row, t.col)).collect();
    assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    for tile in &tiles {
        assert_eq!(tile.pixels.dim(), (64, 64, 4));
    }
    // 타일 (1, 2)의 왼쪽 위 픽셀은 원본 (64, 128)
    assert_eq!(tiles[5].pixels.slice(s![0, 0, ..]), image.slice(s![64, 128, ..]));
    Ok(())
}

#[test]
fn 타일_시퀀스는_다시_시작할_수_있음() -> Result<()> {
    let image = random_image(3, 40, 40);
    let partition = Partition::new(image.view(), 16)?;
    let first: Vec<_> = partition.tiles().map(|t| t.pixels).collect();
    let second: Vec<_> = partition.tiles().map(|t| t.pixels).collect();
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn 항등_처리로_분할_후_재조립하면_패딩된_원본() -> Result<()> {
    let image = random_image(4, 130, 200);
    let partition = Partition::new(image.view(), 128)?;
    let grid = partition.grid();

    let outputs: Vec<EncodedImage> = partition.tiles().map(|tile| tile.pixels).collect();
    let stitched = stitch(&outputs, grid.rows, grid.cols)?;
    assert_eq!(stitched.view(), partition.padded());
    println!("✅ 분할/재조립 항등성 확인 ({}x{} 타일)", grid.rows, grid.cols);
    Ok(())
}

#[test]
fn 이미지_130은_2x2_격자와_512_결과() -> Result<()> {
    let image = Array3::<u8>::from_elem((130, 130, 4), 255);
    let (grid, tiles) = partition(image.view(), 128)?;
    assert_eq!((grid.rows, grid.cols), (2, 2));
    assert_eq!(grid.padded_dims(), (256, 256));
    assert_eq!(tiles.len(), 4);

    let outputs: Vec<EncodedImage> = (0..4)
        .map(|i| Array3::from_elem((256, 256, 4), i as u8))
        .collect();
    let stitched = stitch(&outputs, grid.rows, grid.cols)?;
    assert_eq!(stitched.dim(), (512, 512, 4));
    // 타일 (r, c)는 (r·256, c·256)에 놓인다
    assert_eq!(stitched[[0, 0, 0]], 0);
    assert_eq!(stitched[[0, 300, 0]], 1);
    assert_eq!(stitched[[300, 0, 0]], 2);
    assert_eq!(stitched[[511, 511, 3]], 3);
    Ok(())
}

#[test]
fn 타일_개수나_크기가_다르면_shape_오류() {
    let tiles = vec![EncodedImage::zeros((4, 4, 4)); 3];
    let err = stitch(&tiles, 2, 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ShapeMismatch { .. })
    ));

    let mut tiles = vec![EncodedImage::zeros((4, 4, 4)); 4];
    tiles[3] = EncodedImage::zeros((4, 5, 4));
    let err = stitch(&tiles, 2, 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ShapeMismatch { .. })
    ));
}
