use gansr::core::tiling::PAD_VALUE;
use gansr::core::training::CheckpointStore;
use gansr::{load_rgba, save_rgba, scale_file, Codebook, LanczosResidualTransform, TileConfig, TileProcessor};
use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 잔차가 거의 0인 코드북. 결과가 Lanczos 확대와 거의 같아진다.
fn quiet_codebook(seed: u64) -> Codebook {
    let noisy = Codebook::random_normal(16, 24, &mut StdRng::seed_from_u64(seed)).unwrap();
    Codebook::new(noisy.vectors().mapv(|v| v * 1e-3)).unwrap()
}

#[test]
fn test_130_이미지는_512_격자로_확대() {
    let mut rng = StdRng::seed_from_u64(1);
    let image = Array3::from_shape_fn((130, 130, 4), |(_, _, c)| if c == 3 { 255 } else { rng.gen::<u8>() });

    let transform = LanczosResidualTransform::new(24).unwrap();
    let codebook = quiet_codebook(2);
    let config = TileConfig {
        seed: Some(3),
        parallel: true,
        ..TileConfig::default()
    };

    let processor = TileProcessor::new(&transform, &codebook, config).unwrap();
    let scaled = processor.scale_image(image.view()).unwrap();
    assert_eq!(scaled.dim(), (512, 512, 4));

    // 오른쪽 아래 타일은 거의 전부 흰색 패딩에서 왔다
    let corner = scaled.slice(s![300.., 300.., ..]);
    let bright = corner.iter().filter(|&&v| v >= PAD_VALUE - 8).count();
    assert!(bright * 10 >= corner.len() * 9, "패딩 영역이 밝지 않음: {}/{}", bright, corner.len());
}

#[test]
fn test_체크포인트로_파일_확대() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoints"), 2).unwrap();
    store.save(16000, &quiet_codebook(4)).unwrap();

    let input = dir.path().join("photo.png");
    let image = Array3::from_shape_fn((40, 24, 4), |(y, x, c)| if c == 3 { 255 } else { (y * 6 + x) as u8 });
    save_rgba(&input, image.view()).unwrap();

    let checkpoint = store.load_latest().unwrap();
    let transform = LanczosResidualTransform::new(checkpoint.codebook.dim()).unwrap();
    let config = TileConfig {
        tile_size: 16,
        seed: Some(5),
        crop_to_source: true,
        ..TileConfig::default()
    };
    let output = scale_file(&input, None, &transform, &checkpoint.codebook, &config).unwrap();

    assert_eq!(output, dir.path().join("photo_scaled.png"));
    let scaled = load_rgba(&output).unwrap();
    assert_eq!(scaled.dim(), (80, 48, 4));
    // 타일 경계에서 떨어진 곳은 불투명도가 유지된다
    for ((y, x), &alpha) in scaled.slice(s![.., .., 3]).indexed_iter() {
        let (ty, tx) = (y % 32usize, x % 32usize);
        if (6usize..26).contains(&ty) && (6usize..26).contains(&tx) {
            assert!(alpha >= 250, "({}, {}) alpha {}", y, x, alpha);
        }
    }
}
