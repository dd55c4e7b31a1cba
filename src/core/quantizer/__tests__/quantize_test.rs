//! 코드북 양자화 테스트

use crate::core::error::{is_transient, PipelineError};
use crate::core::quantizer::{backward, quantize, scatter_codebook_gradient, Codebook};
use anyhow::Result;
use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_codebook(seed: u64) -> Codebook {
    let mut rng = StdRng::seed_from_u64(seed);
    Codebook::random_normal(16, 24, &mut rng).unwrap()
}

#[test]
fn 인덱스는_범위내이고_코드워드와_일치() -> Result<()> {
    let codebook = random_codebook(1);
    let mut rng = StdRng::seed_from_u64(2);
    let latent = Array2::from_shape_simple_fn((200, 24), || rng.gen_range(-3.0f32..3.0));

    let result = quantize(latent.view(), &codebook)?;
    assert_eq!(result.indices.len(), 200);
    assert_eq!(result.quantized.dim(), (200, 24));
    for (n, &k) in result.indices.iter().enumerate() {
        assert!(k < codebook.len());
        assert_eq!(result.quantized.row(n), codebook.entry(k));
    }
    Ok(())
}

#[test]
fn 코드워드와_같은_벡터는_자기_인덱스() -> Result<()> {
    let codebook = random_codebook(3);
    let result = quantize(codebook.vectors(), &codebook)?;
    assert_eq!(result.indices, (0..16).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn 작은_노이즈가_있어도_첫_5개_인덱스() -> Result<()> {
    let codebook = random_codebook(5);
    let mut rng = StdRng::seed_from_u64(6);
    let mut latent = codebook.gather(&[0, 1, 2, 3, 4]);
    latent.mapv_inplace(|v| v + rng.gen_range(-9e-4f32..9e-4));

    let result = quantize(latent.view(), &codebook)?;
    assert_eq!(result.indices, vec![0, 1, 2, 3, 4]);
    println!("✅ 노이즈 잠재 벡터 → {:?}", result.indices);
    Ok(())
}

#[test]
fn 동률이면_가장_작은_인덱스() -> Result<()> {
    let codebook = Codebook::new(array![[1.0f32, 0.0], [-1.0, 0.0], [1.0, 0.0]])?;
    // 0번과 1번까지의 거리가 같음
    let latent = array![[0.0f32, 0.0], [1.0, 0.0]];
    let result = quantize(latent.view(), &codebook)?;
    assert_eq!(result.indices, vec![0, 0]);
    Ok(())
}

#[test]
fn 차원_불일치는_shape_오류() {
    let codebook = random_codebook(7);
    let latent = Array2::<f32>::zeros((3, 23));
    let err = quantize(latent.view(), &codebook).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ShapeMismatch { .. })
    ));
}

#[test]
fn nan_잠재_벡터는_일시적_오류() {
    let codebook = random_codebook(8);
    let mut latent = Array2::<f32>::zeros((2, 24));
    latent[[1, 5]] = f32::NAN;
    let err = quantize(latent.view(), &codebook).unwrap_err();
    assert!(is_transient(&err));
}

#[test]
fn straight_through와_scatter_역전파() -> Result<()> {
    let d_quantized = array![[1.0f32, 2.0], [3.0, 4.0], [0.5, 0.5]];
    let indices = [2, 0, 2];
    let grads = backward(d_quantized.view(), &indices, 4)?;

    assert_eq!(grads.latent, d_quantized);
    assert_eq!(grads.codebook.dim(), (4, 2));
    assert_abs_diff_eq!(grads.codebook[[0, 0]], 3.0);
    assert_abs_diff_eq!(grads.codebook[[0, 1]], 4.0);
    assert_abs_diff_eq!(grads.codebook[[2, 0]], 1.5);
    assert_abs_diff_eq!(grads.codebook[[2, 1]], 2.5);
    assert!(grads.codebook.row(1).iter().all(|&v| v == 0.0));
    assert!(grads.codebook.row(3).iter().all(|&v| v == 0.0));
    Ok(())
}

#[test]
fn 잘못된_인덱스는_거부() {
    let d_code = Array2::<f32>::ones((2, 3));
    assert!(scatter_codebook_gradient(d_code.view(), &[0], 4).is_err());
    assert!(scatter_codebook_gradient(d_code.view(), &[0, 4], 4).is_err());
}

#[test]
fn 균일_샘플링과_분산_요약() {
    let codebook = random_codebook(9);
    let mut rng = StdRng::seed_from_u64(10);
    let (codes, indices) = codebook.sample_uniform(64, &mut rng);
    assert_eq!(codes.dim(), (64, 24));
    for (n, &k) in indices.iter().enumerate() {
        assert!(k < 16);
        assert_eq!(codes.row(n), codebook.entry(k));
    }
    // 표준 정규 초기화의 분산 요약은 대략 1
    let spread = codebook.spread();
    assert!(spread > 0.5 && spread < 1.5, "spread = {}", spread);
}
