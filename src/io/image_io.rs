//! `image` 크레이트 기반 RGBA 읽기/쓰기

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use log::info;
use ndarray::{Array3, ArrayView3};

use crate::core::config::TileConfig;
use crate::core::error::ensure_shape;
use crate::core::quantizer::Codebook;
use crate::core::tiling::TileProcessor;
use crate::core::transform::Transform;
use crate::core::types::{EncodedImage, CHANNELS};

/// 이미지를 읽어 8비트 RGBA 버퍼로 변환 (알파가 없으면 255로 채움)
pub fn load_rgba(path: &Path) -> Result<EncodedImage> {
    let image = image::open(path)
        .with_context(|| format!("이미지를 열 수 없습니다: {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let pixels = Array3::from_shape_vec((height as usize, width as usize, CHANNELS), image.into_raw())?;
    Ok(pixels)
}

/// RGBA 버퍼를 파일로 저장. 형식은 확장자로 정해진다.
pub fn save_rgba(path: &Path, pixels: ArrayView3<u8>) -> Result<()> {
    let (height, width, channels) = pixels.dim();
    ensure_shape("save image", &[height, width, channels], &[height, width, CHANNELS])?;

    let raw: Vec<u8> = pixels.iter().copied().collect();
    let image = RgbaImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| anyhow!("RGBA 버퍼 크기가 {}x{}와 맞지 않습니다", width, height))?;
    image
        .save(path)
        .with_context(|| format!("이미지 저장 실패: {}", path.display()))?;
    Ok(())
}

/// `photo.jpg` → `photo_scaled.png` (같은 디렉토리)
pub fn scaled_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_scaled.png", stem))
}

/// 파일 하나를 읽어 2배 확대 후 저장. 저장 경로를 돌려준다.
pub fn scale_file<T: Transform + ?Sized>(
    input: &Path,
    output: Option<&Path>,
    transform: &T,
    codebook: &Codebook,
    config: &TileConfig,
) -> Result<PathBuf> {
    let image = load_rgba(input)?;
    let processor = TileProcessor::new(transform, codebook, config.clone())?;
    let scaled = processor
        .scale_image(image.view())
        .with_context(|| format!("스케일링 실패: {}", input.display()))?;

    let output = output.map_or_else(|| scaled_output_path(input), Path::to_path_buf);
    save_rgba(&output, scaled.view())?;
    info!(
        "✅ {} ({}x{}) → {} ({}x{})",
        input.display(),
        image.dim().1,
        image.dim().0,
        output.display(),
        scaled.dim().1,
        scaled.dim().0
    );
    Ok(output)
}
