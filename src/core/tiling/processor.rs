//! 타일 단위 추론과 전체 이미지 재조립

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use ndarray::{s, ArrayView3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::partition::{stitch, Partition, Tile};
use crate::core::color::{to_encoded, to_linear};
use crate::core::config::TileConfig;
use crate::core::error::{is_transient, PipelineError};
use crate::core::quantizer::Codebook;
use crate::core::transform::{checked_decode, Transform};
use crate::core::types::{EncodedImage, SCALE_FACTOR};

/// 타일별 RNG 시드. 스케줄링 순서와 무관하게 같은 결과를 낸다.
fn tile_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// 고정 크기 변환을 임의 크기 이미지에 적용
pub struct TileProcessor<'a, T: Transform + ?Sized> {
    transform: &'a T,
    codebook: &'a Codebook,
    config: TileConfig,
}

impl<'a, T: Transform + ?Sized> TileProcessor<'a, T> {
    pub fn new(transform: &'a T, codebook: &'a Codebook, config: TileConfig) -> Result<Self> {
        if codebook.dim() != transform.latent_dim() {
            return Err(PipelineError::shape(
                "tile processor codebook",
                &[codebook.len(), transform.latent_dim()],
                &[codebook.len(), codebook.dim()],
            )
            .into());
        }
        ensure!(config.tile_size > 0, "tile size must be positive");
        ensure!(config.max_attempts != Some(0), "max_attempts must be at least 1");
        Ok(Self {
            transform,
            codebook,
            config,
        })
    }

    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// 디더링 → 변환 → 재인코딩 한 번
    fn process_once<R: Rng + ?Sized>(&self, pixels: ArrayView3<u8>, rng: &mut R) -> Result<EncodedImage> {
        let linear = to_linear(pixels, rng)?;
        let (height, width, _) = linear.dim();

        // 인코더 입력이 없으므로 셀마다 코드워드를 무작위로 고른다
        let (codes, _) = self.codebook.sample_uniform(height * width, rng);
        let latent = codes.into_shape((height, width, self.codebook.dim()))?;

        let decoded = checked_decode(self.transform, linear.view(), latent.view())?;
        to_encoded(decoded.view())
    }

    /// 타일 하나 처리. 일시적 오류는 같은 입력으로 재시도한다.
    pub fn process_tile<R: Rng + ?Sized>(&self, tile: &Tile, rng: &mut R) -> Result<EncodedImage> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.process_once(tile.pixels.view(), rng) {
                Ok(output) => return Ok(output),
                Err(err)
                    if is_transient(&err)
                        && self.config.max_attempts.map_or(true, |max| attempt < max) =>
                {
                    warn!("tile ({}, {}) attempt {} failed, retrying: {:#}", tile.row, tile.col, attempt, err);
                }
                Err(err) => {
                    return Err(err.context(format!(
                        "tile ({}, {}) failed after {} attempt(s)",
                        tile.row, tile.col, attempt
                    )))
                }
            }
        }
    }

    /// 분할 → 타일별 처리 → 재조립
    pub fn scale_image(&self, image: ArrayView3<u8>) -> Result<EncodedImage> {
        let partition = Partition::new(image, self.config.tile_size)?;
        let grid = partition.grid();
        ensure!(!grid.is_empty(), "cannot scale an empty image");

        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            "scaling {}x{} image as {}x{} tiles of {}px",
            grid.source_width, grid.source_height, grid.cols, grid.rows, grid.tile_size
        );

        let progress = ProgressBar::new(grid.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} tiles {msg}")?
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );

        let run = |index: usize| -> Result<EncodedImage> {
            let tile = partition.tile_at(index);
            let mut rng = StdRng::seed_from_u64(tile_seed(base_seed, index));
            let output = self.process_tile(&tile, &mut rng)?;
            progress.inc(1);
            Ok(output)
        };

        let outputs: Vec<EncodedImage> = if self.config.parallel {
            (0..grid.len()).into_par_iter().map(run).collect::<Result<_>>()?
        } else {
            (0..grid.len()).map(run).collect::<Result<_>>()?
        };
        progress.finish_and_clear();

        let stitched = stitch(&outputs, grid.rows, grid.cols)?;
        debug!("stitched output {:?}", stitched.dim());

        if self.config.crop_to_source {
            let height = grid.source_height * SCALE_FACTOR;
            let width = grid.source_width * SCALE_FACTOR;
            return Ok(stitched.slice(s![..height, ..width, ..]).to_owned());
        }
        Ok(stitched)
    }
}
