//! # 시스템 구성 설정
//!
//! 코드북, 타일 추론, 학습 루프의 하이퍼파라미터. 모든 필드에 기본값이 있으므로
//! JSON 파일에는 바꾸고 싶은 값만 적으면 된다.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::{DEFAULT_CODEBOOK_SIZE, DEFAULT_LATENT_DIM, DEFAULT_TILE_SIZE};

/// 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GansrConfig {
    /// 코드북 설정
    pub quantizer: QuantizerConfig,
    /// 타일 추론 설정
    pub tile: TileConfig,
    /// 학습 설정
    pub training: TrainingConfig,
}

/// 코드북 크기
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizerConfig {
    /// 코드워드 개수 (K)
    pub codebook_size: usize,
    /// 잠재 벡터 차원 (D)
    pub latent_dim: usize,
}

/// 타일 추론 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// 타일 한 변의 픽셀 수
    pub tile_size: usize,
    /// 일시적 오류 시 타일당 최대 시도 횟수 (None이면 무제한)
    pub max_attempts: Option<usize>,
    /// rayon 병렬 처리 여부
    pub parallel: bool,
    /// 디더링/코드 샘플링 시드 (None이면 매번 다름)
    pub seed: Option<u64>,
    /// 결과를 원본의 2배 크기로 잘라낼지 여부 (false면 패딩 포함 전체 격자)
    pub crop_to_source: bool,
}

/// 학습 루프 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// 미니배치 크기
    pub batch_size: usize,
    /// 고해상도 학습 패치 크기
    pub crop_size: usize,
    /// 코드북 Adam 학습률
    pub learning_rate: f32,
    /// 요약 로그 간격 (스텝)
    pub summary_interval: u64,
    /// 체크포인트 저장 간격 (스텝)
    pub checkpoint_interval: u64,
    /// 보관할 체크포인트 개수
    pub max_to_keep: usize,
    /// 프리페치 큐 길이
    pub prefetch: usize,
    /// 최대 스텝 (None이면 무한)
    pub max_steps: Option<u64>,
    /// 손실 가중치
    pub loss_weights: LossWeights,
}

/// 손실 항 가중치
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    /// 재구성 오차
    pub reconstruction: f32,
    /// 코드북을 잠재 벡터 쪽으로 당기는 항
    pub codebook_commitment: f32,
    /// 잠재 벡터를 코드북 쪽으로 당기는 항
    pub encoder_commitment: f32,
}

impl GansrConfig {
    /// JSON 파일에서 로드 후 검증
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("설정 파일을 열 수 없습니다: {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("설정 파일 파싱 실패: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.quantizer.codebook_size > 0, "codebook_size must be positive");
        ensure!(self.quantizer.latent_dim > 0, "latent_dim must be positive");
        ensure!(
            self.tile.tile_size > 0 && self.tile.tile_size % 2 == 0,
            "tile_size must be a positive even number, got {}",
            self.tile.tile_size
        );
        ensure!(self.tile.max_attempts != Some(0), "max_attempts must be at least 1");

        let training = &self.training;
        ensure!(training.batch_size > 0, "batch_size must be positive");
        ensure!(
            training.crop_size > 0 && training.crop_size % 2 == 0,
            "crop_size must be a positive even number, got {}",
            training.crop_size
        );
        ensure!(training.learning_rate > 0.0, "learning_rate must be positive");
        ensure!(training.summary_interval > 0, "summary_interval must be positive");
        ensure!(training.checkpoint_interval > 0, "checkpoint_interval must be positive");
        ensure!(training.max_to_keep > 0, "max_to_keep must be positive");
        ensure!(training.prefetch > 0, "prefetch must be positive");
        Ok(())
    }
}

impl Default for GansrConfig {
    fn default() -> Self {
        Self {
            quantizer: QuantizerConfig::default(),
            tile: TileConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            codebook_size: DEFAULT_CODEBOOK_SIZE,
            latent_dim: DEFAULT_LATENT_DIM,
        }
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_attempts: Some(16),
            parallel: false,
            seed: None,
            crop_to_source: false,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            crop_size: 64,
            learning_rate: 1e-3,
            summary_interval: 1000,
            checkpoint_interval: 16000,
            max_to_keep: 2,
            prefetch: 100,
            max_steps: None,
            loss_weights: LossWeights::default(),
        }
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            reconstruction: 1.0,
            codebook_commitment: 1.0,
            encoder_commitment: 0.01,
        }
    }
}
