//! 코드북 체크포인트 저장/복원

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::error::PipelineError;
use crate::core::quantizer::Codebook;

const CHECKPOINT_PREFIX: &str = "gansr-";
const CHECKPOINT_EXTENSION: &str = "json";

/// 저장된 학습 상태. 변환의 파라미터는 포함하지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub step: u64,
    pub saved_at: DateTime<Utc>,
    pub codebook: Codebook,
}

/// 디렉토리 하나에 `gansr-<step>.json` 파일을 최신 N개까지 보관
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    max_to_keep: usize,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, max_to_keep: usize) -> Result<Self> {
        ensure!(max_to_keep > 0, "max_to_keep must be positive");
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("체크포인트 디렉토리를 만들 수 없습니다: {}", dir.display()))?;
        Ok(Self { dir, max_to_keep })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, step: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", CHECKPOINT_PREFIX, step, CHECKPOINT_EXTENSION))
    }

    /// 저장 후 오래된 체크포인트 정리
    pub fn save(&self, step: u64, codebook: &Codebook) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            step,
            saved_at: Utc::now(),
            codebook: codebook.clone(),
        };

        let path = self.path_for(step);
        let partial = path.with_extension("json.partial");
        {
            let file = File::create(&partial)
                .with_context(|| format!("체크포인트 파일 생성 실패: {}", partial.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &checkpoint)?;
            writer.flush()?;
        }
        fs::rename(&partial, &path)
            .with_context(|| format!("체크포인트 저장 실패: {}", path.display()))?;
        info!("💾 checkpoint saved: {} (step {})", path.display(), step);

        self.prune()?;
        Ok(path)
    }

    /// `(step, path)` 목록, 스텝 오름차순
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>> {
        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if let Some(step) = parse_step(&path) {
                checkpoints.push((step, path));
            }
        }
        checkpoints.sort_by_key(|(step, _)| *step);
        Ok(checkpoints)
    }

    fn prune(&self) -> Result<()> {
        let checkpoints = self.list()?;
        let excess = checkpoints.len().saturating_sub(self.max_to_keep);
        for (step, path) in checkpoints.into_iter().take(excess) {
            fs::remove_file(&path)
                .with_context(|| format!("오래된 체크포인트 삭제 실패: {}", path.display()))?;
            debug!("pruned checkpoint for step {}", step);
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Checkpoint> {
        let file = File::open(path)
            .with_context(|| format!("체크포인트 파일을 열 수 없습니다: {}", path.display()))?;
        let checkpoint: Checkpoint = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("체크포인트 파싱 실패: {}", path.display()))?;
        // 역직렬화는 코드북 검증을 거치지 않으므로 다시 확인
        let codebook = Codebook::new(checkpoint.codebook.vectors().to_owned())
            .with_context(|| format!("손상된 코드북: {}", path.display()))?;
        Ok(Checkpoint { codebook, ..checkpoint })
    }

    /// 가장 최근 체크포인트. 없으면 `None`.
    pub fn latest(&self) -> Result<Option<Checkpoint>> {
        match self.list()?.pop() {
            Some((_, path)) => Ok(Some(Self::load(&path)?)),
            None => Ok(None),
        }
    }

    /// 가장 최근 체크포인트. 없으면 `MissingCheckpoint`.
    pub fn load_latest(&self) -> Result<Checkpoint> {
        self.latest()?
            .ok_or_else(|| PipelineError::MissingCheckpoint(self.dir.clone()).into())
    }
}

fn parse_step(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != CHECKPOINT_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(CHECKPOINT_PREFIX)?
        .parse()
        .ok()
}
