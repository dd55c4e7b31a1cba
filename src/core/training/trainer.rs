//! 코드북 학습 루프

use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::data::{prepare_batch, ImageStream, TrainingBatch};
use super::loss::{mean_squared_error_gradient, LossTerms};
use crate::core::config::TrainingConfig;
use crate::core::error::{ensure_finite, ensure_shape, is_transient, PipelineError};
use crate::core::optimizers::AdamState;
use crate::core::quantizer::{mean_axis_std, quantize, scatter_codebook_gradient, straight_through, Codebook};
use crate::core::resample::LanczosFilter;
use crate::core::transform::{checked_decode, checked_encode, TrainableTransform};
use crate::core::types::{EncodedImage, LatentMap};

/// 한 스텝의 결과
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub step: u64,
    pub losses: LossTerms,
    /// 배치 잠재 벡터의 차원별 표준편차 평균
    pub latent_spread: f32,
}

/// 요약 구간 하나의 집계
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundSummary {
    pub steps: u64,
    pub retries: u64,
    pub losses: LossTerms,
    pub latent_spread: f32,
    pub codebook_spread: f32,
}

impl RoundSummary {
    fn record(&mut self, report: &StepReport) {
        self.steps += 1;
        self.losses += report.losses;
        self.latent_spread += report.latent_spread;
    }

    /// 누적값을 스텝 평균으로 변환
    fn finish(mut self, codebook: &Codebook) -> Self {
        if self.steps > 0 {
            let inv = 1.0 / self.steps as f32;
            self.losses = self.losses.scaled(inv);
            self.latent_spread *= inv;
        }
        self.codebook_spread = codebook.spread();
        self
    }
}

/// 검증까지 끝났지만 아직 적용하지 않은 그래디언트
struct PendingUpdate {
    codebook: Array2<f32>,
    latents: Vec<LatentMap>,
}

pub struct Trainer<T: TrainableTransform> {
    transform: T,
    codebook: Codebook,
    optimizer: AdamState,
    filter: LanczosFilter,
    config: TrainingConfig,
    step: u64,
    rng: StdRng,
}

impl<T: TrainableTransform> Trainer<T> {
    pub fn new(transform: T, codebook: Codebook, config: TrainingConfig, seed: Option<u64>) -> Result<Self> {
        if codebook.dim() != transform.latent_dim() {
            return Err(PipelineError::shape(
                "trainer codebook",
                &[codebook.len(), transform.latent_dim()],
                &[codebook.len(), codebook.dim()],
            )
            .into());
        }
        ensure!(config.batch_size > 0, "batch_size must be positive");
        ensure!(config.summary_interval > 0, "summary_interval must be positive");
        ensure!(config.checkpoint_interval > 0, "checkpoint_interval must be positive");

        let optimizer = AdamState::new(codebook.vectors().dim(), config.learning_rate);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            transform,
            codebook,
            optimizer,
            filter: LanczosFilter::new(),
            config,
            step: 0,
            rng,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn codebook(&self) -> &Codebook {
        &self.codebook
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// 체크포인트의 코드북과 스텝으로 교체. 옵티마이저 모멘트는 초기화된다.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        ensure_shape(
            "restored codebook",
            checkpoint.codebook.vectors().shape(),
            self.codebook.vectors().shape(),
        )?;
        self.codebook = checkpoint.codebook;
        self.step = checkpoint.step;
        self.optimizer.reset();
        Ok(())
    }

    /// 최신 체크포인트가 있으면 이어서 학습. 없으면 처음부터.
    pub fn resume_from(&mut self, store: &CheckpointStore) -> Result<bool> {
        match store.load_latest() {
            Ok(checkpoint) => {
                info!("🔄 resuming from step {}", checkpoint.step);
                self.restore(checkpoint)?;
                Ok(true)
            }
            Err(err)
                if matches!(
                    err.downcast_ref::<PipelineError>(),
                    Some(PipelineError::MissingCheckpoint(_))
                ) =>
            {
                info!("{}, starting from scratch", err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// 순전파와 역전파. 모든 값이 유한할 때만 결과를 돌려준다.
    fn compute(&self, batch: &TrainingBatch) -> Result<(LossTerms, f32, PendingUpdate)> {
        ensure!(!batch.is_empty(), "training batch is empty");
        let weights = &self.config.loss_weights;
        let batch_scale = 1.0 / batch.len() as f32;
        let dim = self.codebook.dim();

        let mut losses = LossTerms::default();
        let mut d_codebook = Array2::<f32>::zeros(self.codebook.vectors().dim());
        let mut d_latents = Vec::with_capacity(batch.len());
        let mut flat_latents = Vec::with_capacity(batch.len());

        for sample in &batch.samples {
            let latent = checked_encode(&self.transform, sample.real.view())?;
            let (height, width, _) = latent.dim();
            let flat = latent.view().into_shape((height * width, dim))?;

            let quantized = quantize(flat, &self.codebook)?;
            let code = quantized.quantized.view();
            let code_map = code.into_shape((height, width, dim))?;

            // 디코더는 straight-through 출력을 받으므로 재구성 그래디언트는 잠재 벡터로만 흐른다
            let decoded = checked_decode(&self.transform, sample.downscaled.view(), code_map)?;
            ensure_shape("reconstruction", decoded.shape(), sample.real.shape())?;

            losses += LossTerms::evaluate(weights, sample.real.view(), decoded.view(), flat, code)?;

            let d_decoded = mean_squared_error_gradient(
                "reconstruction gradient",
                sample.real.view(),
                decoded.view(),
                weights.reconstruction * batch_scale,
            )?;
            let d_code_map = self
                .transform
                .decode_backward(sample.downscaled.view(), code_map, d_decoded.view())?;
            ensure_shape("decode backward", d_code_map.shape(), &[height, width, dim])?;
            let d_code_flat = d_code_map.view().into_shape((height * width, dim))?;

            // 코드북 커밋먼트: sg(latent) - code → 코드북
            let d_code = mean_squared_error_gradient(
                "codebook commitment gradient",
                flat,
                code,
                weights.codebook_commitment * batch_scale,
            )?;
            d_codebook += &scatter_codebook_gradient(d_code.view(), &quantized.indices, self.codebook.len())?;

            // 인코더 커밋먼트: latent - sg(code) → 잠재 벡터
            let d_encoder = mean_squared_error_gradient(
                "encoder commitment gradient",
                code,
                flat,
                weights.encoder_commitment * batch_scale,
            )?;
            let d_latent = straight_through(d_code_flat) + &d_encoder;
            d_latents.push(d_latent.into_shape((height, width, dim))?);
            flat_latents.push(flat.to_owned());
        }

        let losses = losses.scaled(batch_scale);
        if !losses.is_finite() {
            return Err(PipelineError::transient("training loss", format!("{:?}", losses)).into());
        }
        ensure_finite("codebook gradient", &d_codebook)?;
        for d_latent in &d_latents {
            ensure_finite("latent gradient", d_latent)?;
        }

        let views: Vec<ArrayView2<f32>> = flat_latents.iter().map(|latent| latent.view()).collect();
        let latent_spread = mean_axis_std(concatenate(Axis(0), &views)?.view());

        Ok((
            losses,
            latent_spread,
            PendingUpdate {
                codebook: d_codebook,
                latents: d_latents,
            },
        ))
    }

    /// 배치 하나로 한 스텝 학습. 실패하면 상태는 그대로다.
    pub fn train_step(&mut self, batch: &TrainingBatch) -> Result<StepReport> {
        let (losses, latent_spread, update) = self.compute(batch)?;

        self.optimizer
            .update(self.codebook.vectors_mut(), update.codebook.view())?;
        for (sample, d_latent) in batch.samples.iter().zip(update.latents.iter()) {
            self.transform
                .apply_encoder_gradient(sample.real.view(), d_latent.view())?;
        }
        self.step += 1;

        Ok(StepReport {
            step: self.step,
            losses,
            latent_spread,
        })
    }

    fn try_step(&mut self, images: &[EncodedImage]) -> Result<StepReport> {
        let batch = prepare_batch(images, self.config.crop_size, &self.filter, &mut self.rng)?;
        self.train_step(&batch)
    }

    /// `summary_interval` 스텝 단위로 학습. `max_steps`가 없으면 스트림이 끝날 때까지 돈다.
    pub fn run(&mut self, stream: &ImageStream, store: Option<&CheckpointStore>) -> Result<u64> {
        info!(
            "🚀 training from step {} (batch {}, crop {}, lr {})",
            self.step, self.config.batch_size, self.config.crop_size, self.config.learning_rate
        );
        let interval = self.config.summary_interval;
        let start_step = self.step;

        while self.config.max_steps.map_or(true, |max| self.step < max) {
            let mut round_end = (self.step / interval + 1) * interval;
            if let Some(max) = self.config.max_steps {
                round_end = round_end.min(max);
            }

            let progress = ProgressBar::new(round_end - self.step);
            progress.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>6}/{len:6} steps {msg}")?
                    .progress_chars("█▉▊▋▌▍▎▏ "),
            );

            let mut summary = RoundSummary::default();
            while self.step < round_end {
                let images = stream.next_batch(self.config.batch_size)?;
                match self.try_step(&images) {
                    Ok(report) => {
                        summary.record(&report);
                        progress.inc(1);
                        progress.set_message(format!("loss {:.6}", report.losses.total()));
                        if report.step % self.config.checkpoint_interval == 0 {
                            if let Some(store) = store {
                                store.save(report.step, &self.codebook)?;
                            }
                        }
                    }
                    Err(err) if is_transient(&err) => {
                        summary.retries += 1;
                        warn!("step {} failed, redrawing batch: {:#}", self.step + 1, err);
                    }
                    Err(err) => return Err(err.context(format!("training failed at step {}", self.step + 1))),
                }
            }
            progress.finish_and_clear();

            let summary = summary.finish(&self.codebook);
            info!(
                "📊 step {}: total {:.6} (reconstruction {:.6}, codebook {:.6}, encoder {:.6}) latent spread {:.4} codebook spread {:.4} retries {}",
                self.step,
                summary.losses.total(),
                summary.losses.reconstruction,
                summary.losses.codebook_commitment,
                summary.losses.encoder_commitment,
                summary.latent_spread,
                summary.codebook_spread,
                summary.retries
            );
        }

        if let Some(store) = store {
            // 이번 호출에서 한 스텝도 진행하지 않았다면 저장할 것이 없다
            if self.step > start_step && self.step % self.config.checkpoint_interval != 0 {
                store.save(self.step, &self.codebook)?;
            }
        }
        debug!("training stopped at step {}", self.step);
        Ok(self.step)
    }
}
