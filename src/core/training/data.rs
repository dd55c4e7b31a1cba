//! 학습 데이터: 이미지 스트림, 무작위 크롭, 배치 전처리

use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, ensure, Context, Result};
use log::{debug, warn};
use ndarray::{s, ArrayView3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::core::color::to_linear;
use crate::core::error::{ensure_shape, PipelineError};
use crate::core::resample::{LanczosFilter, Padding, KERNEL_TAPS, STRIDE};
use crate::core::types::{EncodedImage, LinearImage, CHANNELS, SCALE_FACTOR};
use crate::io::load_rgba;

/// Valid 축소가 잘라먹는 가장자리 픽셀 수 ((12 - 2) / 2)
pub const CONTEXT_BORDER: usize = (KERNEL_TAPS - STRIDE) / 2;

/// 학습 샘플 하나
#[derive(Debug, Clone)]
pub struct TrainingSample {
    /// `[size][size][4]` 선형 고해상도 패치
    pub real: LinearImage,
    /// `[size/2][size/2][4]` Valid 축소 결과
    pub downscaled: LinearImage,
}

/// 미니배치
#[derive(Debug, Clone, Default)]
pub struct TrainingBatch {
    pub samples: Vec<TrainingSample>,
}

impl TrainingBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 이미지에서 `size × size` 영역을 무작위로 잘라낸다.
/// 이미지가 더 작으면 배치를 다시 뽑도록 일시적 오류를 낸다.
pub fn random_crop<R: Rng + ?Sized>(image: ArrayView3<u8>, size: usize, rng: &mut R) -> Result<EncodedImage> {
    let (height, width, channels) = image.dim();
    ensure_shape("random crop", &[height, width, channels], &[height, width, CHANNELS])?;
    if height < size || width < size {
        return Err(PipelineError::transient(
            "random crop",
            format!("image {}x{} is smaller than crop {}", width, height, size),
        )
        .into());
    }

    let y = rng.gen_range(0..=height - size);
    let x = rng.gen_range(0..=width - size);
    Ok(image.slice(s![y..y + size, x..x + size, ..]).to_owned())
}

/// 크롭 하나 → 선형 변환 → Valid 축소 → 가장자리 제거
pub fn prepare_sample<R: Rng + ?Sized>(
    crop: ArrayView3<u8>,
    size: usize,
    filter: &LanczosFilter,
    rng: &mut R,
) -> Result<TrainingSample> {
    let context = size + 2 * CONTEXT_BORDER;
    ensure_shape("training crop", crop.shape(), &[context, context, CHANNELS])?;

    let linear = to_linear(crop, rng)?;
    let downscaled = filter.downscale(linear.view(), Padding::Valid)?;
    let half = size / SCALE_FACTOR;
    ensure_shape("training downscale", downscaled.shape(), &[half, half, CHANNELS])?;

    let real = linear
        .slice(s![
            CONTEXT_BORDER..CONTEXT_BORDER + size,
            CONTEXT_BORDER..CONTEXT_BORDER + size,
            ..
        ])
        .to_owned();
    Ok(TrainingSample { real, downscaled })
}

/// 이미지마다 크롭 하나씩 뽑아 배치 구성
pub fn prepare_batch<R: Rng + ?Sized>(
    images: &[EncodedImage],
    size: usize,
    filter: &LanczosFilter,
    rng: &mut R,
) -> Result<TrainingBatch> {
    ensure!(size > 0 && size % SCALE_FACTOR == 0, "crop size must be a positive even number, got {}", size);
    let context = size + 2 * CONTEXT_BORDER;

    let samples = images
        .iter()
        .map(|image| {
            let crop = random_crop(image.view(), context, rng)?;
            prepare_sample(crop.view(), size, filter, rng)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TrainingBatch { samples })
}

/// 디렉토리의 `*.png` 파일 목록 (이름순)
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("이미지 디렉토리를 읽을 수 없습니다: {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
        if path.is_file() && is_png {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// 섞기 → 반복 → 프리페치 이미지 스트림. 생산자 스레드 하나가 디코딩을 맡는다.
pub struct ImageStream {
    receiver: Receiver<Result<EncodedImage>>,
    _producer: JoinHandle<()>,
}

impl ImageStream {
    /// 디렉토리의 PNG 파일을 무한히 순환
    pub fn from_directory(dir: &Path, prefetch: usize, seed: Option<u64>) -> Result<Self> {
        let paths = list_images(dir)?;
        ensure!(!paths.is_empty(), "no *.png images in {}", dir.display());
        debug!("image stream over {} files in {}", paths.len(), dir.display());
        Self::spawn(paths, prefetch, seed, |path: &PathBuf| load_rgba(path))
    }

    /// 메모리에 있는 이미지를 무한히 순환
    pub fn from_images(images: Vec<EncodedImage>, prefetch: usize, seed: Option<u64>) -> Result<Self> {
        ensure!(!images.is_empty(), "image stream needs at least one image");
        Self::spawn(images, prefetch, seed, |image: &EncodedImage| Ok(image.clone()))
    }

    fn spawn<S, F>(mut sources: Vec<S>, prefetch: usize, seed: Option<u64>, load: F) -> Result<Self>
    where
        S: Send + 'static,
        F: Fn(&S) -> Result<EncodedImage> + Send + 'static,
    {
        ensure!(prefetch > 0, "prefetch must be positive");
        let (sender, receiver) = sync_channel(prefetch);

        let producer = thread::Builder::new()
            .name("gansr-image-stream".into())
            .spawn(move || {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                loop {
                    sources.shuffle(&mut rng);
                    let mut loaded = 0usize;
                    for source in &sources {
                        match load(source) {
                            Ok(image) => {
                                loaded += 1;
                                // 소비자가 사라지면 종료
                                if sender.send(Ok(image)).is_err() {
                                    return;
                                }
                            }
                            Err(err) => warn!("skipping unreadable training image: {:#}", err),
                        }
                    }
                    if loaded == 0 {
                        let _ = sender.send(Err(anyhow!("no readable training images left in the stream")));
                        return;
                    }
                }
            })
            .context("이미지 스트림 스레드를 시작할 수 없습니다")?;

        Ok(Self {
            receiver,
            _producer: producer,
        })
    }

    /// 다음 이미지. 생산자가 끝났으면 오류.
    pub fn next_image(&self) -> Result<EncodedImage> {
        self.receiver
            .recv()
            .map_err(|_| anyhow!("image stream closed"))?
    }

    pub fn next_batch(&self, count: usize) -> Result<Vec<EncodedImage>> {
        (0..count).map(|_| self.next_image()).collect()
    }
}
