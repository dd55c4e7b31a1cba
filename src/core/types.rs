//! 픽셀 버퍼와 잠재 텐서의 공통 타입 및 상수

use ndarray::{Array2, Array3};

/// 채널 수 (R,G,B,A 또는 X,Y,Z,A)
pub const CHANNELS: usize = 4;

/// 기본 타일 크기
pub const DEFAULT_TILE_SIZE: usize = 128;

/// 기본 코드북 크기 (K)
pub const DEFAULT_CODEBOOK_SIZE: usize = 16;

/// 기본 잠재 벡터 차원 (D)
pub const DEFAULT_LATENT_DIM: usize = 24;

/// 업스케일 배율
pub const SCALE_FACTOR: usize = 2;

/// 8비트 sRGB+알파 버퍼 `[height][width][4]`
pub type EncodedImage = Array3<u8>;

/// 선형 XYZ+알파 버퍼 `[height][width][4]`, 색상은 알파로 premultiply 됨
pub type LinearImage = Array3<f32>;

/// 공간 위치별 잠재 벡터 `[height][width][D]`
pub type LatentMap = Array3<f32>;

/// 평탄화된 잠재 벡터 묶음 `[N][D]`
pub type LatentBatch = Array2<f32>;
