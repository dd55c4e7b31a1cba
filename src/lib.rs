//! GANSR: 코드북 양자화 기반 2배 이미지 업스케일러
//!
//! 8비트 sRGB 이미지를 premultiplied 선형 XYZ 공간으로 옮긴 뒤 Lanczos 축소/확대와
//! 벡터 양자화된 잠재 코드로 디테일을 복원한다. 큰 이미지는 타일 단위로 처리한다.

pub mod core;
pub mod io;

// 주요 타입 재수출
pub use crate::core::{
    // 설정과 오류
    GansrConfig, PipelineError, TileConfig, TrainingConfig,
    // 색 공간과 리샘플링
    to_encoded, to_linear, LanczosFilter, Padding,
    // 양자화
    quantize, Codebook, Quantized,
    // 변환과 추론
    LanczosResidualTransform, TileProcessor, TrainableTransform, Transform,
    // 학습
    CheckpointStore, ImageStream, Trainer,
};
pub use crate::io::{load_rgba, save_rgba, scale_file};
