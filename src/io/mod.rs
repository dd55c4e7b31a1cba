//! # 파일 입출력
//!
//! PNG ↔ `[H][W][4]` RGBA 버퍼 변환과 파일 단위 스케일링

pub mod image_io;


pub use image_io::{load_rgba, save_rgba, scale_file, scaled_output_path};
