//! # 타일 추론
//!
//! 임의 크기 이미지를 128×128 타일로 나누어 각각 변환한 뒤, 2배 크기 결과 타일을
//! 같은 격자 위치에 다시 배치한다.

pub mod partition;
pub mod processor;

#[cfg(test)]
mod __tests__;

pub use partition::{partition, stitch, Partition, Tile, TileGrid, PAD_VALUE};
pub use processor::TileProcessor;
