//! 이미지를 고정 크기 타일 격자로 나누고 다시 이어 붙이기

use anyhow::{ensure, Result};
use ndarray::{s, ArrayView3};

use crate::core::error::{ensure_shape, PipelineError};
use crate::core::types::{EncodedImage, CHANNELS};

/// 패딩 값. 네 채널 모두 최대값 (불투명 흰색)
pub const PAD_VALUE: u8 = 255;

/// 타일 격자 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: usize,
    pub cols: usize,
    pub tile_size: usize,
    pub source_height: usize,
    pub source_width: usize,
}

impl TileGrid {
    pub fn for_image(height: usize, width: usize, tile_size: usize) -> Result<Self> {
        ensure!(tile_size > 0, "tile size must be positive");
        Ok(Self {
            rows: height.div_ceil(tile_size),
            cols: width.div_ceil(tile_size),
            tile_size,
            source_height: height,
            source_width: width,
        })
    }

    /// 전체 타일 개수
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 패딩 후 (높이, 너비)
    pub fn padded_dims(&self) -> (usize, usize) {
        (self.rows * self.tile_size, self.cols * self.tile_size)
    }

    /// 행 우선 순서의 인덱스 → (row, col)
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }
}

/// 하나의 타일. 다른 타일과 공유하는 상태가 없다.
#[derive(Debug, Clone)]
pub struct Tile {
    pub row: usize,
    pub col: usize,
    pub pixels: EncodedImage,
}

/// 오른쪽/아래쪽이 패딩된 이미지와 그 격자
#[derive(Debug, Clone)]
pub struct Partition {
    grid: TileGrid,
    padded: EncodedImage,
}

impl Partition {
    pub fn new(image: ArrayView3<u8>, tile_size: usize) -> Result<Self> {
        let (height, width, channels) = image.dim();
        ensure_shape("partition", &[height, width, channels], &[height, width, CHANNELS])?;

        let grid = TileGrid::for_image(height, width, tile_size)?;
        let (padded_height, padded_width) = grid.padded_dims();
        let mut padded = EncodedImage::from_elem((padded_height, padded_width, CHANNELS), PAD_VALUE);
        padded.slice_mut(s![..height, ..width, ..]).assign(&image);

        Ok(Self { grid, padded })
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn padded(&self) -> ArrayView3<u8> {
        self.padded.view()
    }

    pub fn tile(&self, row: usize, col: usize) -> Tile {
        let size = self.grid.tile_size;
        let pixels = self
            .padded
            .slice(s![row * size..(row + 1) * size, col * size..(col + 1) * size, ..])
            .to_owned();
        Tile { row, col, pixels }
    }

    pub fn tile_at(&self, index: usize) -> Tile {
        let (row, col) = self.grid.position(index);
        self.tile(row, col)
    }

    /// 행 우선 순서의 타일 시퀀스. 위치만으로 결정되므로 몇 번이든 다시 시작할 수 있다.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.grid.len()).map(move |index| self.tile_at(index))
    }
}

/// 이미지를 패딩하고 타일 목록으로 나눈다
pub fn partition(image: ArrayView3<u8>, tile_size: usize) -> Result<(TileGrid, Vec<Tile>)> {
    let partition = Partition::new(image, tile_size)?;
    let tiles = partition.tiles().collect();
    Ok((partition.grid(), tiles))
}

/// 행 우선 순서의 결과 타일을 하나의 이미지로 배치. 경계 블렌딩은 하지 않는다.
pub fn stitch(tiles: &[EncodedImage], grid_rows: usize, grid_cols: usize) -> Result<EncodedImage> {
    if tiles.len() != grid_rows * grid_cols {
        return Err(PipelineError::shape("stitch tile count", &[grid_rows * grid_cols], &[tiles.len()]).into());
    }
    ensure!(!tiles.is_empty(), "cannot stitch an empty tile grid");

    let (tile_height, tile_width, channels) = tiles[0].dim();
    for tile in tiles {
        ensure_shape("stitch tile", tile.shape(), &[tile_height, tile_width, channels])?;
    }

    let mut image = EncodedImage::zeros((grid_rows * tile_height, grid_cols * tile_width, channels));
    for row in 0..grid_rows {
        for col in 0..grid_cols {
            let y = row * tile_height;
            let x = col * tile_width;
            image
                .slice_mut(s![y..y + tile_height, x..x + tile_width, ..])
                .assign(&tiles[row * grid_cols + col]);
        }
    }
    Ok(image)
}
