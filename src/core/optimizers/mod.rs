//! 코드북 최적화기

pub mod adam;

pub use adam::AdamState;
