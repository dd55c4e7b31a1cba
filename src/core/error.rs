//! 파이프라인 오류 분류
//!
//! 모든 함수는 `anyhow::Result`를 반환하고, 재시도 여부 판단이 필요한 오류만
//! `PipelineError`로 감싸서 올려보낸다.

use std::path::PathBuf;

use anyhow::Result;
use ndarray::{ArrayBase, Data, Dimension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 한 배치/타일의 순전파가 유효하지 않은 값을 만든 경우. 같은 단위를 다시 시도한다.
    #[error("transient numeric fault in {context}: {detail}")]
    TransientNumericFault { context: String, detail: String },

    /// 협력자가 2배 확대/축소 계약을 어긴 경우. 치명적이며 절대 reshape 하지 않는다.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// 재개 요청이 있었지만 저장된 체크포인트가 없음
    #[error("no checkpoint found in {}", .0.display())]
    MissingCheckpoint(PathBuf),
}

impl PipelineError {
    pub fn transient(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientNumericFault {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn shape(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// 오류 체인 안에 일시적 수치 오류가 있는지 확인
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<PipelineError>(),
            Some(PipelineError::TransientNumericFault { .. })
        )
    })
}

/// 배열 shape이 기대값과 정확히 같은지 검사
pub fn ensure_shape(context: &str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual != expected {
        return Err(PipelineError::shape(context, expected, actual).into());
    }
    Ok(())
}

/// 모든 원소가 유한한지 검사. NaN/Inf는 일시적 오류로 분류한다.
pub fn ensure_finite<S, D>(context: &str, values: &ArrayBase<S, D>) -> Result<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(PipelineError::transient(context, format!("non-finite value {}", bad)).into());
    }
    Ok(())
}
