// crates/mt_mesh/src/error.rs

//! 网格错误类型
//!
//! 所有错误可转换为 `mt_foundation::MtError` 向上传播

use mt_foundation::{CellHandle, MtError};
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// 单元不存在
    #[error("单元不存在: {cell}")]
    CellNotFound { cell: CellHandle },

    /// 操作要求活动单元
    #[error("单元 {cell} 不是活动单元, 无法执行 {operation}")]
    NotActive {
        cell: CellHandle,
        operation: &'static str,
    },

    /// 无法粗化
    #[error("无法粗化单元 {cell}: {reason}")]
    CannotCoarsen { cell: CellHandle, reason: String },

    /// 几何参数非法
    #[error("几何参数非法: {message}")]
    InvalidGeometry { message: String },

    /// 分区参数非法
    #[error("分区数非法: {n_ranks}")]
    InvalidPartition { n_ranks: usize },
}

impl MeshError {
    /// 创建几何错误
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}

/// 转换到 Foundation 层错误
impl From<MeshError> for MtError {
    fn from(err: MeshError) -> Self {
        MtError::invalid_mesh(err.to_string())
    }
}
