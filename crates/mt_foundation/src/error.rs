// crates/mt_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `MtError` 枚举和 `MtResult` 类型别名，用于整个项目的错误处理。
//!
//! # 错误分类
//!
//! 1. **致命不变量违反**: 粒子总数变化、单元形状退化、零体积单元。
//!    这类错误意味着继续计算会静默破坏结果，调用方必须中止整个运行。
//! 2. **可恢复错误**: 输入非法、IO 失败、编码缓冲区不足等。
//! 3. **通信错误**: 集合通信失败或其他工作进程已中止。
//!
//! 通信层与网格层的错误在各自 crate 中定义，并通过 `From` 转换为 `MtError`。
//!
//! # 示例
//!
//! ```
//! use mt_foundation::error::{MtError, MtResult};
//!
//! fn check(expected: u64, actual: u64) -> MtResult<()> {
//!     if expected != actual {
//!         return Err(MtError::ParticleCountMismatch { expected, actual });
//!     }
//!     Ok(())
//! }
//!
//! let err = check(10, 9).unwrap_err();
//! assert!(err.is_fatal());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type MtResult<T> = Result<T, MtError>;

/// MantleTrace 错误类型
#[derive(Error, Debug)]
pub enum MtError {
    // ========================================================================
    // IO 与输入
    // ========================================================================

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        /// 可选的底层 IO 错误
        #[source]
        source: Option<std::io::Error>,
    },

    /// 文件格式错误
    #[error("文件格式错误: {path}: {message}")]
    FileFormat {
        /// 文件路径
        path: PathBuf,
        /// 错误信息
        message: String,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 网格与几何
    // ========================================================================

    /// 无效网格
    #[error("无效的网格: {message}")]
    InvalidMesh {
        /// 具体错误信息
        message: String,
    },

    /// 零体积单元
    #[error("发现零体积单元: 层级 {level}, 索引 {index}")]
    ZeroVolumeCell {
        /// 单元层级
        level: u32,
        /// 层内索引
        index: u32,
    },

    /// 单元形状退化，拒绝采样失败
    #[error("无法在单元 (层级 {level}, 索引 {index}) 内生成粒子: {attempts} 次尝试均失败 (单元形状异常?)")]
    DegenerateCell {
        /// 单元层级
        level: u32,
        /// 层内索引
        index: u32,
        /// 已尝试次数
        attempts: u32,
    },

    // ========================================================================
    // 粒子子系统
    // ========================================================================

    /// 粒子总数意外变化（丢失或重复）
    #[error("粒子总数意外变化: 期望 {expected}, 实际 {actual}")]
    ParticleCountMismatch {
        /// 生成时记录的全局目标数
        expected: u64,
        /// 当前全局求和结果
        actual: u64,
    },

    /// 二进制编码错误
    #[error("粒子编码错误: {message}")]
    Wire {
        /// 错误信息
        message: String,
    },

    /// 速度场求值失败
    #[error("速度场求值失败: {message}")]
    VelocityField {
        /// 错误信息
        message: String,
    },

    // ========================================================================
    // 并行通信
    // ========================================================================

    /// 集合通信失败
    #[error("通信错误: {message}")]
    Communication {
        /// 错误信息
        message: String,
    },

    /// 运行已被某个工作进程中止
    #[error("运行已中止 (rank {rank}): {reason}")]
    Aborted {
        /// 发起中止的 rank
        rank: usize,
        /// 中止原因
        reason: String,
    },
}

impl MtError {
    /// 创建 IO 错误
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建文件格式错误
    pub fn file_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 创建无效输入错误
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 创建网格错误
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 创建编码错误
    pub fn wire(message: impl Into<String>) -> Self {
        Self::Wire {
            message: message.into(),
        }
    }

    /// 创建速度场错误
    pub fn velocity_field(message: impl Into<String>) -> Self {
        Self::VelocityField {
            message: message.into(),
        }
    }

    /// 创建通信错误
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 是否为致命错误
    ///
    /// 致命错误出现后整个分布式运行必须中止。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ParticleCountMismatch { .. }
                | Self::DegenerateCell { .. }
                | Self::ZeroVolumeCell { .. }
                | Self::Aborted { .. }
        )
    }
}

impl From<std::io::Error> for MtError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
