// crates/mt_comm/src/error.rs

//! 通信层错误类型

use mt_foundation::MtError;
use thiserror::Error;

/// 通信结果类型
pub type CommResult<T> = Result<T, CommError>;

/// 通信错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommError {
    /// 工作进程组已被中止
    #[error("工作进程组已被 rank {rank} 中止: {reason}")]
    Aborted {
        /// 发起中止的 rank
        rank: usize,
        /// 中止原因
        reason: String,
    },

    /// 参数长度与组大小不一致
    #[error("参数 {name} 长度为 {actual}, 组大小为 {expected}")]
    GroupSizeMismatch {
        /// 参数名称
        name: &'static str,
        /// 组大小
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 发送区间越界
    #[error("发送区间越界: 目标 rank {dest}, 区间 [{start}, {end}), 缓冲区长度 {len}")]
    SendRangeOutOfBounds {
        /// 目标 rank
        dest: usize,
        /// 起始偏移
        start: usize,
        /// 结束偏移
        end: usize,
        /// 缓冲区长度
        len: usize,
    },

    /// 各工作进程调用了不同的集合操作
    #[error("集合操作不匹配: {message}")]
    CollectiveMismatch {
        /// 错误信息
        message: String,
    },
}

impl CommError {
    /// 创建集合操作不匹配错误
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::CollectiveMismatch {
            message: message.into(),
        }
    }
}

impl From<CommError> for MtError {
    fn from(err: CommError) -> Self {
        match err {
            CommError::Aborted { rank, reason } => MtError::Aborted { rank, reason },
            other => MtError::communication(other.to_string()),
        }
    }
}
