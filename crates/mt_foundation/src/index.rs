// crates/mt_foundation/src/index.rs

//! 单元句柄与粒子标识
//!
//! 网格单元是网格上的瞬时视图，网格细化/粗化/重分区后会被销毁重建，
//! 因此粒子只保存一个轻量的值类型句柄 `(level, index)`，需要访问单元时
//! 再通过网格提供者查询。
//!
//! 句柄的全序为 `(level, index)` 字典序，粒子容器按此顺序遍历。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 无效索引标记
pub const INVALID_INDEX: u32 = u32::MAX;

/// 网格单元句柄
///
/// 仅在粒子为本地粒子或刚完成定位时有意义；任何网格拓扑变化之后都应视为过期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellHandle {
    level: u32,
    index: u32,
}

impl CellHandle {
    /// "未找到" 哨兵句柄，排序在所有有效句柄之后
    pub const INVALID: Self = Self {
        level: INVALID_INDEX,
        index: INVALID_INDEX,
    };

    /// 创建句柄
    #[inline]
    pub const fn new(level: u32, index: u32) -> Self {
        Self { level, index }
    }

    /// 细化层级（0 为根层）
    #[inline]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// 层内索引
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// 是否为有效句柄
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.level != INVALID_INDEX && self.index != INVALID_INDEX
    }
}

impl Default for CellHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for CellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "({}, {})", self.level, self.index)
        } else {
            write!(f, "(invalid)")
        }
    }
}

/// 粒子全局唯一标识
///
/// 生成后在粒子生命周期内保持不变，用作积分器辅助状态的键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl ParticleId {
    /// 原始数值
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ParticleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_order_is_level_then_index() {
        let mut handles = vec![
            CellHandle::new(1, 0),
            CellHandle::INVALID,
            CellHandle::new(0, 5),
            CellHandle::new(0, 2),
        ];
        handles.sort();
        assert_eq!(
            handles,
            vec![
                CellHandle::new(0, 2),
                CellHandle::new(0, 5),
                CellHandle::new(1, 0),
                CellHandle::INVALID,
            ]
        );
    }

    #[test]
    fn test_invalid_handle() {
        assert!(!CellHandle::INVALID.is_valid());
        assert_eq!(CellHandle::default(), CellHandle::INVALID);
        assert_eq!(CellHandle::INVALID.to_string(), "(invalid)");
        assert_eq!(CellHandle::new(2, 3).to_string(), "(2, 3)");
    }

    #[test]
    fn test_handle_serde() {
        let h = CellHandle::new(3, 17);
        let json = serde_json::to_string(&h).unwrap();
        let back: CellHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
