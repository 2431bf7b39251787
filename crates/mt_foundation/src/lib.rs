// crates/mt_foundation/src/lib.rs

//! MantleTrace Foundation Layer
//!
//! 粒子输运子系统的基础层，提供所有上层 crate 共用的抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `MtError` 与 `MtResult`
//! - [`index`]: 单元句柄 `CellHandle`（层级 + 层内索引）与粒子标识 `ParticleId`
//! - [`vector`]: 密封的空间向量 trait（仅 `DVec2` / `DVec3` 可实现）
//!
//! # 设计原则
//!
//! 1. **值类型句柄**: 单元通过 `(level, index)` 引用，不持有网格指针
//! 2. **整数标识**: 粒子标识为 `u64`，可直接作为辅助状态的键
//! 3. **编译期维度**: 维度由向量类型决定，`D` 不作为运行时参数传递
//!
//! # 示例
//!
//! ```
//! use mt_foundation::{CellHandle, ParticleId, SpaceVector};
//! use glam::DVec2;
//!
//! let cell = CellHandle::new(1, 7);
//! assert!(cell.is_valid());
//! assert!(!CellHandle::INVALID.is_valid());
//!
//! let id = ParticleId(42);
//! assert_eq!(id.get(), 42);
//!
//! let v = DVec2::from_fn(|d| d as f64);
//! assert_eq!(v.component(1), 1.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod vector;

// 重导出常用类型
pub use error::{MtError, MtResult};
pub use index::{CellHandle, ParticleId};
pub use vector::SpaceVector;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{MtError, MtResult};
    pub use crate::index::{CellHandle, ParticleId};
    pub use crate::vector::SpaceVector;
}
