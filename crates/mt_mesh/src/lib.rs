// crates/mt_mesh/src/lib.rs

//! MantleTrace 网格层
//!
//! 粒子子系统通过 [`MeshProvider`] 这一窄接口消费网格：
//! 点包含测试、叶子判断、子单元枚举、归属判断、根单元与活动单元枚举、
//! 单元体积与包围盒，以及拓扑变化订阅。
//!
//! # 模块
//!
//! - [`provider`]: 网格提供者 trait
//! - [`events`]: 网格变更事件与观察者分发
//! - [`box_tree`]: 轴对齐层次盒网格（2D 四叉树 / 3D 八叉树），支持细化、粗化与连续分区
//! - [`error`]: 网格错误类型
//!
//! # 示例
//!
//! ```
//! use glam::DVec2;
//! use mt_mesh::{BoxTreeMesh, MeshProvider};
//!
//! let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
//! assert_eq!(mesh.active_cells().len(), 4);
//!
//! mesh.refine_global(1).unwrap();
//! assert_eq!(mesh.active_cells().len(), 16);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod box_tree;
pub mod error;
pub mod events;
pub mod provider;

pub use box_tree::BoxTreeMesh;
pub use error::{MeshError, MeshResult};
pub use events::{FnObserver, MeshEvent, MeshObserver, MeshSignals};
pub use provider::{MeshProvider, SharedMesh};

/// Prelude 模块
pub mod prelude {
    pub use crate::box_tree::BoxTreeMesh;
    pub use crate::error::{MeshError, MeshResult};
    pub use crate::events::{MeshEvent, MeshObserver};
    pub use crate::provider::{MeshProvider, SharedMesh};
}
