// crates/mt_mesh/src/provider.rs

//! 网格提供者接口
//!
//! 单元通过 [`CellHandle`] 引用。句柄在任何拓扑变化（细化、粗化、重分区）
//! 之后都可能失效，调用方应订阅变更通知并重新定位。

use crate::events::MeshObserver;
use mt_foundation::{CellHandle, SpaceVector};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;

/// 在驱动程序与粒子世界之间共享的网格
///
/// 驱动程序在时间步之间持写锁修改网格，粒子世界在时间步内只读。
pub type SharedMesh<M> = Arc<RwLock<M>>;

/// 网格提供者
pub trait MeshProvider<V: SpaceVector>: Send + Sync {
    /// 单元是否包含点（边界上的点视为包含）
    fn contains_point(&self, cell: CellHandle, point: &V) -> bool;

    /// 单元是否为活动单元（叶子）
    fn is_leaf(&self, cell: CellHandle) -> bool;

    /// 子单元，叶子返回空
    fn children_of(&self, cell: CellHandle) -> SmallVec<[CellHandle; 8]>;

    /// 单元是否属于本工作进程
    fn is_locally_owned(&self, cell: CellHandle) -> bool;

    /// 最粗层单元
    fn root_cells(&self) -> Vec<CellHandle>;

    /// 所有活动单元（所有工作进程）
    fn active_cells(&self) -> Vec<CellHandle>;

    /// 本工作进程拥有的活动单元
    fn locally_owned_active_cells(&self) -> Vec<CellHandle> {
        self.active_cells()
            .into_iter()
            .filter(|&c| self.is_locally_owned(c))
            .collect()
    }

    /// 单元体积（2D 为面积）
    fn measure(&self, cell: CellHandle) -> f64;

    /// 单元轴对齐包围盒 `(lower, upper)`
    fn cell_bounds(&self, cell: CellHandle) -> (V, V);

    /// 整个计算域的包围盒
    fn domain_bounds(&self) -> (V, V);

    /// 句柄是否指向当前存在的单元
    fn exists(&self, cell: CellHandle) -> bool;

    /// 订阅拓扑变化通知
    fn subscribe(&self, observer: Arc<dyn MeshObserver>);
}
