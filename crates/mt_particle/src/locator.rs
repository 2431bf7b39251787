// crates/mt_particle/src/locator.rs

//! 粒子定位
//!
//! 按以下顺序为粒子查找所属活动单元：
//!
//! 1. 快速路径：网格未变化，且提示单元仍为叶子并包含粒子
//! 2. 自顶向下搜索：从每个根单元出发，沿包含该点的子单元下降（显式工作栈）
//! 3. 线性扫描：遍历所有活动单元（处理浮点容差导致的下降失败）
//! 4. 未找到：返回 `CellHandle::INVALID`，粒子标记为非本地
//!
//! 同一网格上的定位结果在所有工作进程上一致，因此边界上的粒子恰好被一个
//! 工作进程认领。

use crate::particle::Particle;
use mt_foundation::{CellHandle, SpaceVector};
use mt_mesh::MeshProvider;
use std::cell::Cell;
use std::marker::PhantomData;
use tracing::trace;

/// 定位路径统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocateStats {
    /// 快速路径命中
    pub fast_path: u64,
    /// 自顶向下搜索命中
    pub tree_search: u64,
    /// 线性扫描命中
    pub linear_scan: u64,
    /// 未找到
    pub not_found: u64,
}

impl LocateStats {
    /// 总查询次数
    #[inline]
    pub fn total(&self) -> u64 {
        self.fast_path + self.tree_search + self.linear_scan + self.not_found
    }

    /// 快速路径命中率
    #[inline]
    pub fn fast_path_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.fast_path as f64 / total as f64
        }
    }

    /// 累加另一组统计
    pub fn merge(&mut self, other: &LocateStats) {
        self.fast_path += other.fast_path;
        self.tree_search += other.tree_search;
        self.linear_scan += other.linear_scan;
        self.not_found += other.not_found;
    }
}

/// 单元定位器
pub struct CellLocator<'a, V, M: ?Sized> {
    mesh: &'a M,
    hints_valid: bool,
    fast_path: Cell<u64>,
    tree_search: Cell<u64>,
    linear_scan: Cell<u64>,
    not_found: Cell<u64>,
    _marker: PhantomData<V>,
}

impl<'a, V, M> CellLocator<'a, V, M>
where
    V: SpaceVector,
    M: MeshProvider<V> + ?Sized,
{
    /// 创建定位器
    ///
    /// `hints_valid` 为 false 时（网格刚变化过）跳过快速路径。
    pub fn new(mesh: &'a M, hints_valid: bool) -> Self {
        Self {
            mesh,
            hints_valid,
            fast_path: Cell::new(0),
            tree_search: Cell::new(0),
            linear_scan: Cell::new(0),
            not_found: Cell::new(0),
            _marker: PhantomData,
        }
    }

    /// 查找包含 `position` 的活动单元
    pub fn locate(&self, position: &V, hint: CellHandle) -> CellHandle {
        if self.hints_valid
            && hint.is_valid()
            && self.mesh.is_leaf(hint)
            && self.mesh.contains_point(hint, position)
        {
            bump(&self.fast_path);
            return hint;
        }

        if let Some(cell) = self.descend(position) {
            bump(&self.tree_search);
            return cell;
        }

        if let Some(cell) = self
            .mesh
            .active_cells()
            .into_iter()
            .find(|&c| self.mesh.contains_point(c, position))
        {
            trace!("Tree search missed {:?}, linear scan found {}", position, cell);
            bump(&self.linear_scan);
            return cell;
        }

        trace!("No cell contains {:?}", position);
        bump(&self.not_found);
        CellHandle::INVALID
    }

    /// 定位粒子并更新其所属单元与本地标志，返回找到的单元
    pub fn find_cell(&self, particle: &mut Particle<V>, hint: CellHandle) -> CellHandle {
        let cell = self.locate(&particle.position(), hint);
        particle.set_local(cell.is_valid() && self.mesh.is_locally_owned(cell));
        particle.set_cell(cell);
        cell
    }

    fn descend(&self, position: &V) -> Option<CellHandle> {
        let mut stack: Vec<CellHandle> = self.mesh.root_cells();
        stack.reverse();
        while let Some(cell) = stack.pop() {
            if !self.mesh.contains_point(cell, position) {
                continue;
            }
            if self.mesh.is_leaf(cell) {
                return Some(cell);
            }
            stack.extend(self.mesh.children_of(cell).into_iter().rev());
        }
        None
    }

    /// 统计信息
    pub fn stats(&self) -> LocateStats {
        LocateStats {
            fast_path: self.fast_path.get(),
            tree_search: self.tree_search.get(),
            linear_scan: self.linear_scan.get(),
            not_found: self.not_found.get(),
        }
    }
}

#[inline]
fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use mt_foundation::ParticleId;
    use mt_mesh::BoxTreeMesh;

    fn mesh() -> BoxTreeMesh<DVec2> {
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
        mesh.refine_where(|lo, _| lo.x < 0.5 && lo.y < 0.5).unwrap();
        mesh
    }

    #[test]
    fn test_descent_reaches_leaf() {
        let mesh = mesh();
        let locator = CellLocator::new(&mesh, false);
        let cell = locator.locate(&DVec2::new(0.3, 0.1), CellHandle::INVALID);
        assert_eq!(cell.level(), 1);
        assert!(mesh.is_leaf(cell));
        assert_eq!(locator.stats().tree_search, 1);
    }

    #[test]
    fn test_hint_ignored_when_invalidated() {
        let mesh = mesh();
        let hint = CellHandle::new(0, 1);
        let p = DVec2::new(0.75, 0.25);

        let stale = CellLocator::new(&mesh, false);
        assert_eq!(stale.locate(&p, hint), hint);
        assert_eq!(stale.stats().fast_path, 0);

        let fresh = CellLocator::new(&mesh, true);
        assert_eq!(fresh.locate(&p, hint), hint);
        assert_eq!(fresh.stats().fast_path, 1);
    }

    #[test]
    fn test_non_leaf_hint_falls_through() {
        let mesh = mesh();
        let locator = CellLocator::new(&mesh, true);
        let cell = locator.locate(&DVec2::new(0.1, 0.1), CellHandle::new(0, 0));
        assert_eq!(cell.level(), 1);
        assert_eq!(locator.stats().fast_path, 0);
    }

    #[test]
    fn test_outside_domain() {
        let mesh = mesh();
        let locator = CellLocator::new(&mesh, true);
        let mut p = Particle::new(ParticleId(0), DVec2::new(1.5, 0.5));
        let cell = locator.find_cell(&mut p, CellHandle::INVALID);
        assert!(!cell.is_valid());
        assert!(!p.is_local());
        assert_eq!(locator.stats().not_found, 1);
    }
}
