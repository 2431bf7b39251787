// crates/mt_mesh/src/box_tree.rs

//! 轴对齐层次盒网格
//!
//! 根层为 `s^D` 个等大小盒子（维度 0 变化最快的字典序），每次细化把一个
//! 活动单元均分为 `2^D` 个子单元，子单元在下一层中连续存放，第 `k` 个子单元
//! 在维度 `d` 上取上半部分当且仅当 `k` 的第 `d` 位为 1。
//!
//! 粗化后子单元槽位置空，句柄不会被复用到同一层的其他单元上。
//!
//! 分区把深度优先顺序下的活动单元切成 `n_ranks` 段连续区间。

use crate::error::{MeshError, MeshResult};
use crate::events::{MeshEvent, MeshObserver, MeshSignals};
use crate::provider::MeshProvider;
use mt_foundation::{CellHandle, SpaceVector};
use smallvec::SmallVec;
use std::sync::Arc;

/// 非叶子单元的归属标记
const NO_OWNER: usize = usize::MAX;

/// 包含测试的相对容差
const CONTAINS_REL_TOL: f64 = 1e-12;

#[derive(Debug, Clone)]
struct CellNode<V> {
    lower: V,
    upper: V,
    parent: CellHandle,
    first_child: Option<u32>,
    owner: usize,
}

/// 层次盒网格
#[derive(Debug)]
pub struct BoxTreeMesh<V: SpaceVector> {
    lower: V,
    upper: V,
    subdivisions: usize,
    rank: usize,
    levels: Vec<Vec<Option<CellNode<V>>>>,
    signals: MeshSignals,
}

impl<V: SpaceVector> BoxTreeMesh<V> {
    /// 每个单元的子单元数
    pub const CHILDREN: usize = 1 << V::DIM;

    /// 创建网格
    ///
    /// # 参数
    ///
    /// - `lower`, `upper`: 计算域包围盒
    /// - `subdivisions`: 每个维度上的根单元数
    /// - `rank`: 本工作进程编号，用于 `is_locally_owned`
    ///
    /// 初始时所有单元归属 rank 0。
    pub fn new(lower: V, upper: V, subdivisions: usize, rank: usize) -> MeshResult<Self> {
        if subdivisions == 0 {
            return Err(MeshError::invalid_geometry("subdivisions 必须为正"));
        }
        for d in 0..V::DIM {
            if !(upper[d] > lower[d]) || !lower[d].is_finite() || !upper[d].is_finite() {
                return Err(MeshError::invalid_geometry(format!(
                    "维度 {} 的范围非法: [{}, {}]",
                    d, lower[d], upper[d]
                )));
            }
        }

        let n_roots = subdivisions.pow(V::DIM as u32);
        let extent = upper - lower;
        let roots = (0..n_roots)
            .map(|i| {
                let multi = |d: usize| (i / subdivisions.pow(d as u32)) % subdivisions;
                let lo = V::from_fn(|d| {
                    lower[d] + extent[d] * multi(d) as f64 / subdivisions as f64
                });
                let hi = V::from_fn(|d| {
                    lower[d] + extent[d] * (multi(d) + 1) as f64 / subdivisions as f64
                });
                Some(CellNode {
                    lower: lo,
                    upper: hi,
                    parent: CellHandle::INVALID,
                    first_child: None,
                    owner: 0,
                })
            })
            .collect();

        Ok(Self {
            lower,
            upper,
            subdivisions,
            rank,
            levels: vec![roots],
            signals: MeshSignals::new(),
        })
    }

    /// 本工作进程编号
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// 每个维度的根单元数
    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    /// 当前最深层级
    pub fn max_level(&self) -> u32 {
        self.levels
            .iter()
            .rposition(|level| level.iter().any(Option::is_some))
            .unwrap_or(0) as u32
    }

    /// 活动单元的归属 rank，非活动或不存在时返回 `None`
    pub fn owner_of(&self, cell: CellHandle) -> Option<usize> {
        self.node(cell)
            .filter(|n| n.first_child.is_none())
            .map(|n| n.owner)
    }

    /// 父单元，根单元返回 `None`
    pub fn parent_of(&self, cell: CellHandle) -> Option<CellHandle> {
        self.node(cell)
            .map(|n| n.parent)
            .filter(CellHandle::is_valid)
    }

    fn node(&self, cell: CellHandle) -> Option<&CellNode<V>> {
        if !cell.is_valid() {
            return None;
        }
        self.levels
            .get(cell.level() as usize)?
            .get(cell.index() as usize)?
            .as_ref()
    }

    fn node_mut(&mut self, cell: CellHandle) -> Option<&mut CellNode<V>> {
        if !cell.is_valid() {
            return None;
        }
        self.levels
            .get_mut(cell.level() as usize)?
            .get_mut(cell.index() as usize)?
            .as_mut()
    }

    fn children_range(&self, cell: CellHandle) -> Option<(u32, u32)> {
        let first = self.node(cell)?.first_child?;
        Some((first, first + Self::CHILDREN as u32))
    }

    // ========================================================================
    // 细化
    // ========================================================================

    fn refine_one(&mut self, cell: CellHandle) -> MeshResult<()> {
        let node = self
            .node(cell)
            .cloned()
            .ok_or(MeshError::CellNotFound { cell })?;
        if node.first_child.is_some() {
            return Err(MeshError::NotActive {
                cell,
                operation: "refine",
            });
        }

        let child_level = cell.level() as usize + 1;
        if self.levels.len() <= child_level {
            self.levels.push(Vec::new());
        }
        let first = self.levels[child_level].len() as u32;
        let mid = (node.lower + node.upper) * 0.5;

        for k in 0..Self::CHILDREN {
            let upper_half = |d: usize| (k >> d) & 1 == 1;
            let lo = V::from_fn(|d| if upper_half(d) { mid[d] } else { node.lower[d] });
            let hi = V::from_fn(|d| if upper_half(d) { node.upper[d] } else { mid[d] });
            self.levels[child_level].push(Some(CellNode {
                lower: lo,
                upper: hi,
                parent: cell,
                first_child: None,
                owner: node.owner,
            }));
        }

        if let Some(parent) = self.node_mut(cell) {
            parent.first_child = Some(first);
            parent.owner = NO_OWNER;
        }
        Ok(())
    }

    /// 细化一组活动单元，通知观察者
    pub fn refine(&mut self, cells: &[CellHandle]) -> MeshResult<usize> {
        for &cell in cells {
            self.refine_one(cell)?;
        }
        if !cells.is_empty() {
            self.signals.emit(MeshEvent::Refined { cells: cells.len() });
        }
        Ok(cells.len())
    }

    /// 细化所有包围盒满足谓词的活动单元
    pub fn refine_where(&mut self, pred: impl Fn(&V, &V) -> bool) -> MeshResult<usize> {
        let targets: Vec<CellHandle> = self
            .active_cells_in_order()
            .into_iter()
            .filter(|&c| self.node(c).map_or(false, |n| pred(&n.lower, &n.upper)))
            .collect();
        self.refine(&targets)
    }

    /// 全局细化 `times` 次
    pub fn refine_global(&mut self, times: usize) -> MeshResult<usize> {
        let mut total = 0;
        for _ in 0..times {
            let targets = self.active_cells_in_order();
            total += self.refine(&targets)?;
        }
        Ok(total)
    }

    // ========================================================================
    // 粗化
    // ========================================================================

    fn coarsen_one(&mut self, cell: CellHandle) -> MeshResult<()> {
        let (first, end) = self.children_range(cell).ok_or(MeshError::CannotCoarsen {
            cell,
            reason: "单元没有子单元".into(),
        })?;
        let child_level = cell.level() + 1;

        let children: Vec<CellHandle> = (first..end)
            .map(|i| CellHandle::new(child_level, i))
            .collect();
        if let Some(&busy) = children
            .iter()
            .find(|&&c| self.node(c).map_or(true, |n| n.first_child.is_some()))
        {
            return Err(MeshError::CannotCoarsen {
                cell,
                reason: format!("子单元 {} 不是活动单元", busy),
            });
        }

        let owner = self.node(children[0]).map_or(0, |n| n.owner);
        for child in children {
            self.levels[child.level() as usize][child.index() as usize] = None;
        }
        if let Some(parent) = self.node_mut(cell) {
            parent.first_child = None;
            parent.owner = owner;
        }
        Ok(())
    }

    /// 粗化一组父单元（其子单元必须全部为活动单元），通知观察者
    pub fn coarsen(&mut self, cells: &[CellHandle]) -> MeshResult<usize> {
        for &cell in cells {
            self.coarsen_one(cell)?;
        }
        if !cells.is_empty() {
            self.signals.emit(MeshEvent::Coarsened { cells: cells.len() });
        }
        Ok(cells.len())
    }

    /// 粗化到最深层级不超过 `level`
    pub fn coarsen_to_level(&mut self, level: u32) -> MeshResult<usize> {
        let mut total = 0;
        while self.max_level() > level {
            let parent_level = self.max_level() - 1;
            let parents: Vec<CellHandle> = self.levels[parent_level as usize]
                .iter()
                .enumerate()
                .filter(|(_, n)| n.as_ref().map_or(false, |n| n.first_child.is_some()))
                .map(|(i, _)| CellHandle::new(parent_level, i as u32))
                .collect();
            for &cell in &parents {
                self.coarsen_one(cell)?;
            }
            total += parents.len();
        }
        while self.levels.len() > 1 && self.levels.last().map_or(false, |l| l.iter().all(Option::is_none)) {
            self.levels.pop();
        }
        if total > 0 {
            self.signals.emit(MeshEvent::Coarsened { cells: total });
        }
        Ok(total)
    }

    // ========================================================================
    // 分区
    // ========================================================================

    /// 把深度优先顺序下的活动单元切成 `n_ranks` 段连续区间
    pub fn partition(&mut self, n_ranks: usize) -> MeshResult<()> {
        if n_ranks == 0 {
            return Err(MeshError::InvalidPartition { n_ranks });
        }
        let active = self.active_cells_in_order();
        let n = active.len();
        for (i, cell) in active.into_iter().enumerate() {
            if let Some(node) = self.node_mut(cell) {
                node.owner = i * n_ranks / n;
            }
        }
        self.signals.emit(MeshEvent::Repartitioned { n_ranks });
        tracing::debug!("Mesh partitioned: {} active cells over {} ranks", n, n_ranks);
        Ok(())
    }

    /// 深度优先顺序的活动单元
    fn active_cells_in_order(&self) -> Vec<CellHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<CellHandle> = self.root_handles().rev().collect();
        while let Some(cell) = stack.pop() {
            match self.children_range(cell) {
                Some((first, end)) => {
                    stack.extend((first..end).rev().map(|i| CellHandle::new(cell.level() + 1, i)));
                }
                None => out.push(cell),
            }
        }
        out
    }

    fn root_handles(&self) -> impl DoubleEndedIterator<Item = CellHandle> {
        (0..self.levels[0].len() as u32).map(|i| CellHandle::new(0, i))
    }
}

impl<V: SpaceVector> MeshProvider<V> for BoxTreeMesh<V> {
    fn contains_point(&self, cell: CellHandle, point: &V) -> bool {
        let Some(node) = self.node(cell) else {
            return false;
        };
        (0..V::DIM).all(|d| {
            let tol = CONTAINS_REL_TOL * (node.upper[d] - node.lower[d]);
            point[d] >= node.lower[d] - tol && point[d] <= node.upper[d] + tol
        })
    }

    fn is_leaf(&self, cell: CellHandle) -> bool {
        self.node(cell).map_or(false, |n| n.first_child.is_none())
    }

    fn children_of(&self, cell: CellHandle) -> SmallVec<[CellHandle; 8]> {
        match self.children_range(cell) {
            Some((first, end)) => (first..end)
                .map(|i| CellHandle::new(cell.level() + 1, i))
                .collect(),
            None => SmallVec::new(),
        }
    }

    fn is_locally_owned(&self, cell: CellHandle) -> bool {
        self.owner_of(cell) == Some(self.rank)
    }

    fn root_cells(&self) -> Vec<CellHandle> {
        self.root_handles().collect()
    }

    fn active_cells(&self) -> Vec<CellHandle> {
        self.active_cells_in_order()
    }

    fn measure(&self, cell: CellHandle) -> f64 {
        self.node(cell).map_or(0.0, |n| {
            (0..V::DIM).map(|d| n.upper[d] - n.lower[d]).product()
        })
    }

    fn cell_bounds(&self, cell: CellHandle) -> (V, V) {
        self.node(cell)
            .map_or((V::default(), V::default()), |n| (n.lower, n.upper))
    }

    fn domain_bounds(&self) -> (V, V) {
        (self.lower, self.upper)
    }

    fn exists(&self, cell: CellHandle) -> bool {
        self.node(cell).is_some()
    }

    fn subscribe(&self, observer: Arc<dyn MeshObserver>) {
        self.signals.subscribe(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec2, DVec3};

    #[test]
    fn test_root_layout_is_lexicographic() {
        let mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::new(2.0, 1.0), 2, 0).unwrap();
        let (lo, hi) = mesh.cell_bounds(CellHandle::new(0, 1));
        assert_eq!(lo, DVec2::new(1.0, 0.0));
        assert_eq!(hi, DVec2::new(2.0, 0.5));
        let (lo, _) = mesh.cell_bounds(CellHandle::new(0, 2));
        assert_eq!(lo, DVec2::new(0.0, 0.5));
    }

    #[test]
    fn test_refine_children_bits() {
        let mut mesh = BoxTreeMesh::new(DVec3::ZERO, DVec3::ONE, 1, 0).unwrap();
        let root = CellHandle::new(0, 0);
        mesh.refine(&[root]).unwrap();

        let children = mesh.children_of(root);
        assert_eq!(children.len(), 8);
        assert!(!mesh.is_leaf(root));
        let (lo, hi) = mesh.cell_bounds(children[5]);
        assert_eq!(lo, DVec3::new(0.5, 0.0, 0.5));
        assert_eq!(hi, DVec3::new(1.0, 0.5, 1.0));
        assert_eq!(mesh.parent_of(children[5]), Some(root));
    }

    #[test]
    fn test_measure_sums_to_domain() {
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::new(3.0, 2.0), 2, 0).unwrap();
        mesh.refine_where(|lo, _| lo.x < 1.0).unwrap();
        let total: f64 = mesh.active_cells().iter().map(|&c| mesh.measure(c)).sum();
        assert!((total - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_coarsen_restores_roots() {
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
        mesh.refine_global(2).unwrap();
        assert_eq!(mesh.max_level(), 2);
        assert_eq!(mesh.coarsen_to_level(0).unwrap(), 4 * 4 + 4);
        assert_eq!(mesh.active_cells(), mesh.root_cells());
        assert!(!mesh.exists(CellHandle::new(1, 0)));
    }

    #[test]
    fn test_coarsen_requires_leaf_children() {
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 1, 0).unwrap();
        let root = CellHandle::new(0, 0);
        mesh.refine_global(2).unwrap();
        assert!(matches!(
            mesh.coarsen(&[root]),
            Err(MeshError::CannotCoarsen { .. })
        ));
    }

    #[test]
    fn test_partition_contiguous() {
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 1).unwrap();
        mesh.partition(2).unwrap();
        let owners: Vec<_> = mesh
            .active_cells()
            .iter()
            .map(|&c| mesh.owner_of(c).unwrap())
            .collect();
        assert_eq!(owners, vec![0, 0, 1, 1]);
        assert_eq!(mesh.locally_owned_active_cells().len(), 2);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
        let p = DVec2::new(0.5, 0.25);
        assert!(mesh.contains_point(CellHandle::new(0, 0), &p));
        assert!(mesh.contains_point(CellHandle::new(0, 1), &p));
        assert!(!mesh.contains_point(CellHandle::new(0, 2), &p));
        assert!(!mesh.contains_point(CellHandle::INVALID, &p));
    }

    #[test]
    fn test_rejects_empty_domain() {
        assert!(BoxTreeMesh::new(DVec2::ZERO, DVec2::new(1.0, 0.0), 1, 0).is_err());
        assert!(BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 0, 0).is_err());
    }
}
