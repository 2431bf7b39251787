// crates/mt_particle/tests/locate.rs

//! 定位路径测试
//!
//! 用包装网格统计接口调用次数，确认快速路径不触发树搜索，
//! 以及树下降失败时线性扫描兜底。

use glam::DVec2;
use mt_foundation::{CellHandle, ParticleId};
use mt_mesh::{BoxTreeMesh, MeshObserver, MeshProvider};
use mt_particle::{CellLocator, Particle};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 统计调用次数的网格包装；`broken_tree` 为 true 时不报告任何子单元
struct CountingMesh {
    inner: BoxTreeMesh<DVec2>,
    broken_tree: bool,
    root_calls: AtomicUsize,
    scan_calls: AtomicUsize,
}

impl CountingMesh {
    fn new(broken_tree: bool) -> Self {
        let mut inner = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
        inner.refine_global(2).unwrap();
        Self {
            inner,
            broken_tree,
            root_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
        }
    }

    fn root_calls(&self) -> usize {
        self.root_calls.load(Ordering::SeqCst)
    }

    fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }
}

impl MeshProvider<DVec2> for CountingMesh {
    fn contains_point(&self, cell: CellHandle, point: &DVec2) -> bool {
        self.inner.contains_point(cell, point)
    }

    fn is_leaf(&self, cell: CellHandle) -> bool {
        self.inner.is_leaf(cell)
    }

    fn children_of(&self, cell: CellHandle) -> SmallVec<[CellHandle; 8]> {
        if self.broken_tree {
            SmallVec::new()
        } else {
            self.inner.children_of(cell)
        }
    }

    fn is_locally_owned(&self, cell: CellHandle) -> bool {
        self.inner.is_locally_owned(cell)
    }

    fn root_cells(&self) -> Vec<CellHandle> {
        self.root_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.root_cells()
    }

    fn active_cells(&self) -> Vec<CellHandle> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.active_cells()
    }

    fn measure(&self, cell: CellHandle) -> f64 {
        self.inner.measure(cell)
    }

    fn cell_bounds(&self, cell: CellHandle) -> (DVec2, DVec2) {
        self.inner.cell_bounds(cell)
    }

    fn domain_bounds(&self) -> (DVec2, DVec2) {
        self.inner.domain_bounds()
    }

    fn exists(&self, cell: CellHandle) -> bool {
        self.inner.exists(cell)
    }

    fn subscribe(&self, observer: Arc<dyn MeshObserver>) {
        self.inner.subscribe(observer)
    }
}

#[test]
fn test_valid_hint_skips_tree_search() {
    let mesh = CountingMesh::new(false);
    let locator = CellLocator::new(&mesh, false);
    let position = DVec2::new(0.33, 0.61);
    let cell = locator.locate(&position, CellHandle::INVALID);
    assert_eq!(cell.level(), 2);
    assert_eq!(mesh.root_calls(), 1);

    let locator = CellLocator::new(&mesh, true);
    let mut particle = Particle::new(ParticleId(1), DVec2::new(0.34, 0.62));
    assert_eq!(locator.find_cell(&mut particle, cell), cell);
    assert!(particle.is_local());
    assert_eq!(particle.cell(), cell);
    assert_eq!(mesh.root_calls(), 1);
    assert_eq!(mesh.scan_calls(), 0);
    assert_eq!(locator.stats().fast_path, 1);
}

#[test]
fn test_stale_hint_falls_back_to_tree() {
    let mesh = CountingMesh::new(false);
    let locator = CellLocator::new(&mesh, true);
    let left = locator.locate(&DVec2::new(0.1, 0.1), CellHandle::INVALID);
    let right = locator.locate(&DVec2::new(0.9, 0.9), left);
    assert_ne!(left, right);
    assert_eq!(mesh.root_calls(), 2);
    assert_eq!(locator.stats().tree_search, 2);
    assert_eq!(locator.stats().fast_path, 0);
}

#[test]
fn test_linear_scan_when_descent_fails() {
    let mesh = CountingMesh::new(true);
    let locator = CellLocator::new(&mesh, false);
    let cell = locator.locate(&DVec2::new(0.6, 0.2), CellHandle::INVALID);
    assert!(cell.is_valid());
    assert!(mesh.is_leaf(cell));
    assert!(mesh.contains_point(cell, &DVec2::new(0.6, 0.2)));
    assert_eq!(mesh.scan_calls(), 1);
    assert_eq!(locator.stats().linear_scan, 1);
}

#[test]
fn test_outside_point_exhausts_all_paths() {
    let mesh = CountingMesh::new(false);
    let locator = CellLocator::new(&mesh, true);
    let cell = locator.locate(&DVec2::new(-0.5, 0.5), CellHandle::new(2, 0));
    assert!(!cell.is_valid());
    assert_eq!(mesh.root_calls(), 1);
    assert_eq!(mesh.scan_calls(), 1);
    assert_eq!(locator.stats().not_found, 1);
}
