// crates/mt_particle/src/generator.rs

//! 粒子生成
//!
//! 按体积加权选择单元（轮盘赌），再在单元包围盒内做拒绝采样。

use mt_foundation::{CellHandle, MtError, MtResult, SpaceVector};
use mt_mesh::MeshProvider;
use rand::Rng;

/// 单元内拒绝采样的最大尝试次数
pub const MAX_GENERATION_ATTEMPTS: u32 = 100;

/// 体积加权轮盘赌
#[derive(Debug, Clone, Default)]
pub struct RouletteWheel {
    cells: Vec<CellHandle>,
    cumulative: Vec<f64>,
}

impl RouletteWheel {
    /// 由 `(单元, 体积)` 构建
    ///
    /// 体积必须为有限正数，否则返回 [`MtError::ZeroVolumeCell`]。
    pub fn from_weights(entries: impl IntoIterator<Item = (CellHandle, f64)>) -> MtResult<Self> {
        let mut wheel = Self::default();
        let mut running = 0.0;
        for (cell, weight) in entries {
            if !(weight > 0.0) || !weight.is_finite() {
                return Err(MtError::ZeroVolumeCell {
                    level: cell.level(),
                    index: cell.index(),
                });
            }
            running += weight;
            wheel.cells.push(cell);
            wheel.cumulative.push(running);
        }
        Ok(wheel)
    }

    /// 总权重
    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 选出累计权重首次超过 `spin` 的单元
    pub fn select(&self, spin: f64) -> Option<CellHandle> {
        if self.cells.is_empty() {
            return None;
        }
        let i = self.cumulative.partition_point(|&c| c <= spin);
        Some(self.cells[i.min(self.cells.len() - 1)])
    }

    /// 随机选一个单元
    pub fn spin<R: Rng>(&self, rng: &mut R) -> Option<CellHandle> {
        let spin = rng.gen::<f64>() * self.total();
        self.select(spin)
    }
}

/// 在单元内均匀采样一点
///
/// 在包围盒内均匀取点并用 `contains_point` 拒绝，超过
/// [`MAX_GENERATION_ATTEMPTS`] 次返回 [`MtError::DegenerateCell`]。
pub fn sample_point_in_cell<V, M, R>(mesh: &M, cell: CellHandle, rng: &mut R) -> MtResult<V>
where
    V: SpaceVector,
    M: MeshProvider<V> + ?Sized,
    R: Rng,
{
    let (lower, upper) = mesh.cell_bounds(cell);
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let p = V::from_fn(|d| lower[d] + rng.gen::<f64>() * (upper[d] - lower[d]));
        if mesh.contains_point(cell, &p) {
            return Ok(p);
        }
    }
    Err(MtError::DegenerateCell {
        level: cell.level(),
        index: cell.index(),
        attempts: MAX_GENERATION_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use mt_mesh::BoxTreeMesh;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_select_boundaries() {
        let a = CellHandle::new(0, 0);
        let b = CellHandle::new(0, 1);
        let wheel = RouletteWheel::from_weights([(a, 1.0), (b, 3.0)]).unwrap();
        assert_eq!(wheel.total(), 4.0);
        assert_eq!(wheel.select(0.0), Some(a));
        assert_eq!(wheel.select(0.999), Some(a));
        assert_eq!(wheel.select(1.0), Some(b));
        assert_eq!(wheel.select(4.0), Some(b));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let err = RouletteWheel::from_weights([(CellHandle::new(2, 7), 0.0)]).unwrap_err();
        assert!(matches!(err, MtError::ZeroVolumeCell { level: 2, index: 7 }));
    }

    #[test]
    fn test_empty_wheel() {
        let wheel = RouletteWheel::from_weights(std::iter::empty::<(CellHandle, f64)>()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(wheel.spin(&mut rng).is_none());
    }

    #[test]
    fn test_volume_weighting() {
        let a = CellHandle::new(0, 0);
        let b = CellHandle::new(0, 1);
        let wheel = RouletteWheel::from_weights([(a, 1.0), (b, 9.0)]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let hits_b = (0..10_000)
            .filter(|_| wheel.spin(&mut rng) == Some(b))
            .count();
        assert!(hits_b > 8_700 && hits_b < 9_300, "hits_b = {}", hits_b);
    }

    #[test]
    fn test_samples_lie_in_cell() {
        let mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 2, 0).unwrap();
        let cell = CellHandle::new(0, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let p: DVec2 = sample_point_in_cell(&mesh, cell, &mut rng).unwrap();
            assert!(p.x >= 0.5 && p.y >= 0.5 && p.x <= 1.0 && p.y <= 1.0);
        }
    }
}
