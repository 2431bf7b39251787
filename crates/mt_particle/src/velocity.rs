// crates/mt_particle/src/velocity.rs

//! 速度场提供者
//!
//! 粒子世界对每个含粒子的单元调用一次 [`VelocityField::evaluate_in_cell`]，
//! 一次性求出该单元内所有粒子位置上的速度。

use mt_foundation::{CellHandle, MtResult, SpaceVector};

/// 速度场
pub trait VelocityField<V: SpaceVector> {
    /// 在单元 `cell` 内的一批位置上求速度
    ///
    /// 调用前 `out` 已清空，实现需要为每个位置追加一个速度。
    fn evaluate_in_cell(&self, cell: CellHandle, positions: &[V], out: &mut Vec<V>) -> MtResult<()>;
}

/// 匀速场
#[derive(Debug, Clone, Copy)]
pub struct UniformVelocity<V> {
    velocity: V,
}

impl<V: SpaceVector> UniformVelocity<V> {
    /// 创建匀速场
    pub fn new(velocity: V) -> Self {
        Self { velocity }
    }
}

impl<V: SpaceVector> VelocityField<V> for UniformVelocity<V> {
    fn evaluate_in_cell(&self, _cell: CellHandle, positions: &[V], out: &mut Vec<V>) -> MtResult<()> {
        out.extend(std::iter::repeat(self.velocity).take(positions.len()));
        Ok(())
    }
}

/// 绕平行于 z 轴、过 `center` 的轴的刚体旋转
///
/// `v = ω × (x - c)`，即 `(−ω·(y − c_y), ω·(x − c_x), 0)`。
#[derive(Debug, Clone, Copy)]
pub struct RigidRotation<V> {
    center: V,
    angular_velocity: f64,
}

impl<V: SpaceVector> RigidRotation<V> {
    /// 创建旋转场
    pub fn new(center: V, angular_velocity: f64) -> Self {
        Self {
            center,
            angular_velocity,
        }
    }

    fn at(&self, x: &V) -> V {
        let r = *x - self.center;
        let w = self.angular_velocity;
        V::from_fn(|d| match d {
            0 => -w * r[1],
            1 => w * r[0],
            _ => 0.0,
        })
    }
}

impl<V: SpaceVector> VelocityField<V> for RigidRotation<V> {
    fn evaluate_in_cell(&self, _cell: CellHandle, positions: &[V], out: &mut Vec<V>) -> MtResult<()> {
        out.extend(positions.iter().map(|x| self.at(x)));
        Ok(())
    }
}

/// 闭包速度场
pub struct FnVelocityField<F> {
    f: F,
}

impl<F> FnVelocityField<F> {
    /// 由逐点函数创建
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<V, F> VelocityField<V> for FnVelocityField<F>
where
    V: SpaceVector,
    F: Fn(&V) -> V,
{
    fn evaluate_in_cell(&self, _cell: CellHandle, positions: &[V], out: &mut Vec<V>) -> MtResult<()> {
        out.extend(positions.iter().map(&self.f));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec2, DVec3};

    #[test]
    fn test_rotation_is_tangential() {
        let field = RigidRotation::new(DVec2::new(0.5, 0.5), 2.0);
        let mut out = Vec::new();
        field
            .evaluate_in_cell(CellHandle::new(0, 0), &[DVec2::new(1.0, 0.5)], &mut out)
            .unwrap();
        assert!((out[0] - DVec2::new(0.0, 1.0)).length() < 1e-14);
    }

    #[test]
    fn test_rotation_3d_has_no_vertical_component() {
        let field = RigidRotation::new(DVec3::ZERO, 1.0);
        let mut out = Vec::new();
        field
            .evaluate_in_cell(CellHandle::new(0, 0), &[DVec3::new(1.0, 1.0, 1.0)], &mut out)
            .unwrap();
        assert_eq!(out[0], DVec3::new(-1.0, 1.0, 0.0));
    }

    #[test]
    fn test_uniform_fills_batch() {
        let field = UniformVelocity::new(DVec2::X);
        let mut out = Vec::new();
        field
            .evaluate_in_cell(CellHandle::new(0, 0), &[DVec2::ZERO; 5], &mut out)
            .unwrap();
        assert_eq!(out, vec![DVec2::X; 5]);
    }
}
