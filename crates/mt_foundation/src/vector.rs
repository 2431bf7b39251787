// crates/mt_foundation/src/vector.rs

//! 空间向量抽象
//!
//! 粒子子系统在 2D 与 3D 下共用同一套代码，维度由向量类型在编译期决定。
//! 该 trait 是密封的，只有 `glam::DVec2` 与 `glam::DVec3` 实现。

use glam::{DVec2, DVec3};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub};

mod private {
    pub trait Sealed {}
    impl Sealed for glam::DVec2 {}
    impl Sealed for glam::DVec3 {}
}

/// 空间向量 trait（密封）
///
/// 提供积分器、编码器、网格几何所需的最小运算集合。
pub trait SpaceVector:
    private::Sealed
    + Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
    + AddAssign
    + Index<usize, Output = f64>
    + IndexMut<usize>
{
    /// 空间维度
    const DIM: usize;

    /// 按分量构造
    fn from_fn(f: impl FnMut(usize) -> f64) -> Self;

    /// 所有分量取同一值
    fn splat_value(v: f64) -> Self;

    /// 读取第 `d` 个分量
    #[inline]
    fn component(&self, d: usize) -> f64 {
        self[d]
    }

    /// 逐分量截断到 `[lo, hi]`
    #[inline]
    fn clamp_box(self, lo: Self, hi: Self) -> Self {
        Self::from_fn(|d| self[d].max(lo[d]).min(hi[d]))
    }

    /// 所有分量是否为有限值
    #[inline]
    fn is_finite_vec(&self) -> bool {
        (0..Self::DIM).all(|d| self[d].is_finite())
    }
}

impl SpaceVector for DVec2 {
    const DIM: usize = 2;

    #[inline]
    fn from_fn(mut f: impl FnMut(usize) -> f64) -> Self {
        DVec2::new(f(0), f(1))
    }

    #[inline]
    fn splat_value(v: f64) -> Self {
        DVec2::splat(v)
    }
}

impl SpaceVector for DVec3 {
    const DIM: usize = 3;

    #[inline]
    fn from_fn(mut f: impl FnMut(usize) -> f64) -> Self {
        DVec3::new(f(0), f(1), f(2))
    }

    #[inline]
    fn splat_value(v: f64) -> Self {
        DVec3::splat(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_components<V: SpaceVector>(v: V) -> f64 {
        (0..V::DIM).map(|d| v.component(d)).sum()
    }

    #[test]
    fn test_dimension_constants() {
        assert_eq!(<DVec2 as SpaceVector>::DIM, 2);
        assert_eq!(<DVec3 as SpaceVector>::DIM, 3);
    }

    #[test]
    fn test_from_fn_and_generic_access() {
        let v = DVec3::from_fn(|d| (d + 1) as f64);
        assert_eq!(v, DVec3::new(1.0, 2.0, 3.0));
        assert!((sum_components(v) - 6.0).abs() < 1e-14);
    }

    #[test]
    fn test_clamp_box() {
        let p = DVec2::new(-0.5, 1.5);
        let c = p.clamp_box(DVec2::ZERO, DVec2::ONE);
        assert_eq!(c, DVec2::new(0.0, 1.0));
    }

    #[test]
    fn test_finite_check() {
        assert!(DVec2::splat_value(1.0).is_finite_vec());
        assert!(!DVec2::new(f64::NAN, 0.0).is_finite_vec());
    }
}
