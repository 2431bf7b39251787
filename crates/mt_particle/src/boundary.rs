// crates/mt_particle/src/boundary.rs

//! 边界修正策略
//!
//! 对定位失败（位于所有单元之外）的粒子给出新位置。

use mt_config::BoundaryKind;
use mt_foundation::SpaceVector;
use mt_mesh::MeshProvider;

/// 边界修正策略
pub trait BoundaryPolicy<V: SpaceVector>: Send {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 为计算域外的粒子给出新位置，`None` 表示不修正
    fn reposition(&self, position: V, mesh: &dyn MeshProvider<V>) -> Option<V>;
}

/// 不修正
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFixup;

impl<V: SpaceVector> BoundaryPolicy<V> for NoFixup {
    fn name(&self) -> &'static str {
        "none"
    }

    fn reposition(&self, _position: V, _mesh: &dyn MeshProvider<V>) -> Option<V> {
        None
    }
}

/// 投影回计算域包围盒
#[derive(Debug, Default, Clone, Copy)]
pub struct ClampToDomain;

impl<V: SpaceVector> BoundaryPolicy<V> for ClampToDomain {
    fn name(&self) -> &'static str {
        "clamp"
    }

    fn reposition(&self, position: V, mesh: &dyn MeshProvider<V>) -> Option<V> {
        let (lower, upper) = mesh.domain_bounds();
        Some(position.clamp_box(lower, upper))
    }
}

/// 按配置构建策略
pub fn build_boundary<V: SpaceVector>(kind: BoundaryKind) -> Box<dyn BoundaryPolicy<V>> {
    match kind {
        BoundaryKind::None => Box::new(NoFixup),
        BoundaryKind::Clamp => Box::new(ClampToDomain),
    }
}
