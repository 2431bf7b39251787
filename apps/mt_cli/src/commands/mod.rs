// apps/mt_cli/src/commands/mod.rs

//! 命令实现

pub mod info;
pub mod run;
pub mod validate;

use mt_foundation::SpaceVector;

/// 由配置中的分量列表构建向量，缺失分量取 0
pub(crate) fn to_vector<V: SpaceVector>(values: &[f64]) -> V {
    V::from_fn(|d| values.get(d).copied().unwrap_or(0.0))
}
