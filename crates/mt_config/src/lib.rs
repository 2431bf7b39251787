// crates/mt_config/src/lib.rs

//! MantleTrace Config Layer
//!
//! 配置层，提供粒子子系统配置与命令行驱动的运行配置。
//! 本层无泛型，所有数值使用 f64 / 整数并以 JSON 序列化。
//!
//! # 模块概览
//!
//! - [`particle_config`]: `ParticleConfig`、积分器与边界策略选择
//! - [`run_config`]: `RunConfig` 运行配置（网格、时间步、速度场、输出）
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! mt_cli       ─> uses RunConfig
//! mt_particle  ─> uses ParticleConfig, IntegratorKind, BoundaryKind
//! mt_config    ─> (本层)
//! mt_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod particle_config;
pub mod run_config;

// 重导出核心类型
pub use error::ConfigError;
pub use particle_config::{BoundaryKind, IntegratorKind, ParticleConfig};
pub use run_config::{MeshConfig, OutputConfig, RunConfig, TimeConfig, VelocityConfig};
