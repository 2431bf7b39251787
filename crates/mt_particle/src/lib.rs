// crates/mt_particle/src/lib.rs

//! MantleTrace 粒子层
//!
//! 在分布式自适应网格上追踪被动示踪粒子。每个工作进程只持有位于自己
//! 拥有的活动单元内的粒子；粒子越过分区边界后通过集合通信交换到新的工作
//! 进程，全局粒子数在每个时间步结束时校验。
//!
//! # 模块
//!
//! - [`particle`]: 示踪粒子及其二进制编码
//! - [`population`]: 按单元分桶的粒子容器
//! - [`integrator`]: Euler / RK2 / RK4 积分器，辅助状态随粒子迁移
//! - [`wire`]: 字段描述符与定长记录布局
//! - [`world`]: 生成、定位、速度采样、时间推进与计数校验
//! - [`exchange`]: 跨工作进程的粒子交换
//! - [`storage`]: 粒子文件读写
//! - [`locator`]: 快速路径 / 自顶向下搜索 / 线性扫描的单元定位
//! - [`generator`]: 体积加权轮盘赌与单元内拒绝采样
//! - [`velocity`]: 速度场提供者
//! - [`boundary`]: 计算域外粒子的修正策略
//!
//! # 示例
//!
//! ```
//! use glam::DVec2;
//! use mt_comm::SerialCommunicator;
//! use mt_config::{BoundaryKind, IntegratorKind, ParticleConfig};
//! use mt_mesh::BoxTreeMesh;
//! use mt_particle::{UniformVelocity, World};
//! use parking_lot::RwLock;
//! use std::sync::Arc;
//!
//! let mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 4, 0).unwrap();
//! let config = ParticleConfig::default()
//!     .with_integrator(IntegratorKind::Rk2)
//!     .with_boundary(BoundaryKind::Clamp);
//! let mut world = World::new(Arc::new(RwLock::new(mesh)), SerialCommunicator::new(), &config).unwrap();
//!
//! world.generate_global_particles(100).unwrap();
//! let field = UniformVelocity::new(DVec2::new(0.5, 0.0));
//! world.advance_timestep(0.1, &field).unwrap();
//! assert_eq!(world.local_particle_count(), 100);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod exchange;
pub mod generator;
pub mod integrator;
pub mod locator;
pub mod particle;
pub mod population;
pub mod storage;
pub mod velocity;
pub mod wire;
pub mod world;

pub use boundary::{build_boundary, BoundaryPolicy, ClampToDomain, NoFixup};
pub use exchange::ExchangeStats;
pub use generator::{sample_point_in_cell, RouletteWheel, MAX_GENERATION_ATTEMPTS};
pub use integrator::{build_integrator, Euler, Integrator, Rk2, Rk4};
pub use locator::{CellLocator, LocateStats};
pub use particle::Particle;
pub use population::ParticleMap;
pub use storage::{StorageHeader, PARTICLE_FILE_MAGIC, PARTICLE_FILE_VERSION};
pub use velocity::{FnVelocityField, RigidRotation, UniformVelocity, VelocityField};
pub use wire::{DataFormat, ElementType, FieldDescriptor, RecordLayout};
pub use world::World;

/// Prelude 模块
pub mod prelude {
    pub use crate::integrator::Integrator;
    pub use crate::particle::Particle;
    pub use crate::population::ParticleMap;
    pub use crate::velocity::{UniformVelocity, VelocityField};
    pub use crate::wire::DataFormat;
    pub use crate::world::World;
}
