// crates/mt_config/src/particle_config.rs

//! 粒子子系统配置
//!
//! 粒子总数、积分器类型、随机数种子与边界修正策略。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// 积分器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    /// 前向 Euler，1 个子步
    Euler,
    /// 二阶 Runge-Kutta（中点法），2 个子步
    Rk2,
    /// 经典四阶 Runge-Kutta，4 个子步
    #[default]
    Rk4,
}

impl IntegratorKind {
    /// 所有积分器类型
    pub const ALL: [IntegratorKind; 3] = [Self::Euler, Self::Rk2, Self::Rk4];

    /// 每个时间步的子步数
    pub fn sub_steps(self) -> usize {
        match self {
            Self::Euler => 1,
            Self::Rk2 => 2,
            Self::Rk4 => 4,
        }
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Euler => "euler",
            Self::Rk2 => "rk2",
            Self::Rk4 => "rk4",
        }
    }
}

impl fmt::Display for IntegratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IntegratorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" => Ok(Self::Euler),
            "rk2" => Ok(Self::Rk2),
            "rk4" => Ok(Self::Rk4),
            other => Err(ConfigError::invalid(
                "particles.integrator",
                other,
                "可选值: euler, rk2, rk4",
            )),
        }
    }
}

/// 边界修正策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// 不修正，离开计算域的粒子保持未定位状态
    #[default]
    None,
    /// 把计算域外的粒子投影回计算域包围盒
    Clamp,
}

/// 粒子子系统配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// 全局粒子总数
    #[serde(default = "default_n_particles")]
    pub n_particles: u64,

    /// 积分器
    #[serde(default)]
    pub integrator: IntegratorKind,

    /// 随机数种子（每个工作进程以 rank 作为流编号）
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// 边界修正策略
    #[serde(default)]
    pub boundary: BoundaryKind,
}

fn default_n_particles() -> u64 { 1000 }
fn default_seed() -> u64 { 0x5EED }

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            n_particles: default_n_particles(),
            integrator: IntegratorKind::default(),
            seed: default_seed(),
            boundary: BoundaryKind::default(),
        }
    }
}

impl ParticleConfig {
    /// 指定积分器
    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    /// 指定边界策略
    pub fn with_boundary(mut self, boundary: BoundaryKind) -> Self {
        self.boundary = boundary;
        self
    }

    /// 指定粒子总数
    pub fn with_particles(mut self, n_particles: u64) -> Self {
        self.n_particles = n_particles;
        self
    }
}
