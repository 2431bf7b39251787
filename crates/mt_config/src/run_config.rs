// crates/mt_config/src/run_config.rs

//! RunConfig - 运行配置
//!
//! 命令行驱动程序使用的完整配置：工作进程数、粒子、网格、时间步、
//! 解析速度场与输出。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::particle_config::{BoundaryKind, ParticleConfig};

/// 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 工作进程数
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// 粒子配置
    #[serde(default = "default_particles")]
    pub particles: ParticleConfig,

    /// 网格配置
    #[serde(default)]
    pub mesh: MeshConfig,

    /// 时间步配置
    #[serde(default)]
    pub time: TimeConfig,

    /// 速度场
    #[serde(default)]
    pub velocity: VelocityConfig,

    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_workers() -> usize { 2 }

/// 驱动程序默认把越界粒子投影回计算域
fn default_particles() -> ParticleConfig {
    ParticleConfig::default().with_boundary(BoundaryKind::Clamp)
}

/// 网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// 空间维度（2 或 3）
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// 计算域下界
    #[serde(default = "default_lower")]
    pub lower: Vec<f64>,

    /// 计算域上界
    #[serde(default = "default_upper")]
    pub upper: Vec<f64>,

    /// 每个维度上的根单元数
    #[serde(default = "default_subdivisions")]
    pub subdivisions: usize,

    /// 初始全局细化次数
    #[serde(default = "default_global_refinements")]
    pub global_refinements: usize,

    /// 自适应细化间隔（步数，0 表示不做自适应）
    #[serde(default)]
    pub adapt_interval: usize,
}

fn default_dimension() -> usize { 2 }
fn default_lower() -> Vec<f64> { vec![0.0, 0.0] }
fn default_upper() -> Vec<f64> { vec![1.0, 1.0] }
fn default_subdivisions() -> usize { 4 }
fn default_global_refinements() -> usize { 1 }

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            lower: default_lower(),
            upper: default_upper(),
            subdivisions: default_subdivisions(),
            global_refinements: default_global_refinements(),
            adapt_interval: 0,
        }
    }
}

/// 时间步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// 时间步长
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// 时间步数
    #[serde(default = "default_n_steps")]
    pub n_steps: usize,
}

fn default_dt() -> f64 { 0.01 }
fn default_n_steps() -> usize { 100 }

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            n_steps: default_n_steps(),
        }
    }
}

/// 解析速度场
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VelocityConfig {
    /// 匀速场
    Uniform {
        /// 速度向量
        velocity: Vec<f64>,
    },
    /// 绕 z 轴的刚体旋转
    Rotation {
        /// 旋转中心
        center: Vec<f64>,
        /// 角速度 [rad/时间单位]
        angular_velocity: f64,
    },
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self::Rotation {
            center: vec![0.5, 0.5],
            angular_velocity: 1.0,
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 结束时写出粒子文件的目录（每个工作进程一个文件）
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            particles: default_particles(),
            mesh: MeshConfig::default(),
            time: TimeConfig::default(),
            velocity: VelocityConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        let config: RunConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", self.workers, "至少需要 1 个工作进程"));
        }

        let dim = self.mesh.dimension;
        if dim != 2 && dim != 3 {
            return Err(ConfigError::invalid("mesh.dimension", dim, "仅支持 2 或 3"));
        }
        check_len("mesh.lower", &self.mesh.lower, dim)?;
        check_len("mesh.upper", &self.mesh.upper, dim)?;
        for (d, (lo, hi)) in self.mesh.lower.iter().zip(&self.mesh.upper).enumerate() {
            if !(hi > lo) || !lo.is_finite() || !hi.is_finite() {
                return Err(ConfigError::invalid(
                    "mesh.upper",
                    format!("{:?}", self.mesh.upper),
                    &format!("维度 {} 上界必须大于下界", d),
                ));
            }
        }
        if self.mesh.subdivisions == 0 {
            return Err(ConfigError::invalid("mesh.subdivisions", 0, "必须为正"));
        }

        if !(self.time.dt > 0.0) || !self.time.dt.is_finite() {
            return Err(ConfigError::invalid("time.dt", self.time.dt, "时间步长必须为有限正数"));
        }

        match &self.velocity {
            VelocityConfig::Uniform { velocity } => {
                check_len("velocity.velocity", velocity, dim)?;
                if velocity.iter().any(|v| !v.is_finite()) {
                    return Err(ConfigError::invalid(
                        "velocity.velocity",
                        format!("{:?}", velocity),
                        "速度分量必须为有限值",
                    ));
                }
            }
            VelocityConfig::Rotation {
                center,
                angular_velocity,
            } => {
                check_len("velocity.center", center, dim)?;
                if !angular_velocity.is_finite() {
                    return Err(ConfigError::invalid(
                        "velocity.angular_velocity",
                        angular_velocity,
                        "必须为有限值",
                    ));
                }
            }
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }
}

fn check_len(key: &str, values: &[f64], dim: usize) -> Result<(), ConfigError> {
    if values.len() != dim {
        return Err(ConfigError::invalid(
            key,
            format!("{:?}", values),
            &format!("需要 {} 个分量", dim),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mesh.dimension, 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut config = RunConfig::default();
        config.mesh.dimension = 3;
        assert!(config.validate().is_err());

        config.mesh.lower = vec![0.0; 3];
        config.mesh.upper = vec![1.0; 3];
        config.velocity = VelocityConfig::Uniform {
            velocity: vec![1.0, 0.0, 0.0],
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_dt() {
        let mut config = RunConfig::default();
        config.time.dt = 0.0;
        assert!(config.validate().is_err());
        config.time.dt = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_velocity_tagged() {
        let json = r#"{"velocity": {"kind": "uniform", "velocity": [0.1, 0.0]}}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.velocity,
            VelocityConfig::Uniform {
                velocity: vec![0.1, 0.0]
            }
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = RunConfig::default();
        config.workers = 3;
        config.save_to_file(&path).unwrap();

        let loaded = RunConfig::from_file(&path).unwrap();
        assert_eq!(loaded.workers, 3);
        assert_eq!(loaded.particles, config.particles);
    }
}
