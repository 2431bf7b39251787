// apps/mt_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 先做结构校验（`RunConfig::validate`），再对能运行但大概率出问题的组合
//! 给出警告。

use anyhow::{bail, Result};
use clap::Args;
use mt_config::{BoundaryKind, RunConfig, VelocityConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== MantleTrace 配置验证 ===");
    println!("\n检查配置文件: {}", args.config.display());

    let mut result = ValidationResult::default();
    match RunConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  ✓ 配置文件格式有效");
            check_config(&config, &mut result);
        }
        Err(e) => result.add_error(e.to_string()),
    }

    print_validation_result(&result, args.strict)
}

fn check_config(config: &RunConfig, result: &mut ValidationResult) {
    let dim = config.mesh.dimension as u32;
    let refinement = (1usize << dim).saturating_pow(config.mesh.global_refinements as u32);
    let initial_cells = config
        .mesh
        .subdivisions
        .saturating_pow(dim)
        .saturating_mul(refinement);
    if config.workers > initial_cells {
        result.add_warning(format!(
            "工作进程数 {} 多于初始活动单元数 {}, 部分工作进程不拥有任何单元",
            config.workers, initial_cells
        ));
    }

    if config.particles.n_particles == 0 {
        result.add_warning("n_particles = 0, 模拟中没有粒子");
    }

    if config.time.n_steps == 0 {
        result.add_warning("n_steps = 0, 不会推进任何时间步");
    }

    if config.mesh.adapt_interval > 0 && config.mesh.adapt_interval >= config.time.n_steps {
        result.add_warning(format!(
            "自适应间隔 {} 不小于时间步数 {}, 网格不会被修改",
            config.mesh.adapt_interval, config.time.n_steps
        ));
    }

    if config.particles.boundary == BoundaryKind::None {
        if let VelocityConfig::Uniform { velocity } = &config.velocity {
            if velocity.iter().any(|v| *v != 0.0) {
                result.add_error(
                    "匀速场且 boundary = none: 粒子会离开计算域, 粒子总数校验将中止运行 \
                     (设置 particles.boundary = \"clamp\")",
                );
            }
        }
    }

    if let VelocityConfig::Rotation { center, .. } = &config.velocity {
        let inside = center
            .iter()
            .zip(config.mesh.lower.iter().zip(&config.mesh.upper))
            .all(|(c, (lo, hi))| c >= lo && c <= hi);
        if !inside {
            result.add_warning(format!("旋转中心 {:?} 位于计算域之外", center));
        }
        if config.particles.boundary == BoundaryKind::None {
            result.add_warning("旋转场且 boundary = none: 角点附近的粒子可能离开计算域");
        }
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!();
    for e in &result.errors {
        error!("{}", e);
        println!("  ✗ {}", e);
    }
    for w in &result.warnings {
        warn!("{}", w);
        println!("  ! {}", w);
    }

    let ok = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };
    if !ok {
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    }
    println!("\n验证通过 ({} 个警告)", result.warnings.len());
    Ok(())
}
