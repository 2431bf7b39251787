// apps/mt_cli/src/commands/run.rs

//! 运行模拟命令
//!
//! 每个工作进程是进程内线程组中的一个线程，持有整张网格的副本（归属按
//! 连续分区划分）与一个粒子世界。驱动程序在时间步之间修改网格：按
//! `mesh.adapt_interval` 交替细化一条移动的带状区域与粗化回初始层级，
//! 每次修改后重新分区。

use super::to_vector;
use anyhow::{bail, Context, Result};
use clap::Args;
use glam::{DVec2, DVec3};
use mt_comm::{Communicator, LocalCommunicator, LocalGroup};
use mt_config::{IntegratorKind, RunConfig, VelocityConfig};
use mt_foundation::{MtError, MtResult, SpaceVector};
use mt_mesh::{BoxTreeMesh, SharedMesh};
use mt_particle::{LocateStats, RigidRotation, UniformVelocity, VelocityField, World};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（缺省使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 工作进程数
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// 时间步数
    #[arg(short, long)]
    pub steps: Option<usize>,

    /// 全局粒子数
    #[arg(short = 'n', long)]
    pub particles: Option<u64>,

    /// 积分器 (euler, rk2, rk4)
    #[arg(short, long)]
    pub integrator: Option<IntegratorKind>,

    /// 结束时写出粒子文件的目录
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// 从粒子文件恢复而不是生成粒子
    #[arg(long, num_args = 1..)]
    pub restart: Vec<PathBuf>,
}

/// 单个工作进程的运行结果
#[derive(Debug)]
struct WorkerSummary {
    rank: usize,
    local_particles: usize,
    global_particles: u64,
    locate: LocateStats,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== MantleTrace 模拟启动 ===");

    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(steps) = args.steps {
        config.time.n_steps = steps;
    }
    if let Some(n) = args.particles {
        config.particles.n_particles = n;
    }
    if let Some(kind) = args.integrator {
        config.particles.integrator = kind;
    }
    if args.checkpoint.is_some() {
        config.output.checkpoint = args.checkpoint.clone();
    }
    config.validate().context("配置无效")?;

    info!(
        "工作进程: {}, 粒子: {}, 积分器: {}, 维度: {}",
        config.workers,
        config.particles.n_particles,
        config.particles.integrator,
        config.mesh.dimension
    );
    info!(
        "时间步: {} × dt={}, 自适应间隔: {}",
        config.time.n_steps, config.time.dt, config.mesh.adapt_interval
    );

    let started = Instant::now();
    let summaries = match config.mesh.dimension {
        2 => run_dimension::<DVec2>(&config, &args.restart)?,
        3 => run_dimension::<DVec3>(&config, &args.restart)?,
        d => bail!("不支持的维度: {}", d),
    };
    let elapsed = started.elapsed();

    let mut locate = LocateStats::default();
    for summary in &summaries {
        locate.merge(&summary.locate);
    }
    let total: usize = summaries.iter().map(|s| s.local_particles).sum();

    println!("\n=== 运行完成 ===");
    println!("耗时: {:.3} s", elapsed.as_secs_f64());
    println!("{:>6} {:>12}", "rank", "particles");
    for summary in &summaries {
        println!("{:>6} {:>12}", summary.rank, summary.local_particles);
    }
    println!("{:>6} {:>12}", "total", total);
    println!(
        "定位: {} 次, 快速路径 {:.1}%, 树搜索 {}, 线性扫描 {}, 未找到 {}",
        locate.total(),
        locate.fast_path_rate() * 100.0,
        locate.tree_search,
        locate.linear_scan,
        locate.not_found
    );

    if let Some(expected) = summaries.first().map(|s| s.global_particles) {
        if total as u64 != expected {
            bail!("粒子总数 {} 与目标 {} 不一致", total, expected);
        }
    }
    Ok(())
}

fn build_field<V: SpaceVector>(config: &VelocityConfig) -> Box<dyn VelocityField<V> + Sync> {
    match config {
        VelocityConfig::Uniform { velocity } => {
            Box::new(UniformVelocity::new(to_vector::<V>(velocity)))
        }
        VelocityConfig::Rotation {
            center,
            angular_velocity,
        } => Box::new(RigidRotation::new(to_vector::<V>(center), *angular_velocity)),
    }
}

fn run_dimension<V: SpaceVector>(
    config: &RunConfig,
    restart: &[PathBuf],
) -> Result<Vec<WorkerSummary>> {
    let field = build_field::<V>(&config.velocity);
    let field = field.as_ref();

    let results = LocalGroup::run(config.workers, |comm| {
        run_worker::<V>(config, field, restart, comm)
    });

    let mut summaries = Vec::with_capacity(results.len());
    for (rank, result) in results.into_iter().enumerate() {
        summaries.push(result.with_context(|| format!("工作进程 {} 失败", rank))?);
    }
    Ok(summaries)
}

fn run_worker<V: SpaceVector>(
    config: &RunConfig,
    field: &(dyn VelocityField<V> + Sync),
    restart: &[PathBuf],
    comm: LocalCommunicator,
) -> MtResult<WorkerSummary> {
    let rank = comm.rank();
    let n_ranks = comm.size();

    let mut mesh = BoxTreeMesh::new(
        to_vector::<V>(&config.mesh.lower),
        to_vector::<V>(&config.mesh.upper),
        config.mesh.subdivisions,
        rank,
    )?;
    mesh.refine_global(config.mesh.global_refinements)?;
    mesh.partition(n_ranks)?;
    let mesh: SharedMesh<BoxTreeMesh<V>> = Arc::new(RwLock::new(mesh));

    let mut world = World::new(Arc::clone(&mesh), comm, &config.particles)?;
    if restart.is_empty() {
        world.generate_global_particles(config.particles.n_particles)?;
    } else {
        world.read_particles_from_files(restart)?;
    }

    let n_steps = config.time.n_steps;
    let report_every = (n_steps / 10).max(1);
    for step in 1..=n_steps {
        world.advance_timestep(config.time.dt, field)?;

        let interval = config.mesh.adapt_interval;
        if interval > 0 && step % interval == 0 && step < n_steps {
            adapt_mesh(&mesh, config, step / interval, n_ranks)?;
        }
        if rank == 0 && step % report_every == 0 {
            info!(
                "步 {}/{}: rank 0 本地粒子 {}",
                step,
                n_steps,
                world.local_particle_count()
            );
        }
    }

    if let Some(dir) = &config.output.checkpoint {
        std::fs::create_dir_all(dir)
            .map_err(|e| MtError::io(format!("无法创建目录 {}", dir.display()), e))?;
        world.write_particles_to_file(dir.join(format!("particles.{}.mtp", rank)))?;
    }

    Ok(WorkerSummary {
        rank,
        local_particles: world.local_particle_count(),
        global_particles: world.global_particle_count(),
        locate: world.locate_stats(),
    })
}

/// 奇数周期细化一条沿维度 0 移动的带状区域，偶数周期粗化回初始层级
fn adapt_mesh<V: SpaceVector>(
    mesh: &SharedMesh<BoxTreeMesh<V>>,
    config: &RunConfig,
    cycle: usize,
    n_ranks: usize,
) -> MtResult<()> {
    let mut mesh = mesh.write();
    if cycle % 2 == 1 {
        let lower = config.mesh.lower[0];
        let width = config.mesh.upper[0] - lower;
        let x = lower + width * ((cycle / 2) as f64 * 0.25 + 0.125).fract();
        let refined = mesh.refine_where(|lo, hi| lo[0] <= x && x <= hi[0])?;
        debug!("自适应周期 {}: 细化 {} 个单元 (x = {:.3})", cycle, refined, x);
    } else {
        let coarsened = mesh.coarsen_to_level(config.mesh.global_refinements as u32)?;
        debug!("自适应周期 {}: 粗化 {} 个父单元", cycle, coarsened);
    }
    mesh.partition(n_ranks)?;
    Ok(())
}
