// crates/mt_particle/src/world.rs

//! 粒子世界
//!
//! 持有本工作进程的粒子、积分器与边界策略，协调生成、定位、交换与时间推进。
//!
//! # 时间步流程
//!
//! ```text
//! RELOCATE → EXCHANGE (仅当网格变化) → BOUNDARY_FIXUP →
//! { SAMPLE → INTEGRATE → RELOCATE → BOUNDARY_FIXUP → EXCHANGE }* → VERIFY
//! ```
//!
//! 内层循环一直执行到积分器报告本时间步完成。
//!
//! # 错误处理
//!
//! 致命错误（粒子总数变化、单元退化、零体积单元）在返回前先调用
//! [`Communicator::abort`]，使其他工作进程的集合操作立即失败而不是死锁。

use crate::boundary::{build_boundary, BoundaryPolicy};
use crate::exchange::ExchangeStats;
use crate::generator::{sample_point_in_cell, RouletteWheel};
use crate::integrator::{build_integrator, Integrator};
use crate::locator::{CellLocator, LocateStats};
use crate::particle::Particle;
use crate::population::ParticleMap;
use crate::velocity::VelocityField;
use crate::wire::{DataFormat, RecordLayout};
use mt_comm::Communicator;
use mt_config::ParticleConfig;
use mt_foundation::{CellHandle, MtError, MtResult, ParticleId, SpaceVector};
use mt_mesh::{FnObserver, MeshEvent, MeshProvider, SharedMesh};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 粒子世界
pub struct World<V, M, C>
where
    V: SpaceVector,
    M: MeshProvider<V>,
    C: Communicator,
{
    pub(crate) mesh: SharedMesh<M>,
    pub(crate) comm: C,
    pub(crate) integrator: Box<dyn Integrator<V>>,
    boundary: Box<dyn BoundaryPolicy<V>>,
    pub(crate) particles: ParticleMap<V>,
    mesh_changed: Arc<AtomicBool>,
    pub(crate) global_particle_count: u64,
    pub(crate) layout: RecordLayout,
    rng: ChaCha8Rng,
    pub(crate) locate_stats: LocateStats,
    timestep: u64,
}

impl<V, M, C> World<V, M, C>
where
    V: SpaceVector,
    M: MeshProvider<V>,
    C: Communicator,
{
    /// 创建粒子世界
    ///
    /// 订阅网格变更通知；初始时视为网格已变化，第一个时间步会强制交换。
    pub fn new(mesh: SharedMesh<M>, comm: C, config: &ParticleConfig) -> MtResult<Self> {
        let integrator = build_integrator::<V>(config.integrator);
        let boundary = build_boundary::<V>(config.boundary);

        let mut fields = Particle::<V>::wire_fields(DataFormat::Exchange);
        fields.extend(integrator.wire_fields(DataFormat::Exchange));
        let layout = RecordLayout::from_fields(fields);
        let expected =
            Particle::<V>::data_len(DataFormat::Exchange) + integrator.data_len(DataFormat::Exchange);
        if layout.record_size() != expected {
            return Err(MtError::wire(format!(
                "记录布局 {} 字节与粒子编码长度 {} 不一致",
                layout.record_size(),
                expected
            )));
        }

        let mesh_changed = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&mesh_changed);
        mesh.read().subscribe(Arc::new(FnObserver::new("particle-world", move |_: &MeshEvent| {
            flag.store(true, Ordering::Release);
        })));

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        rng.set_stream(comm.rank() as u64);

        debug!(
            "Rank {}: particle world created ({}, boundary={}, record={} bytes)",
            comm.rank(),
            integrator.name(),
            boundary.name(),
            layout.record_size()
        );

        Ok(Self {
            mesh,
            comm,
            integrator,
            boundary,
            particles: ParticleMap::new(),
            mesh_changed,
            global_particle_count: 0,
            layout,
            rng,
            locate_stats: LocateStats::default(),
            timestep: 0,
        })
    }

    // ========================================================================
    // 访问器
    // ========================================================================

    /// 本工作进程的粒子
    pub fn particles(&self) -> &ParticleMap<V> {
        &self.particles
    }

    /// 本地粒子数
    pub fn local_particle_count(&self) -> usize {
        self.particles.len()
    }

    /// 全局目标粒子数
    pub fn global_particle_count(&self) -> u64 {
        self.global_particle_count
    }

    /// 设置全局目标粒子数（手工插入粒子时使用）
    pub fn set_global_particle_count(&mut self, count: u64) {
        self.global_particle_count = count;
    }

    /// 积分器
    pub fn integrator(&self) -> &dyn Integrator<V> {
        self.integrator.as_ref()
    }

    /// 通信器
    pub fn communicator(&self) -> &C {
        &self.comm
    }

    /// 共享网格
    pub fn mesh(&self) -> &SharedMesh<M> {
        &self.mesh
    }

    /// 交换记录布局
    pub fn record_layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// 累计定位统计
    pub fn locate_stats(&self) -> LocateStats {
        self.locate_stats
    }

    /// 已完成的时间步数
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// 网格自上次强制交换以来是否变化过
    pub fn mesh_changed(&self) -> bool {
        self.mesh_changed.load(Ordering::Acquire)
    }

    /// 定位并插入一个粒子，返回它是否属于本工作进程
    ///
    /// 不属于本工作进程的粒子也会被插入，等待下一次交换。
    pub fn insert_particle(&mut self, mut particle: Particle<V>) -> bool {
        self.find_cell(&mut particle, CellHandle::INVALID);
        let local = particle.is_local();
        self.particles.insert(particle);
        local
    }

    // ========================================================================
    // 错误处理
    // ========================================================================

    /// 致命错误先中止整个工作进程组再返回
    pub(crate) fn fail_fast<T>(&self, result: MtResult<T>) -> MtResult<T> {
        if let Err(err) = &result {
            if err.is_fatal() && !matches!(err, MtError::Aborted { .. }) {
                error!("Rank {}: fatal error, aborting: {}", self.comm.rank(), err);
                self.comm.abort(&err.to_string());
            }
        }
        result
    }

    /// 集合流程中途的任何错误都会让其他工作进程停在下一个集合操作上，
    /// 因此一律中止
    pub(crate) fn abort_on_error<T>(&self, result: MtResult<T>) -> MtResult<T> {
        if let Err(err) = &result {
            if !matches!(err, MtError::Aborted { .. }) {
                error!("Rank {}: collective step failed, aborting: {}", self.comm.rank(), err);
                self.comm.abort(&err.to_string());
            }
        }
        result
    }

    // ========================================================================
    // 生成
    // ========================================================================

    /// 在全局生成 `total` 个粒子
    ///
    /// 各工作进程按本地拥有的体积占比分配粒子数与连续的标识区间，
    /// 结束时做一次全局计数校验。已有的粒子及其积分器状态先被丢弃，
    /// 全局目标数替换为 `total`。
    pub fn generate_global_particles(&mut self, total: u64) -> MtResult<()> {
        let result = self.generate_global_inner(total);
        self.abort_on_error(result)
    }

    fn generate_global_inner(&mut self, total: u64) -> MtResult<()> {
        let local_volume = {
            let mesh = Arc::clone(&self.mesh);
            let mesh = mesh.read();
            let mut volume = 0.0;
            for cell in mesh.locally_owned_active_cells() {
                let m = mesh.measure(cell);
                if !(m > 0.0) {
                    return Err(MtError::ZeroVolumeCell {
                        level: cell.level(),
                        index: cell.index(),
                    });
                }
                volume += m;
            }
            volume
        };

        let global_volume = self.comm.all_reduce_sum_f64(local_volume)?;
        if !(global_volume > 0.0) {
            return Err(MtError::invalid_mesh("全局体积为零, 无法生成粒子"));
        }
        let end_fraction = self.comm.scan_sum_f64(local_volume / global_volume)?;

        // 最后一个拥有体积的工作进程收尾到 total，避免舍入丢失标识
        let provisional_end = ((end_fraction * total as f64).floor() as u64).min(total);
        let ends = self.comm.all_gather_u64(provisional_end)?;
        let has_volume = self.comm.all_gather_u64(u64::from(local_volume > 0.0))?;
        let last_owner = has_volume.iter().rposition(|&v| v == 1).unwrap_or(0);
        let end_of = |r: usize| if r >= last_owner { total } else { ends[r] };

        let rank = self.comm.rank();
        let start_id = if rank == 0 { 0 } else { end_of(rank - 1) };
        let end_id = end_of(rank);
        let n_local = end_id.saturating_sub(start_id);

        let discarded = self.particles.len();
        for id in self.particles.ids() {
            self.integrator.discard_state(id);
        }
        self.particles.clear();
        if discarded > 0 {
            debug!("Rank {}: discarded {} particles before generation", rank, discarded);
        }

        self.global_particle_count = total;
        self.generate_particles_in_subdomain(n_local, start_id)?;

        info!(
            "Rank {}: generated {} particles [ids {}..{}) of {}",
            rank, n_local, start_id, end_id, total
        );
        self.check_particle_count()
    }

    /// 在本地子区域生成 `n` 个粒子，标识从 `start_id` 开始连续分配
    ///
    /// `start_id + n` 超过全局目标数时返回 [`MtError::InvalidInput`]，不中止。
    pub fn generate_particles_in_subdomain(&mut self, n: u64, start_id: u64) -> MtResult<()> {
        let in_range = start_id
            .checked_add(n)
            .map_or(false, |end| end <= self.global_particle_count);
        if !in_range {
            return Err(MtError::invalid_input(format!(
                "请求生成标识 [{}, {}+{}), 超过全局目标 {}",
                start_id, start_id, n, self.global_particle_count
            )));
        }
        if n == 0 {
            return Ok(());
        }

        let result = self.generate_in_owned_cells(n, start_id);
        self.fail_fast(result)
    }

    fn generate_in_owned_cells(&mut self, n: u64, start_id: u64) -> MtResult<()> {
        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();

        let owned = mesh.locally_owned_active_cells();
        let wheel = RouletteWheel::from_weights(owned.iter().map(|&c| (c, mesh.measure(c))))?;
        if wheel.is_empty() {
            return Err(MtError::invalid_input(format!(
                "rank {} 没有本地活动单元, 无法生成 {} 个粒子",
                self.comm.rank(),
                n
            )));
        }

        for i in 0..n {
            let cell = wheel
                .spin(&mut self.rng)
                .ok_or_else(|| MtError::invalid_input("轮盘为空"))?;
            let position: V = sample_point_in_cell(&*mesh, cell, &mut self.rng)?;
            let mut particle = Particle::new(ParticleId(start_id + i), position);
            particle.set_cell(cell);
            particle.set_local(true);
            self.particles.insert(particle);
        }

        debug!(
            "Rank {}: {} particles placed in {} cells",
            self.comm.rank(),
            n,
            wheel.len()
        );
        Ok(())
    }

    // ========================================================================
    // 定位
    // ========================================================================

    /// 定位单个粒子，更新其所属单元与本地标志
    pub fn find_cell(&mut self, particle: &mut Particle<V>, hint: CellHandle) -> CellHandle {
        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();
        let locator = CellLocator::new(&*mesh, !self.mesh_changed());
        let cell = locator.find_cell(particle, hint);
        self.locate_stats.merge(&locator.stats());
        cell
    }

    /// 重新定位所有粒子，单元变化的粒子移到新桶
    pub fn find_all_cells(&mut self) {
        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();
        let locator = CellLocator::new(&*mesh, !self.mesh_changed());
        let moved = self.particles.relocate(|p| {
            let hint = p.cell();
            locator.find_cell(p, hint);
        });
        let stats = locator.stats();
        self.locate_stats.merge(&stats);
        debug!(
            "Rank {}: relocated {} particles ({} moved, fast path {}, tree {}, scan {}, lost {})",
            self.comm.rank(),
            stats.total(),
            moved,
            stats.fast_path,
            stats.tree_search,
            stats.linear_scan,
            stats.not_found
        );
    }

    /// 对计算域外的粒子应用边界策略并重新定位
    fn apply_boundary_fixup(&mut self) {
        let outside = self.particles.take_cell(CellHandle::INVALID);
        if outside.is_empty() {
            return;
        }

        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();
        let locator = CellLocator::new(&*mesh, false);
        let mut fixed = 0usize;
        for mut particle in outside {
            if let Some(position) = self.boundary.reposition(particle.position(), &*mesh) {
                particle.set_position(position);
                if locator.find_cell(&mut particle, CellHandle::INVALID).is_valid() {
                    fixed += 1;
                } else {
                    warn!(
                        "Rank {}: particle {} still outside the mesh after {} fixup",
                        self.comm.rank(),
                        particle.id(),
                        self.boundary.name()
                    );
                }
            }
            self.particles.insert(particle);
        }
        self.locate_stats.merge(&locator.stats());
        if fixed > 0 {
            debug!("Rank {}: boundary fixup moved {} particles", self.comm.rank(), fixed);
        }
    }

    // ========================================================================
    // 速度与时间推进
    // ========================================================================

    /// 按单元批量求所有粒子的速度
    pub fn get_particle_velocities(&mut self, field: &dyn VelocityField<V>) -> MtResult<()> {
        let mut positions: Vec<V> = Vec::new();
        let mut velocities: Vec<V> = Vec::new();

        for (cell, bucket) in self.particles.buckets_mut() {
            if !cell.is_valid() {
                warn!("{} particles without a cell skipped during velocity sampling", bucket.len());
                continue;
            }
            positions.clear();
            positions.extend(bucket.iter().map(Particle::position));
            velocities.clear();
            field.evaluate_in_cell(cell, &positions, &mut velocities)?;
            if velocities.len() != positions.len() {
                return Err(MtError::SizeMismatch {
                    name: "velocities",
                    expected: positions.len(),
                    actual: velocities.len(),
                });
            }
            for (p, &v) in bucket.iter_mut().zip(&velocities) {
                p.set_velocity(v);
            }
        }
        Ok(())
    }

    /// 推进一个完整时间步
    ///
    /// 负的 `dt` 表示反向积分。非有限的 `dt` 返回 [`MtError::InvalidInput`]，不中止。
    pub fn advance_timestep(&mut self, dt: f64, field: &dyn VelocityField<V>) -> MtResult<()> {
        if !dt.is_finite() {
            return Err(MtError::invalid_input(format!("时间步长非法: {}", dt)));
        }
        let result = self.advance_inner(dt, field);
        self.abort_on_error(result)
    }

    fn advance_inner(&mut self, dt: f64, field: &dyn VelocityField<V>) -> MtResult<()> {
        self.find_all_cells();
        if self.mesh_changed() {
            self.send_recv_particles()?;
            self.mesh_changed.store(false, Ordering::Release);
        }
        self.apply_boundary_fixup();

        let mut exchanged = ExchangeStats::default();
        loop {
            self.get_particle_velocities(field)?;
            let more = self.integrator.integrate_step(&mut self.particles, dt);
            self.find_all_cells();
            self.apply_boundary_fixup();
            exchanged.merge(&self.send_recv_particles()?);
            if !more {
                break;
            }
        }

        self.check_particle_count()?;
        self.timestep += 1;
        debug!(
            "Rank {}: timestep {} done, {} local particles, exchanged {} out / {} claimed",
            self.comm.rank(),
            self.timestep,
            self.particles.len(),
            exchanged.sent,
            exchanged.claimed
        );
        Ok(())
    }

    // ========================================================================
    // 校验
    // ========================================================================

    /// 全局粒子数校验，与目标不一致时中止整个运行
    pub fn check_particle_count(&self) -> MtResult<()> {
        let result = self.count_inner();
        self.fail_fast(result)
    }

    fn count_inner(&self) -> MtResult<()> {
        let global = self.comm.all_reduce_sum_u64(self.particles.len() as u64)?;
        if global != self.global_particle_count {
            return Err(MtError::ParticleCountMismatch {
                expected: self.global_particle_count,
                actual: global,
            });
        }
        Ok(())
    }
}

impl<V, M, C> std::fmt::Debug for World<V, M, C>
where
    V: SpaceVector,
    M: MeshProvider<V>,
    C: Communicator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("rank", &self.comm.rank())
            .field("integrator", &self.integrator.name())
            .field("local_particles", &self.particles.len())
            .field("global_particles", &self.global_particle_count)
            .field("timestep", &self.timestep)
            .finish()
    }
}
