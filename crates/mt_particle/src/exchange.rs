// crates/mt_particle/src/exchange.rs

//! 跨工作进程的粒子交换
//!
//! 工作进程不知道离开本分区的粒子具体去了哪个分区，因此采用保守策略：
//!
//! 1. 取出所有非本地粒子，把整批粒子发给每个其他工作进程
//! 2. all-to-all 交换粒子数
//! 3. 按接收数的前缀和计算每个来源在接收缓冲区中的偏移
//! 4. 每条记录为 `粒子编码 + 积分器辅助状态`，长度由 [`RecordLayout`] 固定
//! 5. 变长 all-to-all 交换记录
//! 6. 以未知提示重新定位每个收到的粒子，只保留确认属于本工作进程的
//!
//! 由于所有工作进程在同一网格上得到相同的定位结果，每个粒子恰好被一个
//! 工作进程认领；计算域外的粒子不会被任何工作进程认领。
//!
//! [`RecordLayout`]: crate::wire::RecordLayout

use crate::locator::CellLocator;
use crate::particle::Particle;
use crate::wire::DataFormat;
use crate::world::World;
use mt_comm::Communicator;
use mt_foundation::{CellHandle, MtError, MtResult, SpaceVector};
use mt_mesh::MeshProvider;
use std::sync::Arc;
use tracing::debug;

/// 一次交换的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// 发出的粒子数（每个粒子只计一次）
    pub sent: u64,
    /// 收到的记录数
    pub received: u64,
    /// 认领为本地粒子的数量
    pub claimed: u64,
}

impl ExchangeStats {
    /// 累加
    pub fn merge(&mut self, other: &ExchangeStats) {
        self.sent += other.sent;
        self.received += other.received;
        self.claimed += other.claimed;
    }
}

impl<V, M, C> World<V, M, C>
where
    V: SpaceVector,
    M: MeshProvider<V>,
    C: Communicator,
{
    /// 把离开本分区的粒子交换到它们的新工作进程
    ///
    /// 集合操作：组内所有工作进程必须同时调用。
    pub fn send_recv_particles(&mut self) -> MtResult<ExchangeStats> {
        let result = self.exchange_inner();
        self.abort_on_error(result)
    }

    fn exchange_inner(&mut self) -> MtResult<ExchangeStats> {
        let rank = self.comm.rank();
        let n_ranks = self.comm.size();
        let record = self.layout.record_size();

        let leaving = self.particles.extract_nonlocal();
        let n_leaving = leaving.len() as u64;

        let send_counts: Vec<u64> = (0..n_ranks)
            .map(|r| if r == rank { 0 } else { n_leaving })
            .collect();
        let recv_counts = self.comm.all_to_all_counts(&send_counts)?;

        let send_buf = self.pack_records(&leaving)?;
        let send_bytes: Vec<usize> = send_counts
            .iter()
            .map(|&n| n as usize * record)
            .collect();
        let send_displs = vec![0usize; n_ranks];

        let (recv_buf, recv_bytes) = self
            .comm
            .all_to_all_v(&send_buf, &send_bytes, &send_displs)?;

        let mut recv_offsets = Vec::with_capacity(n_ranks);
        let mut running = 0usize;
        for (source, (&count, &bytes)) in recv_counts.iter().zip(&recv_bytes).enumerate() {
            if bytes != count as usize * record {
                return Err(MtError::wire(format!(
                    "来自 rank {} 的数据 {} 字节, 期望 {} 条 × {} 字节",
                    source, bytes, count, record
                )));
            }
            recv_offsets.push(running);
            running += bytes;
        }

        let mut stats = ExchangeStats {
            sent: n_leaving,
            ..Default::default()
        };

        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();
        let locator = CellLocator::new(&*mesh, false);
        for (&start, &count) in recv_offsets.iter().zip(&recv_counts) {
            let mut off = start;
            for _ in 0..count {
                let begin = off;
                let (mut particle, next) = Particle::<V>::read_data(DataFormat::Exchange, &recv_buf, off)?;
                off = self
                    .integrator
                    .read_data(DataFormat::Exchange, particle.id(), &recv_buf, next)?;
                self.layout.check_record(begin, off)?;
                stats.received += 1;

                locator.find_cell(&mut particle, CellHandle::INVALID);
                if particle.is_local() {
                    self.particles.insert(particle);
                    stats.claimed += 1;
                } else {
                    self.integrator.discard_state(particle.id());
                }
            }
        }
        self.locate_stats.merge(&locator.stats());

        if stats.sent > 0 || stats.received > 0 {
            debug!(
                "Rank {}: exchange sent {}, received {}, claimed {}",
                rank, stats.sent, stats.received, stats.claimed
            );
        }
        Ok(stats)
    }

    /// 编码离开的粒子，并丢弃它们在本地积分器中的辅助状态
    fn pack_records(&mut self, leaving: &[Particle<V>]) -> MtResult<Vec<u8>> {
        let record = self.layout.record_size();
        let mut buf = vec![0u8; leaving.len() * record];
        let mut off = 0;
        for particle in leaving {
            let begin = off;
            off = particle.write_data(DataFormat::Exchange, &mut buf, off)?;
            off = self
                .integrator
                .write_data(DataFormat::Exchange, particle.id(), &mut buf, off)?;
            self.layout.check_record(begin, off)?;
            self.integrator.discard_state(particle.id());
        }
        Ok(buf)
    }
}
