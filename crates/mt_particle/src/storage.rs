// crates/mt_particle/src/storage.rs

//! 粒子文件
//!
//! 每个工作进程把自己的粒子写入一个独立文件；读入时每个工作进程读取全部
//! 文件，只认领本地拥有的粒子（与交换相同的保守规则）。
//!
//! # 格式结构
//!
//! ```text
//! +----------------+
//! | Magic (4B)     |  "MTPF"
//! | Version (4B)   |  格式版本号 (LE)
//! | Header Len (4B)|  JSON 头部字节数 (LE)
//! +----------------+
//! | Header (JSON)  |  StorageHeader
//! +----------------+
//! | Record 1       |  粒子编码 + 积分器辅助状态
//! | Record 2       |
//! | ...            |
//! +----------------+
//! ```

use crate::locator::CellLocator;
use crate::particle::Particle;
use crate::wire::{DataFormat, FieldDescriptor, RecordLayout};
use crate::world::World;
use mt_comm::Communicator;
use mt_foundation::{CellHandle, MtError, MtResult, SpaceVector};
use mt_mesh::MeshProvider;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 粒子文件魔数
pub const PARTICLE_FILE_MAGIC: &[u8; 4] = b"MTPF";

/// 粒子文件当前版本
pub const PARTICLE_FILE_VERSION: u32 = 1;

/// JSON 头部长度上限
const MAX_HEADER_LEN: u32 = 1 << 20;

/// 粒子文件头部
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageHeader {
    /// 空间维数
    pub dimension: usize,
    /// 写出时使用的积分器名称
    pub integrator: String,
    /// 记录字段
    pub fields: Vec<FieldDescriptor>,
    /// 单条记录字节数
    pub record_size: usize,
    /// 记录条数
    pub record_count: u64,
    /// 写出文件的工作进程
    pub writer_rank: usize,
}

impl StorageHeader {
    /// 写入魔数、版本与 JSON 头部
    pub fn write<W: Write>(&self, writer: &mut W) -> MtResult<()> {
        let json = serde_json::to_vec(self)
            .map_err(|e| MtError::wire(format!("头部序列化失败: {}", e)))?;
        let len = u32::try_from(json.len())
            .map_err(|_| MtError::wire(format!("头部过长: {} 字节", json.len())))?;
        writer.write_all(PARTICLE_FILE_MAGIC)?;
        writer.write_all(&PARTICLE_FILE_VERSION.to_le_bytes())?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&json)?;
        Ok(())
    }

    /// 读取并校验头部，`path` 只用于错误信息
    pub fn read<R: Read>(reader: &mut R, path: &Path) -> MtResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != PARTICLE_FILE_MAGIC {
            return Err(MtError::file_format(path, "不是粒子文件 (魔数不符)"));
        }

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let version = u32::from_le_bytes(buf4);
        if version != PARTICLE_FILE_VERSION {
            return Err(MtError::file_format(
                path,
                format!("不支持的版本 {}, 当前版本 {}", version, PARTICLE_FILE_VERSION),
            ));
        }

        reader.read_exact(&mut buf4)?;
        let len = u32::from_le_bytes(buf4);
        if len > MAX_HEADER_LEN {
            return Err(MtError::file_format(path, format!("头部长度异常: {} 字节", len)));
        }
        let mut json = vec![0u8; len as usize];
        reader.read_exact(&mut json)?;
        serde_json::from_slice(&json)
            .map_err(|e| MtError::file_format(path, format!("头部解析失败: {}", e)))
    }

    /// 校验头部与当前运行是否兼容
    pub fn check_compatible(
        &self,
        path: &Path,
        dimension: usize,
        integrator: &str,
        layout: &RecordLayout,
    ) -> MtResult<()> {
        if self.dimension != dimension {
            return Err(MtError::file_format(
                path,
                format!("维数 {} 与当前运行的 {} 不一致", self.dimension, dimension),
            ));
        }
        if self.integrator != integrator {
            return Err(MtError::file_format(
                path,
                format!("积分器 {} 与当前运行的 {} 不一致", self.integrator, integrator),
            ));
        }
        if self.record_size != layout.record_size() || self.fields != layout.fields() {
            return Err(MtError::file_format(
                path,
                format!(
                    "记录布局不一致: 文件 {} 字节, 当前 {} 字节",
                    self.record_size,
                    layout.record_size()
                ),
            ));
        }
        Ok(())
    }
}

impl<V, M, C> World<V, M, C>
where
    V: SpaceVector,
    M: MeshProvider<V>,
    C: Communicator,
{
    /// 粒子文件的记录布局
    pub fn storage_layout(&self) -> RecordLayout {
        let mut fields = Particle::<V>::wire_fields(DataFormat::Storage);
        fields.extend(self.integrator.wire_fields(DataFormat::Storage));
        RecordLayout::from_fields(fields)
    }

    /// 把本工作进程的粒子写入 `path`，返回写出的粒子数
    ///
    /// 只在时间步之间调用；此时积分器没有中间状态，辅助字段写零。
    pub fn write_particles_to_file(&self, path: impl AsRef<Path>) -> MtResult<u64> {
        let path = path.as_ref();
        let layout = self.storage_layout();
        let header = StorageHeader {
            dimension: V::DIM,
            integrator: self.integrator.name().to_string(),
            fields: layout.fields().to_vec(),
            record_size: layout.record_size(),
            record_count: self.particles.len() as u64,
            writer_rank: self.comm.rank(),
        };

        let file = File::create(path)
            .map_err(|e| MtError::io(format!("无法创建粒子文件 {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        header.write(&mut writer)?;

        let mut record = vec![0u8; layout.record_size()];
        for particle in self.particles.iter() {
            record.fill(0);
            let off = particle.write_data(DataFormat::Storage, &mut record, 0)?;
            let end = self
                .integrator
                .write_data(DataFormat::Storage, particle.id(), &mut record, off)?;
            layout.check_record(0, end)?;
            writer.write_all(&record)?;
        }
        writer.flush()?;

        info!(
            "Rank {}: wrote {} particles to {}",
            self.comm.rank(),
            header.record_count,
            path.display()
        );
        Ok(header.record_count)
    }

    /// 从一组粒子文件恢复粒子
    ///
    /// 集合操作：每个工作进程读取全部文件，只保留本地拥有的粒子，原有粒子
    /// 被清空。全局目标数设为各文件记录数之和，并做一次全局计数校验。
    pub fn read_particles_from_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> MtResult<()> {
        let result = self.read_files_inner(paths);
        self.abort_on_error(result)
    }

    /// 从单个粒子文件恢复粒子
    pub fn read_particles_from_file(&mut self, path: impl AsRef<Path>) -> MtResult<()> {
        self.read_particles_from_files(&[path])
    }

    fn read_files_inner<P: AsRef<Path>>(&mut self, paths: &[P]) -> MtResult<()> {
        let layout = self.storage_layout();
        let integrator_name = self.integrator.name();

        for id in self.particles.ids() {
            self.integrator.discard_state(id);
        }
        self.particles.clear();

        let mesh = Arc::clone(&self.mesh);
        let mesh = mesh.read();
        let locator = CellLocator::new(&*mesh, false);

        let mut total = 0u64;
        let mut claimed = 0u64;
        let mut record = vec![0u8; layout.record_size()];
        for path in paths {
            let path = path.as_ref();
            let file = File::open(path)
                .map_err(|e| MtError::io(format!("无法打开粒子文件 {}", path.display()), e))?;
            let mut reader = BufReader::new(file);
            let header = StorageHeader::read(&mut reader, path)?;
            header.check_compatible(path, V::DIM, integrator_name, &layout)?;

            for i in 0..header.record_count {
                reader.read_exact(&mut record).map_err(|e| {
                    MtError::file_format(
                        path,
                        format!("第 {} 条记录不完整 (共 {} 条): {}", i, header.record_count, e),
                    )
                })?;
                let (mut particle, off) = Particle::<V>::read_data(DataFormat::Storage, &record, 0)?;
                let end = self
                    .integrator
                    .read_data(DataFormat::Storage, particle.id(), &record, off)?;
                layout.check_record(0, end)?;

                locator.find_cell(&mut particle, CellHandle::INVALID);
                if particle.is_local() {
                    self.particles.insert(particle);
                    claimed += 1;
                } else {
                    self.integrator.discard_state(particle.id());
                }
            }
            total += header.record_count;
        }
        self.locate_stats.merge(&locator.stats());

        self.global_particle_count = total;
        info!(
            "Rank {}: claimed {} of {} particles from {} files",
            self.comm.rank(),
            claimed,
            total,
            paths.len()
        );
        self.check_particle_count()
    }
}
