// crates/mt_particle/src/particle.rs

//! 示踪粒子

use crate::wire::{self, fields_len, DataFormat, ElementType, FieldDescriptor};
use mt_foundation::{CellHandle, MtResult, ParticleId, SpaceVector};

/// 示踪粒子
///
/// 标识在生成后不可变。所属单元句柄只在粒子为本地粒子且网格未变化时有效。
#[derive(Debug, Clone, PartialEq)]
pub struct Particle<V> {
    id: ParticleId,
    position: V,
    velocity: V,
    local: bool,
    cell: CellHandle,
}

impl<V: SpaceVector> Particle<V> {
    /// 在给定位置创建静止粒子，尚未定位
    pub fn new(id: ParticleId, position: V) -> Self {
        Self {
            id,
            position,
            velocity: V::default(),
            local: true,
            cell: CellHandle::INVALID,
        }
    }

    /// 设置初速度
    pub fn with_velocity(mut self, velocity: V) -> Self {
        self.velocity = velocity;
        self
    }

    /// 标识
    #[inline]
    pub fn id(&self) -> ParticleId {
        self.id
    }

    /// 位置
    #[inline]
    pub fn position(&self) -> V {
        self.position
    }

    /// 速度
    #[inline]
    pub fn velocity(&self) -> V {
        self.velocity
    }

    /// 是否属于本工作进程
    #[inline]
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// 最近一次定位得到的单元
    #[inline]
    pub fn cell(&self) -> CellHandle {
        self.cell
    }

    /// 设置位置
    #[inline]
    pub fn set_position(&mut self, position: V) {
        self.position = position;
    }

    /// 设置速度
    #[inline]
    pub fn set_velocity(&mut self, velocity: V) {
        self.velocity = velocity;
    }

    /// 设置本地标志
    #[inline]
    pub fn set_local(&mut self, local: bool) {
        self.local = local;
    }

    #[inline]
    pub(crate) fn set_cell(&mut self, cell: CellHandle) {
        self.cell = cell;
    }

    // ========================================================================
    // 二进制编码
    // ========================================================================

    /// 指定格式下的字段描述
    pub fn wire_fields(format: DataFormat) -> Vec<FieldDescriptor> {
        match format {
            DataFormat::Exchange | DataFormat::Storage => vec![
                FieldDescriptor::new("id", 1, ElementType::U64),
                FieldDescriptor::new("position", V::DIM, ElementType::F64),
                FieldDescriptor::new("velocity", V::DIM, ElementType::F64),
            ],
        }
    }

    /// 指定格式下的字节数
    pub fn data_len(format: DataFormat) -> usize {
        fields_len(&Self::wire_fields(format))
    }

    /// 在 `offset` 处写入标识、位置、速度，返回新偏移
    pub fn write_data(&self, format: DataFormat, buf: &mut [u8], offset: usize) -> MtResult<usize> {
        match format {
            DataFormat::Exchange | DataFormat::Storage => {
                let off = wire::write_u64(buf, offset, self.id.get())?;
                let off = wire::write_vector(buf, off, &self.position)?;
                wire::write_vector(buf, off, &self.velocity)
            }
        }
    }

    /// 从 `offset` 处读取粒子，返回粒子与新偏移
    ///
    /// 读出的粒子尚未定位：单元为 `INVALID`，本地标志为 false。
    pub fn read_data(format: DataFormat, buf: &[u8], offset: usize) -> MtResult<(Self, usize)> {
        match format {
            DataFormat::Exchange | DataFormat::Storage => {
                let (id, off) = wire::read_u64(buf, offset)?;
                let (position, off) = wire::read_vector(buf, off)?;
                let (velocity, off) = wire::read_vector(buf, off)?;
                let particle = Self {
                    id: ParticleId(id),
                    position,
                    velocity,
                    local: false,
                    cell: CellHandle::INVALID,
                };
                Ok((particle, off))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec2, DVec3};

    #[test]
    fn test_data_len_matches_fields() {
        assert_eq!(Particle::<DVec2>::data_len(DataFormat::Exchange), 8 + 16 + 16);
        assert_eq!(Particle::<DVec3>::data_len(DataFormat::Storage), 8 + 24 + 24);
    }

    #[test]
    fn test_write_returns_advanced_offset() {
        let p = Particle::new(ParticleId(9), DVec2::new(0.25, 0.75))
            .with_velocity(DVec2::new(-1.0, 2.0));
        let len = Particle::<DVec2>::data_len(DataFormat::Exchange);
        let mut buf = vec![0u8; 4 + len];
        let end = p.write_data(DataFormat::Exchange, &mut buf, 4).unwrap();
        assert_eq!(end, 4 + len);

        let (back, end2) = Particle::<DVec2>::read_data(DataFormat::Exchange, &buf, 4).unwrap();
        assert_eq!(end2, end);
        assert_eq!(back.id(), p.id());
        assert_eq!(back.position(), p.position());
        assert_eq!(back.velocity(), p.velocity());
        assert!(!back.is_local());
        assert!(!back.cell().is_valid());
    }

    #[test]
    fn test_short_buffer_is_error() {
        let p = Particle::new(ParticleId(1), DVec3::ONE);
        let mut buf = vec![0u8; 20];
        assert!(p.write_data(DataFormat::Storage, &mut buf, 0).is_err());
    }
}
