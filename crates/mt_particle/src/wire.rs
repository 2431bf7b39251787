// crates/mt_particle/src/wire.rs

//! 粒子记录的二进制描述
//!
//! 粒子与积分器辅助状态都以字段描述符列表声明自己的二进制布局。
//! 一条记录的布局由有序字段列表唯一确定：每个字段的偏移是前面所有字段
//! `count × element_size` 的累加和。
//!
//! 数值以本机字节序写入（`bytemuck`），交换与存储在同一种机器上进行。

use bytemuck::Pod;
use mt_foundation::{MtError, MtResult, SpaceVector};
use serde::{Deserialize, Serialize};

/// 数据格式
///
/// 交换与存储目前布局相同，但各自独立声明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    /// 工作进程之间的粒子交换
    Exchange,
    /// 粒子文件
    Storage,
}

/// 基本元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementType {
    /// 64位浮点
    F64 = 2,
    /// 64位无符号整数
    U64 = 4,
}

impl ElementType {
    /// 返回单个元素的字节数
    pub fn element_size(&self) -> usize {
        match self {
            ElementType::F64 => 8,
            ElementType::U64 => 8,
        }
    }
}

/// 字段描述符
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// 字段名称
    pub name: String,
    /// 元素数量
    pub count: usize,
    /// 元素类型
    pub dtype: ElementType,
    /// 单个元素字节数
    pub element_size: usize,
}

impl FieldDescriptor {
    /// 创建新的字段描述符
    pub fn new(name: impl Into<String>, count: usize, dtype: ElementType) -> Self {
        Self {
            name: name.into(),
            count,
            dtype,
            element_size: dtype.element_size(),
        }
    }

    /// 字段字节数
    pub fn byte_len(&self) -> usize {
        self.count * self.element_size
    }
}

/// 所有字段的总字节数
pub fn fields_len(fields: &[FieldDescriptor]) -> usize {
    fields.iter().map(FieldDescriptor::byte_len).sum()
}

/// 定长记录布局
///
/// 在粒子世界创建时由粒子字段与积分器字段构建一次，之后每条写出的记录都
/// 用它校验长度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordLayout {
    fields: Vec<FieldDescriptor>,
    offsets: Vec<usize>,
    record_size: usize,
}

impl RecordLayout {
    /// 由有序字段列表构建
    pub fn from_fields(fields: Vec<FieldDescriptor>) -> Self {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut running = 0;
        for field in &fields {
            offsets.push(running);
            running += field.byte_len();
        }
        Self {
            fields,
            offsets,
            record_size: running,
        }
    }

    /// 字段列表
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// 各字段在记录内的偏移
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// 记录字节数
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// 按名称查找字段偏移
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| self.offsets[i])
    }

    /// 校验一条记录的写出长度
    pub fn check_record(&self, start: usize, end: usize) -> MtResult<()> {
        let written = end.saturating_sub(start);
        if written != self.record_size {
            return Err(MtError::wire(format!(
                "记录长度 {} 与布局长度 {} 不一致",
                written, self.record_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// 缓冲区读写
// ============================================================================

fn slot(len: usize, offset: usize, n: usize) -> MtResult<std::ops::Range<usize>> {
    let end = offset
        .checked_add(n)
        .filter(|&end| end <= len)
        .ok_or_else(|| {
            MtError::wire(format!(
                "缓冲区越界: 偏移 {} + {} 字节超过长度 {}",
                offset, n, len
            ))
        })?;
    Ok(offset..end)
}

fn write_pod<T: Pod>(buf: &mut [u8], offset: usize, value: T) -> MtResult<usize> {
    let bytes = bytemuck::bytes_of(&value);
    let range = slot(buf.len(), offset, bytes.len())?;
    let end = range.end;
    buf[range].copy_from_slice(bytes);
    Ok(end)
}

fn read_pod<T: Pod>(buf: &[u8], offset: usize) -> MtResult<(T, usize)> {
    let range = slot(buf.len(), offset, std::mem::size_of::<T>())?;
    let end = range.end;
    Ok((bytemuck::pod_read_unaligned(&buf[range]), end))
}

/// 写入 `u64`，返回新偏移
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) -> MtResult<usize> {
    write_pod(buf, offset, value)
}

/// 读取 `u64`，返回值与新偏移
pub fn read_u64(buf: &[u8], offset: usize) -> MtResult<(u64, usize)> {
    read_pod(buf, offset)
}

/// 写入向量的 `DIM` 个 `f64` 分量，返回新偏移
pub fn write_vector<V: SpaceVector>(buf: &mut [u8], offset: usize, value: &V) -> MtResult<usize> {
    let mut off = offset;
    for d in 0..V::DIM {
        off = write_pod(buf, off, value[d])?;
    }
    Ok(off)
}

/// 读取向量，返回值与新偏移
pub fn read_vector<V: SpaceVector>(buf: &[u8], offset: usize) -> MtResult<(V, usize)> {
    let mut off = offset;
    let mut value = V::default();
    for d in 0..V::DIM {
        let (x, next) = read_pod::<f64>(buf, off)?;
        value[d] = x;
        off = next;
    }
    Ok((value, off))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_offsets_are_running_sum() {
        let layout = RecordLayout::from_fields(vec![
            FieldDescriptor::new("id", 1, ElementType::U64),
            FieldDescriptor::new("position", 3, ElementType::F64),
            FieldDescriptor::new("velocity", 3, ElementType::F64),
        ]);
        assert_eq!(layout.offsets(), &[0, 8, 32]);
        assert_eq!(layout.record_size(), 56);
        assert_eq!(layout.offset_of("velocity"), Some(32));
        assert_eq!(layout.offset_of("missing"), None);
    }

    #[test]
    fn test_check_record() {
        let layout = RecordLayout::from_fields(vec![FieldDescriptor::new("x", 2, ElementType::F64)]);
        assert!(layout.check_record(16, 32).is_ok());
        assert!(layout.check_record(16, 24).is_err());
    }

    #[test]
    fn test_vector_at_unaligned_offset() {
        let mut buf = vec![0u8; 1 + 24];
        let v = DVec3::new(1.5, -2.0, 1e-300);
        let end = write_vector(&mut buf, 1, &v).unwrap();
        assert_eq!(end, 25);
        let (back, end2) = read_vector::<DVec3>(&buf, 1).unwrap();
        assert_eq!(back, v);
        assert_eq!(end2, 25);
    }

    #[test]
    fn test_overrun_is_error() {
        let mut buf = vec![0u8; 7];
        assert!(write_u64(&mut buf, 0, 1).is_err());
        assert!(read_u64(&buf, 0).is_err());
        assert!(read_u64(&buf, usize::MAX).is_err());
    }
}
