// crates/mt_particle/src/population.rs

//! 粒子容器
//!
//! 单元句柄到粒子的多值映射，按句柄顺序遍历。未定位的粒子存放在
//! `CellHandle::INVALID` 桶中，该桶排在所有有效单元之后。
//!
//! 不变量：每个粒子所在的桶等于它的 `cell()`。

use crate::particle::Particle;
use mt_foundation::{CellHandle, ParticleId, SpaceVector};
use std::collections::BTreeMap;

/// 按单元分桶的粒子容器
#[derive(Debug, Clone)]
pub struct ParticleMap<V> {
    buckets: BTreeMap<CellHandle, Vec<Particle<V>>>,
    len: usize,
}

impl<V> Default for ParticleMap<V> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<V: SpaceVector> ParticleMap<V> {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 粒子总数
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 按粒子当前单元插入
    pub fn insert(&mut self, particle: Particle<V>) {
        self.buckets.entry(particle.cell()).or_default().push(particle);
        self.len += 1;
    }

    /// 单元内的粒子数
    pub fn count_in(&self, cell: CellHandle) -> usize {
        self.buckets.get(&cell).map_or(0, Vec::len)
    }

    /// 非空单元及其粒子数，按句柄顺序
    pub fn cell_counts(&self) -> impl Iterator<Item = (CellHandle, usize)> + '_ {
        self.buckets.iter().map(|(&cell, bucket)| (cell, bucket.len()))
    }

    /// 遍历所有粒子
    pub fn iter(&self) -> impl Iterator<Item = &Particle<V>> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    /// 可变遍历所有粒子（不能修改所属单元）
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle<V>> {
        self.buckets.values_mut().flat_map(|bucket| bucket.iter_mut())
    }

    /// 按单元遍历
    pub fn buckets(&self) -> impl Iterator<Item = (CellHandle, &[Particle<V>])> {
        self.buckets.iter().map(|(&cell, bucket)| (cell, bucket.as_slice()))
    }

    /// 按单元可变遍历
    pub fn buckets_mut(&mut self) -> impl Iterator<Item = (CellHandle, &mut [Particle<V>])> {
        self.buckets
            .iter_mut()
            .map(|(&cell, bucket)| (cell, bucket.as_mut_slice()))
    }

    /// 按标识查找（线性）
    pub fn get(&self, id: ParticleId) -> Option<&Particle<V>> {
        self.iter().find(|p| p.id() == id)
    }

    /// 所有粒子标识，按单元顺序
    pub fn ids(&self) -> Vec<ParticleId> {
        self.iter().map(Particle::id).collect()
    }

    /// 取出一个单元的全部粒子
    pub fn take_cell(&mut self, cell: CellHandle) -> Vec<Particle<V>> {
        let taken = self.buckets.remove(&cell).unwrap_or_default();
        self.len -= taken.len();
        taken
    }

    /// 取出所有非本地粒子
    pub fn extract_nonlocal(&mut self) -> Vec<Particle<V>> {
        let mut out = Vec::new();
        for bucket in self.buckets.values_mut() {
            let mut i = 0;
            while i < bucket.len() {
                if bucket[i].is_local() {
                    i += 1;
                } else {
                    out.push(bucket.swap_remove(i));
                }
            }
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        self.len -= out.len();
        out
    }

    /// 清空
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// 对每个粒子执行 `locate`，再把单元发生变化的粒子移到新桶
    ///
    /// 移动的粒子先放入临时数组，遍历结束后再插回，因此每个粒子恰好被访问一次。
    /// 返回移动的粒子数。
    pub(crate) fn relocate(&mut self, mut locate: impl FnMut(&mut Particle<V>)) -> usize {
        let mut moved = Vec::new();
        for (&cell, bucket) in self.buckets.iter_mut() {
            let mut i = 0;
            while i < bucket.len() {
                locate(&mut bucket[i]);
                if bucket[i].cell() == cell {
                    i += 1;
                } else {
                    moved.push(bucket.swap_remove(i));
                }
            }
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());

        let n_moved = moved.len();
        self.len -= n_moved;
        for particle in moved {
            self.insert(particle);
        }
        n_moved
    }
}

impl<V: SpaceVector> FromIterator<Particle<V>> for ParticleMap<V> {
    fn from_iter<I: IntoIterator<Item = Particle<V>>>(iter: I) -> Self {
        let mut map = Self::new();
        for particle in iter {
            map.insert(particle);
        }
        map
    }
}
