// crates/mt_particle/src/integrator/mod.rs

//! 粒子时间积分器
//!
//! 积分器把一个时间步拆成若干子步。每个子步之前，粒子世界为所有粒子采样
//! 速度；子步之后粒子可能已越过分区边界并被交换到其他工作进程，因此中间
//! 状态按粒子标识保存，并随粒子一起编码传输。
//!
//! | 积分器 | 子步数 | 辅助状态 |
//! |--------|--------|----------|
//! | Euler  | 1      | 无 |
//! | RK2    | 2      | loc0 |
//! | RK4    | 4      | loc0, k1, k2, k3 |
//!
//! 辅助状态在第 0 子步建立，在完成一个周期的子步上清空。处于第 0 子步时读到
//! 的辅助数据会被忽略，保证时间步之间没有残留状态。
//!
//! 该 trait 是密封的，只能通过 [`build_integrator`] 获得实现。

mod euler;
mod runge_kutta;

pub use euler::Euler;
pub use runge_kutta::{Rk2, Rk4};

use crate::population::ParticleMap;
use crate::wire::{fields_len, DataFormat, FieldDescriptor};
use mt_config::IntegratorKind;
use mt_foundation::{MtResult, ParticleId, SpaceVector};

mod private {
    pub trait Sealed {}
}

/// 粒子积分器 trait（密封）
pub trait Integrator<V: SpaceVector>: private::Sealed + Send {
    /// 积分器类型
    fn kind(&self) -> IntegratorKind;

    /// 积分器名称
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// 每个时间步的子步数
    fn sub_steps(&self) -> usize {
        self.kind().sub_steps()
    }

    /// 下一次调用 `integrate_step` 将执行的子步
    fn current_step(&self) -> usize;

    /// 执行一个子步
    ///
    /// 返回 true 表示本时间步还需要更多子步（调用方需重新采样速度后再次调用）。
    ///
    /// # Panics
    ///
    /// 内部子步计数越界时 panic。
    fn integrate_step(&mut self, particles: &mut ParticleMap<V>, dt: f64) -> bool;

    /// 辅助状态的字段描述
    fn wire_fields(&self, format: DataFormat) -> Vec<FieldDescriptor>;

    /// 每个粒子辅助状态的字节数
    fn data_len(&self, format: DataFormat) -> usize {
        fields_len(&self.wire_fields(format))
    }

    /// 写出粒子 `id` 的辅助状态，没有状态时写零；返回新偏移
    fn write_data(
        &self,
        format: DataFormat,
        id: ParticleId,
        buf: &mut [u8],
        offset: usize,
    ) -> MtResult<usize>;

    /// 读入粒子 `id` 的辅助状态；返回新偏移
    fn read_data(
        &mut self,
        format: DataFormat,
        id: ParticleId,
        buf: &[u8],
        offset: usize,
    ) -> MtResult<usize>;

    /// 丢弃粒子 `id` 的辅助状态
    fn discard_state(&mut self, id: ParticleId);

    /// 当前保存辅助状态的粒子数
    fn auxiliary_len(&self) -> usize;
}

/// 按类型构建积分器
pub fn build_integrator<V: SpaceVector>(kind: IntegratorKind) -> Box<dyn Integrator<V>> {
    match kind {
        IntegratorKind::Euler => Box::new(Euler::new()),
        IntegratorKind::Rk2 => Box::new(Rk2::<V>::new()),
        IntegratorKind::Rk4 => Box::new(Rk4::<V>::new()),
    }
}
