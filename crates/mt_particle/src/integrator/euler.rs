// crates/mt_particle/src/integrator/euler.rs

//! 前向 Euler 积分器

use super::{private, Integrator};
use crate::population::ParticleMap;
use crate::wire::{DataFormat, FieldDescriptor};
use mt_config::IntegratorKind;
use mt_foundation::{MtResult, ParticleId, SpaceVector};

/// 前向 Euler：`x += dt·v`，单子步，无辅助状态
#[derive(Debug, Default, Clone)]
pub struct Euler;

impl Euler {
    /// 创建积分器
    pub fn new() -> Self {
        Self
    }
}

impl private::Sealed for Euler {}

impl<V: SpaceVector> Integrator<V> for Euler {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Euler
    }

    fn current_step(&self) -> usize {
        0
    }

    fn integrate_step(&mut self, particles: &mut ParticleMap<V>, dt: f64) -> bool {
        for p in particles.iter_mut() {
            let x = p.position() + p.velocity() * dt;
            p.set_position(x);
        }
        false
    }

    fn wire_fields(&self, _format: DataFormat) -> Vec<FieldDescriptor> {
        Vec::new()
    }

    fn write_data(&self, _: DataFormat, _: ParticleId, _: &mut [u8], offset: usize) -> MtResult<usize> {
        Ok(offset)
    }

    fn read_data(&mut self, _: DataFormat, _: ParticleId, _: &[u8], offset: usize) -> MtResult<usize> {
        Ok(offset)
    }

    fn discard_state(&mut self, _id: ParticleId) {}

    fn auxiliary_len(&self) -> usize {
        0
    }
}
