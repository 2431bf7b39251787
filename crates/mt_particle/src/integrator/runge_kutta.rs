// crates/mt_particle/src/integrator/runge_kutta.rs

//! Runge-Kutta 粒子积分器
//!
//! ## RK2（中点法）
//!
//! ```text
//! 子步 0: loc0 = x;  x = loc0 + ½·dt·v(x)
//! 子步 1: x = loc0 + dt·v(x_mid)
//! ```
//!
//! ## RK4（经典四阶）
//!
//! ```text
//! 子步 0: loc0 = x;  k1 = dt·v;  x = loc0 + ½·k1
//! 子步 1: k2 = dt·v;  x = loc0 + ½·k2
//! 子步 2: k3 = dt·v;  x = loc0 + k3
//! 子步 3: k4 = dt·v;  x = loc0 + (k1 + 2·k2 + 2·k3 + k4) / 6
//! ```
//!
//! 中间子步找不到某个粒子的辅助状态时，以粒子当前位置重新开始该粒子的周期并
//! 记录警告。正常运行中辅助状态随粒子一起交换，不会出现这种情况。

use super::{private, Integrator};
use crate::population::ParticleMap;
use crate::wire::{self, DataFormat, ElementType, FieldDescriptor};
use mt_config::IntegratorKind;
use mt_foundation::{MtResult, ParticleId, SpaceVector};
use std::collections::HashMap;
use tracing::warn;

// ============================================================================
// RK2
// ============================================================================

/// 二阶 Runge-Kutta 积分器
#[derive(Debug, Clone, Default)]
pub struct Rk2<V> {
    step: usize,
    loc0: HashMap<ParticleId, V>,
}

impl<V: SpaceVector> Rk2<V> {
    /// 创建积分器
    pub fn new() -> Self {
        Self {
            step: 0,
            loc0: HashMap::new(),
        }
    }
}

impl<V> private::Sealed for Rk2<V> {}

impl<V: SpaceVector> Integrator<V> for Rk2<V> {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Rk2
    }

    fn current_step(&self) -> usize {
        self.step
    }

    fn integrate_step(&mut self, particles: &mut ParticleMap<V>, dt: f64) -> bool {
        match self.step {
            0 => {
                for p in particles.iter_mut() {
                    let x0 = p.position();
                    self.loc0.insert(p.id(), x0);
                    p.set_position(x0 + p.velocity() * (0.5 * dt));
                }
                self.step = 1;
                true
            }
            1 => {
                for p in particles.iter_mut() {
                    let x0 = match self.loc0.get(&p.id()) {
                        Some(&x0) => x0,
                        None => {
                            warn!("RK2: 粒子 {} 缺少辅助状态, 从当前位置重新开始", p.id());
                            p.position()
                        }
                    };
                    p.set_position(x0 + p.velocity() * dt);
                }
                self.loc0.clear();
                self.step = 0;
                false
            }
            step => unreachable!("RK2 子步计数越界: {}", step),
        }
    }

    fn wire_fields(&self, format: DataFormat) -> Vec<FieldDescriptor> {
        match format {
            DataFormat::Exchange | DataFormat::Storage => {
                vec![FieldDescriptor::new("rk2_loc0", V::DIM, ElementType::F64)]
            }
        }
    }

    fn write_data(
        &self,
        _format: DataFormat,
        id: ParticleId,
        buf: &mut [u8],
        offset: usize,
    ) -> MtResult<usize> {
        let loc0 = self.loc0.get(&id).copied().unwrap_or_default();
        wire::write_vector(buf, offset, &loc0)
    }

    fn read_data(
        &mut self,
        _format: DataFormat,
        id: ParticleId,
        buf: &[u8],
        offset: usize,
    ) -> MtResult<usize> {
        let (loc0, off) = wire::read_vector::<V>(buf, offset)?;
        if self.step != 0 {
            self.loc0.insert(id, loc0);
        }
        Ok(off)
    }

    fn discard_state(&mut self, id: ParticleId) {
        self.loc0.remove(&id);
    }

    fn auxiliary_len(&self) -> usize {
        self.loc0.len()
    }
}

// ============================================================================
// RK4
// ============================================================================

/// RK4 单粒子辅助状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Rk4State<V> {
    loc0: V,
    k1: V,
    k2: V,
    k3: V,
}

/// 四阶 Runge-Kutta 积分器
#[derive(Debug, Clone, Default)]
pub struct Rk4<V> {
    step: usize,
    states: HashMap<ParticleId, Rk4State<V>>,
}

impl<V: SpaceVector> Rk4<V> {
    /// 创建积分器
    pub fn new() -> Self {
        Self {
            step: 0,
            states: HashMap::new(),
        }
    }

    fn state_for(&mut self, id: ParticleId, x: V, k: V) -> &mut Rk4State<V> {
        let step = self.step;
        self.states.entry(id).or_insert_with(|| {
            warn!("RK4: 粒子 {} 在子步 {} 缺少辅助状态, 从当前位置重新开始", id, step);
            Rk4State {
                loc0: x,
                k1: k,
                k2: k,
                k3: k,
            }
        })
    }
}

impl<V> private::Sealed for Rk4<V> {}

impl<V: SpaceVector> Integrator<V> for Rk4<V> {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Rk4
    }

    fn current_step(&self) -> usize {
        self.step
    }

    fn integrate_step(&mut self, particles: &mut ParticleMap<V>, dt: f64) -> bool {
        match self.step {
            0 => {
                for p in particles.iter_mut() {
                    let loc0 = p.position();
                    let k1 = p.velocity() * dt;
                    self.states.insert(
                        p.id(),
                        Rk4State {
                            loc0,
                            k1,
                            ..Default::default()
                        },
                    );
                    p.set_position(loc0 + k1 * 0.5);
                }
            }
            1 => {
                for p in particles.iter_mut() {
                    let k2 = p.velocity() * dt;
                    let state = self.state_for(p.id(), p.position(), k2);
                    state.k2 = k2;
                    let x = state.loc0 + k2 * 0.5;
                    p.set_position(x);
                }
            }
            2 => {
                for p in particles.iter_mut() {
                    let k3 = p.velocity() * dt;
                    let state = self.state_for(p.id(), p.position(), k3);
                    state.k3 = k3;
                    let x = state.loc0 + k3;
                    p.set_position(x);
                }
            }
            3 => {
                for p in particles.iter_mut() {
                    let k4 = p.velocity() * dt;
                    let s = *self.state_for(p.id(), p.position(), k4);
                    let x = s.loc0 + (s.k1 + s.k2 * 2.0 + s.k3 * 2.0 + k4) / 6.0;
                    p.set_position(x);
                }
                self.states.clear();
                self.step = 0;
                return false;
            }
            step => unreachable!("RK4 子步计数越界: {}", step),
        }
        self.step += 1;
        true
    }

    fn wire_fields(&self, format: DataFormat) -> Vec<FieldDescriptor> {
        match format {
            DataFormat::Exchange | DataFormat::Storage => vec![
                FieldDescriptor::new("rk4_loc0", V::DIM, ElementType::F64),
                FieldDescriptor::new("rk4_k1", V::DIM, ElementType::F64),
                FieldDescriptor::new("rk4_k2", V::DIM, ElementType::F64),
                FieldDescriptor::new("rk4_k3", V::DIM, ElementType::F64),
            ],
        }
    }

    fn write_data(
        &self,
        _format: DataFormat,
        id: ParticleId,
        buf: &mut [u8],
        offset: usize,
    ) -> MtResult<usize> {
        let s = self.states.get(&id).copied().unwrap_or_default();
        let off = wire::write_vector(buf, offset, &s.loc0)?;
        let off = wire::write_vector(buf, off, &s.k1)?;
        let off = wire::write_vector(buf, off, &s.k2)?;
        wire::write_vector(buf, off, &s.k3)
    }

    fn read_data(
        &mut self,
        _format: DataFormat,
        id: ParticleId,
        buf: &[u8],
        offset: usize,
    ) -> MtResult<usize> {
        let (loc0, off) = wire::read_vector::<V>(buf, offset)?;
        let (k1, off) = wire::read_vector::<V>(buf, off)?;
        let (k2, off) = wire::read_vector::<V>(buf, off)?;
        let (k3, off) = wire::read_vector::<V>(buf, off)?;
        if self.step != 0 {
            self.states.insert(id, Rk4State { loc0, k1, k2, k3 });
        }
        Ok(off)
    }

    fn discard_state(&mut self, id: ParticleId) {
        self.states.remove(&id);
    }

    fn auxiliary_len(&self) -> usize {
        self.states.len()
    }
}
