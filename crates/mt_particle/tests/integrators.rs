//! 积分器子步约定测试

use glam::DVec3;
use mt_config::IntegratorKind;
use mt_foundation::{CellHandle, ParticleId};
use mt_particle::{build_integrator, DataFormat, Particle, ParticleMap};

fn population(n: u64) -> ParticleMap<DVec3> {
    (0..n)
        .map(|i| Particle::new(ParticleId(i), DVec3::new(i as f64, 0.0, 1.0)))
        .collect()
}

/// 每个子步前把速度设为 `v(x)`，返回子步数
fn run_cycle(
    kind: IntegratorKind,
    particles: &mut ParticleMap<DVec3>,
    dt: f64,
    v: impl Fn(DVec3) -> DVec3,
) -> usize {
    let mut integrator = build_integrator::<DVec3>(kind);
    let mut calls = 0;
    loop {
        for p in particles.iter_mut() {
            let velocity = v(p.position());
            p.set_velocity(velocity);
        }
        calls += 1;
        if !integrator.integrate_step(particles, dt) {
            break;
        }
        assert!(calls < 10, "integrator never finished");
    }
    assert_eq!(integrator.current_step(), 0);
    assert_eq!(integrator.auxiliary_len(), 0);
    calls
}

#[test]
fn test_sub_step_counts() {
    for kind in IntegratorKind::ALL {
        let mut particles = population(4);
        let calls = run_cycle(kind, &mut particles, 0.1, |_| DVec3::X);
        assert_eq!(calls, kind.sub_steps());
    }
}

#[test]
fn test_constant_velocity_is_exact() {
    let v = DVec3::new(0.5, -1.0, 2.0);
    for kind in IntegratorKind::ALL {
        let mut particles = population(3);
        run_cycle(kind, &mut particles, 0.2, |_| v);
        for p in particles.iter() {
            let start = DVec3::new(p.id().get() as f64, 0.0, 1.0);
            assert!((p.position() - (start + v * 0.2)).length() < 1e-14, "{}", kind);
        }
    }
}

#[test]
fn test_order_of_accuracy_on_linear_field() {
    // v(x) = x 在 x 方向的精确解为 x0·e^dt
    let dt: f64 = 0.1;
    let exact = dt.exp();
    let error = |kind| {
        let mut particles: ParticleMap<DVec3> =
            std::iter::once(Particle::new(ParticleId(0), DVec3::X)).collect();
        run_cycle(kind, &mut particles, dt, |x| DVec3::new(x.x, 0.0, 0.0));
        let err = (particles.iter().next().unwrap().position().x - exact).abs();
        err
    };
    let euler = error(IntegratorKind::Euler);
    let rk2 = error(IntegratorKind::Rk2);
    let rk4 = error(IntegratorKind::Rk4);
    assert!(rk2 < euler / 10.0);
    assert!(rk4 < rk2 / 100.0);
    assert!(rk4 < 1e-6);
}

#[test]
fn test_aux_state_written_mid_cycle() {
    let mut particles = population(1);
    let mut integrator = build_integrator::<DVec3>(IntegratorKind::Rk4);
    for p in particles.iter_mut() {
        p.set_velocity(DVec3::Y);
    }
    assert!(integrator.integrate_step(&mut particles, 0.5));

    let id = ParticleId(0);
    let len = integrator.data_len(DataFormat::Exchange);
    let mut buf = vec![0u8; len];
    assert_eq!(integrator.write_data(DataFormat::Exchange, id, &mut buf, 0).unwrap(), len);
    assert!(buf.iter().any(|&b| b != 0));

    let mut receiver = build_integrator::<DVec3>(IntegratorKind::Rk4);
    assert_eq!(receiver.read_data(DataFormat::Exchange, id, &buf, 0).unwrap(), len);
    assert_eq!(receiver.auxiliary_len(), 0);

    integrator.discard_state(id);
    assert_eq!(integrator.auxiliary_len(), 0);
    assert_eq!(particles.count_in(CellHandle::INVALID), 1);
}

#[test]
fn test_aux_state_survives_transfer_mid_cycle() {
    let id = ParticleId(0);
    for kind in [IntegratorKind::Rk2, IntegratorKind::Rk4] {
        let mut particles = population(1);
        let mut sender = build_integrator::<DVec3>(kind);
        for p in particles.iter_mut() {
            p.set_velocity(DVec3::new(0.3, -1.0, 2.0));
        }
        assert!(sender.integrate_step(&mut particles, 0.5));
        if kind == IntegratorKind::Rk4 {
            for p in particles.iter_mut() {
                p.set_velocity(DVec3::new(1.0, 0.5, -0.25));
            }
            assert!(sender.integrate_step(&mut particles, 0.5));
        }

        let len = sender.data_len(DataFormat::Exchange);
        let mut sent = vec![0u8; len];
        sender.write_data(DataFormat::Exchange, id, &mut sent, 0).unwrap();

        // 接收方处于同一子步
        let mut receiver = build_integrator::<DVec3>(kind);
        let mut empty = ParticleMap::new();
        while receiver.current_step() < sender.current_step() {
            assert!(receiver.integrate_step(&mut empty, 0.5));
        }
        assert_eq!(receiver.read_data(DataFormat::Exchange, id, &sent, 0).unwrap(), len);
        assert_eq!(receiver.auxiliary_len(), 1);

        let mut echoed = vec![0u8; len];
        receiver.write_data(DataFormat::Exchange, id, &mut echoed, 0).unwrap();
        assert_eq!(echoed, sent, "{}", kind);

        // 两边用相同速度完成周期，结果一致
        let mut moved = particles.clone();
        loop {
            for p in particles.iter_mut().chain(moved.iter_mut()) {
                p.set_velocity(DVec3::new(-0.5, 0.25, 1.0));
            }
            let more = sender.integrate_step(&mut particles, 0.5);
            assert_eq!(receiver.integrate_step(&mut moved, 0.5), more);
            if !more {
                break;
            }
        }
        let a = particles.iter().next().unwrap().position();
        let b = moved.iter().next().unwrap().position();
        assert_eq!(a, b, "{}", kind);
    }
}
