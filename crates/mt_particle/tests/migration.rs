// crates/mt_particle/tests/migration.rs

//! 积分器辅助状态随粒子迁移的测试
//!
//! 粒子在多子步积分的中途越过分区边界时，接收方必须继续同一个积分周期，
//! 结果应与单工作进程运行逐位一致。

use glam::DVec2;
use mt_comm::{Communicator, LocalGroup};
use mt_config::{IntegratorKind, ParticleConfig};
use mt_foundation::ParticleId;
use mt_mesh::BoxTreeMesh;
use mt_particle::{Particle, RigidRotation, UniformVelocity, VelocityField, World};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// rank 0 插入全部粒子，推进 `steps` 步后汇总所有粒子位置
fn run(
    n_workers: usize,
    kind: IntegratorKind,
    initial: &[DVec2],
    field: &(dyn VelocityField<DVec2> + Sync),
    dt: f64,
    steps: usize,
) -> BTreeMap<u64, (usize, DVec2)> {
    let per_rank = LocalGroup::run(n_workers, |comm| {
        let rank = comm.rank();
        let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 4, rank).unwrap();
        mesh.partition(n_workers).unwrap();
        let config = ParticleConfig::default().with_integrator(kind);
        let mut world = World::new(Arc::new(RwLock::new(mesh)), comm, &config).unwrap();

        world.set_global_particle_count(initial.len() as u64);
        if rank == 0 {
            for (i, &p) in initial.iter().enumerate() {
                world.insert_particle(Particle::new(ParticleId(i as u64), p));
            }
        }
        for _ in 0..steps {
            world.advance_timestep(dt, field).unwrap();
            assert_eq!(world.integrator().auxiliary_len(), 0);
        }
        world
            .particles()
            .iter()
            .map(|p| (p.id().get(), (rank, p.position())))
            .collect::<Vec<_>>()
    });

    let mut all = BTreeMap::new();
    for (id, entry) in per_rank.into_iter().flatten() {
        assert!(all.insert(id, entry).is_none(), "particle {} held twice", id);
    }
    assert_eq!(all.len(), initial.len());
    all
}

#[test]
fn test_rk4_state_crosses_partition_mid_cycle() {
    // v = (0, 1), dt = 0.5：第一个子步后 y = 0.65，已进入 rank 1
    let field = UniformVelocity::new(DVec2::new(0.0, 1.0));
    let result = run(2, IntegratorKind::Rk4, &[DVec2::new(0.3, 0.4)], &field, 0.5, 1);

    let (rank, position) = result[&0];
    assert_eq!(rank, 1);
    assert!((position.x - 0.3).abs() < 1e-14);
    assert!((position.y - 0.9).abs() < 1e-12, "y = {}", position.y);
}

#[test]
fn test_rk2_state_crosses_partition_mid_cycle() {
    let field = UniformVelocity::new(DVec2::new(0.0, 1.0));
    let result = run(2, IntegratorKind::Rk2, &[DVec2::new(0.6, 0.4)], &field, 0.4, 1);

    let (rank, position) = result[&0];
    assert_eq!(rank, 1);
    assert!((position.y - 0.8).abs() < 1e-12, "y = {}", position.y);
}

#[test]
fn test_distributed_matches_serial() {
    let initial: Vec<DVec2> = (0..200)
        .map(|i| {
            let t = i as f64 / 200.0;
            DVec2::new(0.2 + 0.6 * t, 0.2 + 0.6 * ((t * 7.0).fract()))
        })
        .collect();
    let field = RigidRotation::new(DVec2::new(0.5, 0.5), 1.5);

    for kind in IntegratorKind::ALL {
        let serial = run(1, kind, &initial, &field, 0.05, 8);
        let distributed = run(3, kind, &initial, &field, 0.05, 8);
        for (id, (_, expected)) in &serial {
            let (_, actual) = distributed[id];
            assert!(
                (actual - *expected).length() < 1e-12,
                "{} particle {}: {:?} vs {:?}",
                kind,
                id,
                actual,
                expected
            );
        }
    }
}

#[test]
fn test_rotation_preserves_radius_with_rk4() {
    let initial = [DVec2::new(0.8, 0.5), DVec2::new(0.5, 0.25), DVec2::new(0.3, 0.3)];
    let center = DVec2::new(0.5, 0.5);
    let field = RigidRotation::new(center, 1.0);
    let result = run(2, IntegratorKind::Rk4, &initial, &field, 0.01, 100);

    for (id, (_, position)) in &result {
        let r0 = (initial[*id as usize] - center).length();
        let r1 = (*position - center).length();
        assert!((r0 - r1).abs() < 1e-8, "particle {}: {} -> {}", id, r0, r1);
    }
}
