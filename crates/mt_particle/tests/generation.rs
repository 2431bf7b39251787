//! 粒子生成测试

use glam::{DVec2, DVec3};
use mt_comm::{Communicator, LocalCommunicator, LocalGroup, SerialCommunicator};
use mt_config::{BoundaryKind, IntegratorKind, ParticleConfig};
use mt_foundation::MtError;
use mt_mesh::{BoxTreeMesh, MeshProvider};
use mt_particle::{UniformVelocity, World};
use parking_lot::RwLock;
use std::sync::Arc;

fn partitioned(comm: LocalCommunicator, subdivisions: usize) -> World<DVec2, BoxTreeMesh<DVec2>, LocalCommunicator> {
    let n_ranks = comm.size();
    let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, subdivisions, comm.rank()).unwrap();
    mesh.partition(n_ranks).unwrap();
    World::new(Arc::new(RwLock::new(mesh)), comm, &ParticleConfig::default()).unwrap()
}

fn serial_world() -> World<DVec2, BoxTreeMesh<DVec2>, SerialCommunicator> {
    let mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 3, 0).unwrap();
    World::new(
        Arc::new(RwLock::new(mesh)),
        SerialCommunicator::new(),
        &ParticleConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_zero_particles() {
    let counts = LocalGroup::run(3, |comm| {
        let mut world = partitioned(comm, 4);
        world.generate_global_particles(0).unwrap();
        world.local_particle_count()
    });
    assert_eq!(counts, vec![0, 0, 0]);
}

#[test]
fn test_ids_are_contiguous_per_rank() {
    let ranges = LocalGroup::run(3, |comm| {
        let mut world = partitioned(comm, 4);
        world.generate_global_particles(1_001).unwrap();
        let mut ids: Vec<u64> = world.particles().ids().into_iter().map(|id| id.get()).collect();
        ids.sort_unstable();
        for pair in ids.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        (ids.first().copied(), ids.len() as u64)
    });

    let mut next = 0;
    for (first, len) in ranges {
        if len > 0 {
            assert_eq!(first, Some(next));
        }
        next += len;
    }
    assert_eq!(next, 1_001);
}

#[test]
fn test_split_follows_owned_volume() {
    let counts = LocalGroup::run(2, |comm| {
        let mut world = partitioned(comm, 4);
        world.generate_global_particles(1_000).unwrap();
        world.local_particle_count()
    });
    assert_eq!(counts, vec![500, 500]);
}

#[test]
fn test_ranks_without_cells_get_nothing() {
    let counts = LocalGroup::run(3, |comm| {
        let mut world = partitioned(comm, 1);
        world.generate_global_particles(77).unwrap();
        world.local_particle_count()
    });
    assert_eq!(counts, vec![77, 0, 0]);
}

#[test]
fn test_particles_start_local_in_owned_cells() {
    LocalGroup::run(2, |comm| {
        let mut world = partitioned(comm, 4);
        world.generate_global_particles(300).unwrap();
        let mesh = world.mesh().read();
        for p in world.particles().iter() {
            assert!(p.is_local());
            assert!(mesh.is_locally_owned(p.cell()));
            assert!(mesh.contains_point(p.cell(), &p.position()));
        }
    });
}

#[test]
fn test_over_request_is_rejected_without_abort() {
    let mut world = serial_world();
    world.set_global_particle_count(10);

    let err = world.generate_particles_in_subdomain(5, 8).unwrap_err();
    assert!(matches!(err, MtError::InvalidInput { .. }));
    assert_eq!(world.local_particle_count(), 0);

    world.generate_particles_in_subdomain(10, 0).unwrap();
    world.check_particle_count().unwrap();
}

#[test]
fn test_same_seed_same_positions() {
    let positions = |seed: u64| {
        let mesh = BoxTreeMesh::new(DVec3::ZERO, DVec3::ONE, 2, 0).unwrap();
        let config = ParticleConfig {
            seed,
            ..ParticleConfig::default()
        };
        let mut world = World::new(Arc::new(RwLock::new(mesh)), SerialCommunicator::new(), &config).unwrap();
        world.generate_global_particles(50).unwrap();
        let mut all: Vec<(u64, DVec3)> = world
            .particles()
            .iter()
            .map(|p| (p.id().get(), p.position()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    };
    assert_eq!(positions(3), positions(3));
    assert_ne!(positions(3), positions(4));
}

#[test]
fn test_count_mismatch_is_fatal() {
    let mut world = serial_world();
    world.generate_global_particles(20).unwrap();
    world.set_global_particle_count(21);

    let err = world.check_particle_count().unwrap_err();
    assert!(matches!(err, MtError::ParticleCountMismatch { expected: 21, actual: 20 }));
    assert!(world.check_particle_count().is_err());
    world.set_global_particle_count(20);
    assert!(matches!(
        world.check_particle_count().unwrap_err(),
        MtError::Aborted { .. }
    ));
}

#[test]
fn test_second_generation_replaces_population() {
    let mut world = serial_world();
    world.generate_global_particles(10).unwrap();
    world.generate_global_particles(20).unwrap();

    assert_eq!(world.global_particle_count(), 20);
    assert_eq!(world.local_particle_count(), 20);
    let mut ids: Vec<u64> = world.particles().ids().into_iter().map(|id| id.get()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..20).collect::<Vec<u64>>());

    world
        .advance_timestep(0.01, &UniformVelocity::new(DVec2::ZERO))
        .unwrap();
    world.check_particle_count().unwrap();
}

#[test]
fn test_regeneration_across_ranks_drops_integrator_state() {
    let per_rank = LocalGroup::run(3, |comm| {
        let mesh = {
            let mut mesh = BoxTreeMesh::new(DVec2::ZERO, DVec2::ONE, 4, comm.rank()).unwrap();
            mesh.partition(comm.size()).unwrap();
            mesh
        };
        let config = ParticleConfig::default()
            .with_integrator(IntegratorKind::Rk4)
            .with_boundary(BoundaryKind::Clamp);
        let mut world = World::new(Arc::new(RwLock::new(mesh)), comm, &config).unwrap();
        world.generate_global_particles(500).unwrap();
        world
            .advance_timestep(0.05, &UniformVelocity::new(DVec2::new(0.1, 0.2)))
            .unwrap();

        world.generate_global_particles(120).unwrap();
        assert_eq!(world.integrator().auxiliary_len(), 0);
        world.check_particle_count().unwrap();
        world.particles().ids().into_iter().map(|id| id.get()).collect::<Vec<u64>>()
    });

    let mut all: Vec<u64> = per_rank.into_iter().flatten().collect();
    all.sort_unstable();
    assert_eq!(all, (0..120).collect::<Vec<u64>>());
}
