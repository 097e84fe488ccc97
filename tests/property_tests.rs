//! Property tests for the encoder thresholds and for spawn/despawn accounting.

#[cfg(test)]
mod tests {
    use janet_sync::{
        LiveState, MemoryTransport, ObjectDescriptor, ObserverId, ObserverMirror, Orientation,
        PositionDeltaEncoder, RenderKind, SyncScheduler, SyncedState, Vec3,
    };
    use proptest::prelude::*;

    const STEP: f64 = 1.0 / 32.0;

    fn steps_to_world(base: Vec3, dx: i32, dy: i32, dz: i32) -> Vec3 {
        Vec3::new(
            base.x + f64::from(dx) * STEP,
            base.y + f64::from(dy) * STEP,
            base.z + f64::from(dz) * STEP,
        )
    }

    fn base_position() -> impl Strategy<Value = Vec3> {
        (-2000i32..2000, -200i32..200, -2000i32..2000)
            .prop_map(|(x, y, z)| steps_to_world(Vec3::zero(), x, y, z))
    }

    // -----------------------------------------------------------------------
    // Encoder thresholds
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn motion_inside_dead_zone_is_silent(
            base in base_position(),
            (dx, dy, dz) in (-3i32..=3, -3i32..=3, -3i32..=3),
            ticks in 0u32..=400,
        ) {
            let enc = PositionDeltaEncoder::default();
            let mut live = LiveState::new(base, Orientation::default(), Vec3::zero());
            let mut synced = SyncedState::from_live(&live);
            let mut ticks = ticks;

            live.position = steps_to_world(base, dx, dy, dz);
            prop_assert_eq!(enc.encode(&mut synced, &mut live, &mut ticks), None);
        }

        #[test]
        fn large_jumps_teleport_and_reset_counter(
            base in base_position(),
            jump in prop_oneof![128i32..5000, -5000i32..=-128],
            axis in 0usize..3,
            ticks in 0u32..1000,
        ) {
            let enc = PositionDeltaEncoder::default();
            let mut live = LiveState::new(base, Orientation::default(), Vec3::zero());
            let mut synced = SyncedState::from_live(&live);
            let mut ticks = ticks;

            let mut d = [0i32; 3];
            d[axis] = jump;
            live.position = steps_to_world(base, d[0], d[1], d[2]);

            let m = enc.encode(&mut synced, &mut live, &mut ticks);
            prop_assert!(m.is_some_and(|m| m.is_teleport()));
            prop_assert_eq!(ticks, 0);
        }

        #[test]
        fn overdue_resync_always_teleports(base in base_position(), ticks in 401u32..100_000) {
            let enc = PositionDeltaEncoder::default();
            let mut live = LiveState::new(base, Orientation::default(), Vec3::zero());
            let mut synced = SyncedState::from_live(&live);
            let mut ticks = ticks;

            let m = enc.encode(&mut synced, &mut live, &mut ticks);
            prop_assert!(m.is_some_and(|m| m.is_teleport()));
            prop_assert_eq!(ticks, 0);
        }

        #[test]
        fn encoding_is_idempotent(
            from in base_position(),
            to in base_position(),
            yaw in -720.0f32..720.0,
            pitch in -90.0f32..90.0,
            vx in -2.0f64..2.0,
            ticks in 0u32..=400,
        ) {
            let enc = PositionDeltaEncoder::default();
            let mut live = LiveState::new(from, Orientation::default(), Vec3::zero());
            let mut synced = SyncedState::from_live(&live);
            let mut ticks = ticks;

            live = LiveState::new(to, Orientation::new(yaw, pitch), Vec3::new(vx, 0.0, 0.0));
            enc.encode(&mut synced, &mut live, &mut ticks);
            enc.encode_velocity(&mut synced, &live);

            prop_assert_eq!(enc.encode(&mut synced, &mut live, &mut ticks), None);
            prop_assert_eq!(enc.encode_velocity(&mut synced, &live), None);
        }
    }

    // -----------------------------------------------------------------------
    // Spawn/despawn accounting
    // -----------------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn observer_view_matches_visibility(
            paths in prop::collection::vec(
                prop::collection::vec((-40.0f64..40.0, -40.0f64..40.0), 12),
                1..4,
            ),
            observer_path in prop::collection::vec((-30.0f64..30.0, -30.0f64..30.0), 12),
        ) {
            let alice = ObserverId(1);
            let mut s = SyncScheduler::default();
            let mut t = MemoryTransport::new();
            s.add_observer(alice, Vec3::zero());
            let ids: Vec<_> = paths
                .iter()
                .map(|_| s.spawn_object(ObjectDescriptor::new(RenderKind(1), Vec3::zero())))
                .collect();

            for step in 0..12 {
                for (id, path) in ids.iter().zip(&paths) {
                    let (x, z) = path[step];
                    s.object_mut(*id).unwrap().live.position = Vec3::new(x, 0.0, z);
                }
                let (ox, oz) = observer_path[step];
                s.move_observer(alice, Vec3::new(ox, 0.0, oz)).unwrap();
                s.tick(&mut t).unwrap();
            }

            let mut mirror = ObserverMirror::new();
            for message in t.sent_to(alice) {
                prop_assert!(mirror.apply(message).is_ok(), "rejected {:?}", message);
            }

            let observer = s.observer(alice).unwrap();
            for id in &ids {
                let object = s.object(*id).unwrap();
                // Teleports may snap live state by up to half a wire step.
                let distance = object.live.position.distance_squared(&observer.position).sqrt();
                if distance < 15.9 {
                    prop_assert!(mirror.contains(*id));
                } else if distance > 16.1 {
                    prop_assert!(!mirror.contains(*id));
                }
                prop_assert_eq!(mirror.contains(*id), observer.is_subscribed(*id));
                if let Some(seen) = mirror.get(*id) {
                    prop_assert_eq!(seen.position, object.synced().position);
                    prop_assert_eq!(seen.rotation, object.synced().rotation);
                }
            }
        }
    }
}
