//! GroupCadenceCoordinator and coupled-group scheduling tests

#[cfg(test)]
mod tests {
    use janet_sync::{
        GroupCadenceCoordinator, GroupId, MemoryTransport, ObjectDescriptor, ObjectId,
        RenderKind, SyncError, SyncScheduler, Vec3,
    };
    use std::collections::BTreeSet;

    fn cart(x: f64, interval: u32) -> ObjectDescriptor {
        ObjectDescriptor::new(RenderKind(1), Vec3::new(x, 0.0, 0.0)).with_sync_interval(interval)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    #[test]
    fn object_belongs_to_at_most_one_group() {
        let mut c = GroupCadenceCoordinator::new();
        let a = c.create_group();
        let b = c.create_group();
        let obj = ObjectId::new(0, 0);

        c.add_member(a, obj).unwrap();
        let err = c.add_member(b, obj).unwrap_err();
        assert!(matches!(err, SyncError::AlreadyGrouped { group, .. } if group == a));
        assert_eq!(c.group_of(obj), Some(a));
    }

    #[test]
    fn joining_unknown_group_fails() {
        let mut c = GroupCadenceCoordinator::new();
        let err = c.add_member(GroupId(9), ObjectId::new(0, 0)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownGroup(GroupId(9))));
    }

    #[test]
    fn group_disappears_with_its_last_member() {
        let mut c = GroupCadenceCoordinator::new();
        let g = c.create_group();
        c.add_member(g, ObjectId::new(0, 0)).unwrap();
        c.add_member(g, ObjectId::new(1, 0)).unwrap();

        assert_eq!(c.remove_member(ObjectId::new(0, 0)), Some(g));
        assert_eq!(c.group(g).map(|g| g.len()), Some(1));
        assert_eq!(c.remove_member(ObjectId::new(1, 0)), Some(g));
        assert!(c.group(g).is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn dissolve_releases_every_member() {
        let mut c = GroupCadenceCoordinator::new();
        let g = c.create_group();
        let members = [ObjectId::new(0, 0), ObjectId::new(1, 0)];
        for m in members {
            c.add_member(g, m).unwrap();
        }

        assert_eq!(c.dissolve(g).unwrap(), members.to_vec());
        assert!(members.iter().all(|m| c.group_of(*m).is_none()));
        assert!(c.dissolve(g).is_err());
    }

    // -----------------------------------------------------------------------
    // Cadence
    // -----------------------------------------------------------------------

    #[test]
    fn any_due_member_makes_the_group_due() {
        let mut c = GroupCadenceCoordinator::new();
        let g = c.create_group();
        let (a, b, loner) = (ObjectId::new(0, 0), ObjectId::new(1, 0), ObjectId::new(2, 0));
        c.add_member(g, a).unwrap();
        c.add_member(g, b).unwrap();

        assert!(c.is_due(b, |m| m == a));
        assert!(!c.is_due(loner, |m| m == a));

        let mut due = BTreeSet::from([a, loner]);
        c.propagate_due(&mut due);
        assert_eq!(due, BTreeSet::from([a, b, loner]));
    }

    #[test]
    fn coupled_carts_sync_on_the_same_tick() {
        let mut s = SyncScheduler::default();
        let mut t = MemoryTransport::new();
        let a = s.spawn_object(cart(0.0, 4));
        let b = s.spawn_object(cart(1.5, 6));
        let loner = s.spawn_object(cart(3.0, 6));
        s.create_group(&[a, b]).unwrap();

        for _ in 0..12 {
            let report = s.tick(&mut t).unwrap();
            let last = |id| s.object(id).and_then(|o| o.last_sync_tick());
            assert_eq!(last(a), last(b), "tick {}", report.tick);
        }

        // a is due on 1, 5, 9; b follows it. The loner keeps its own cadence.
        assert_eq!(s.object(b).and_then(|o| o.last_sync_tick()), Some(9));
        assert_eq!(s.object(loner).and_then(|o| o.last_sync_tick()), Some(7));
        assert!(s.is_due(b, 13));
        assert!(!s.is_due(loner, 12));
    }

    #[test]
    fn failed_group_creation_has_no_side_effects() {
        let mut s = SyncScheduler::default();
        let a = s.spawn_object(cart(0.0, 1));
        let b = s.spawn_object(cart(1.0, 1));
        let first = s.create_group(&[a]).unwrap();

        assert!(s.create_group(&[b, a]).is_err());
        assert_eq!(s.stats().groups, 1);
        assert_eq!(s.object(b).and_then(|o| o.group()), None);
        assert_eq!(s.object(a).and_then(|o| o.group()), Some(first));

        let err = s.create_group(&[b, b]).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateMember(dup) if dup == b));
        assert_eq!(s.stats().groups, 1);
        assert_eq!(s.object(b).and_then(|o| o.group()), None);
    }

    #[test]
    fn empty_member_list_is_rejected() {
        let mut s = SyncScheduler::default();
        for _ in 0..3 {
            assert!(matches!(s.create_group(&[]), Err(SyncError::EmptyGroup)));
        }
        assert_eq!(s.stats().groups, 0);
    }

    #[test]
    fn destroying_a_member_leaves_the_group() {
        let mut s = SyncScheduler::default();
        let mut t = MemoryTransport::new();
        let a = s.spawn_object(cart(0.0, 1));
        let b = s.spawn_object(cart(1.0, 1));
        let g = s.create_group(&[a, b]).unwrap();

        s.destroy_object(a, &mut t).unwrap();
        assert_eq!(s.group(g).map(|g| g.members().to_vec()), Some(vec![b]));

        assert_eq!(s.leave_group(b), Some(g));
        assert!(s.group(g).is_none());
        assert_eq!(s.object(b).and_then(|o| o.group()), None);
    }
}
