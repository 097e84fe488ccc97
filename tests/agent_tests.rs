//! SyncAgent and ChannelTransport tests (require the `server` feature)

#[cfg(all(test, feature = "server"))]
mod tests {
    use bytes::Bytes;
    use janet_sync::{
        protocol::{subjects, ObjectRemoved, SyncEvent},
        ChannelTransport, MotionSource, ObjectDescriptor, ObjectId, ObserverId, RenderKind,
        SyncAgent, SyncAgentConfig, SyncMessage, SyncScheduler, Transport, TransportError, Vec3,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Pushes every object one world unit along +x per tick.
    struct Conveyor {
        calls: Vec<u64>,
    }

    impl MotionSource for Conveyor {
        fn advance(&mut self, tick: u64, scheduler: &mut SyncScheduler) {
            self.calls.push(tick);
            let ids: Vec<ObjectId> = scheduler.objects().map(|(id, _)| id).collect();
            for id in ids {
                if let Some(object) = scheduler.object_mut(id) {
                    object.live.position.x += 1.0;
                }
            }
        }
    }

    fn make_agent() -> (SyncAgent, ObjectId) {
        let mut scheduler = SyncScheduler::default();
        let id = scheduler.spawn_object(ObjectDescriptor::new(RenderKind(1), Vec3::zero()));
        let config = SyncAgentConfig {
            session: "test".into(),
            ..Default::default()
        };
        let agent = SyncAgent::new(config, scheduler, Box::new(Conveyor { calls: Vec::new() }));
        (agent, id)
    }

    fn decode(payload: Bytes) -> SyncEvent<SyncMessage> {
        serde_json::from_slice(&payload).expect("valid envelope")
    }

    fn drain(rx: &mut UnboundedReceiver<Bytes>) -> Vec<SyncEvent<SyncMessage>> {
        let mut events = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            events.push(decode(payload));
        }
        events
    }

    // -----------------------------------------------------------------------
    // ChannelTransport
    // -----------------------------------------------------------------------

    #[test]
    fn channel_transport_frames_messages_with_tick() {
        let mut transport = ChannelTransport::new("test");
        let mut rx = transport.register(ObserverId(1));
        let message = SyncMessage::Despawn(ObjectRemoved {
            object_id: ObjectId::new(4, 2),
        });

        transport.begin_tick(17);
        transport.send(ObserverId(1), &message).unwrap();

        let event = tokio_test::block_on(rx.recv()).map(decode).unwrap();
        assert_eq!(event.session, "test");
        assert_eq!(event.frame, 17);
        assert_eq!(event.payload, message);
    }

    #[test]
    fn channel_transport_rejects_unknown_or_closed_observers() {
        let mut transport = ChannelTransport::new("test");
        let message = SyncMessage::Despawn(ObjectRemoved {
            object_id: ObjectId::new(0, 0),
        });
        assert!(matches!(
            transport.send(ObserverId(1), &message),
            Err(TransportError::Disconnected(ObserverId(1)))
        ));

        let rx = transport.register(ObserverId(2));
        drop(rx);
        assert!(transport.send(ObserverId(2), &message).is_err());

        assert!(transport.unregister(ObserverId(2)));
        assert!(!transport.is_registered(ObserverId(2)));
    }

    // -----------------------------------------------------------------------
    // SyncAgent
    // -----------------------------------------------------------------------

    #[test]
    fn connected_observer_receives_spawn_then_movement() {
        let (mut agent, id) = make_agent();
        let mut rx = agent.connect_observer(1, 0.0, 0.0, 0.0);

        let report = agent.step().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.spawns, 1);

        let events = drain(&mut rx);
        let subjects: Vec<_> = events.iter().map(|e| e.payload.subject()).collect();
        assert_eq!(subjects, vec![subjects::OBJECT_SPAWNED, subjects::OBJECT_MOVEMENT]);
        assert!(events.iter().all(|e| e.frame == 1 && e.payload.object_id() == id));
    }

    #[test]
    fn observer_leaving_range_by_command_is_despawned() {
        let (mut agent, _) = make_agent();
        let mut rx = agent.connect_observer(1, 0.0, 0.0, 0.0);
        agent.step().unwrap();
        drain(&mut rx);

        agent.move_observer(1, -500.0, 0.0, 0.0);
        agent.step().unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.subject(), subjects::OBJECT_REMOVED);
    }

    #[test]
    fn handle_command_queues_bus_payloads() {
        let (mut agent, _) = make_agent();
        let _rx = agent.connect_observer(1, 0.0, 0.0, 0.0);
        agent.step().unwrap();

        agent
            .handle_command(br#"{"command":"leave","id":1}"#)
            .unwrap();
        agent.step().unwrap();
        assert!(agent.scheduler().observer(ObserverId(1)).is_none());

        assert!(agent.handle_command(b"not json").is_err());
    }

    #[test]
    fn bus_join_without_channel_is_refused() {
        let (mut agent, _) = make_agent();
        let err = agent
            .handle_command(br#"{"command":"join","id":5,"x":0,"y":0,"z":0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("connect_observer"));

        for _ in 0..5 {
            let report = agent.step().unwrap();
            assert!(report.failed_observers.is_empty());
        }
        let stats = agent.scheduler().stats();
        assert_eq!(stats.observers, 0);
        assert_eq!(stats.send_failures, 0);
    }

    #[test]
    fn disconnected_observer_is_removed_quietly() {
        let (mut agent, _) = make_agent();
        let rx = agent.connect_observer(1, 0.0, 0.0, 0.0);
        agent.step().unwrap();

        agent.disconnect_observer(1);
        drop(rx);
        let report = agent.step().unwrap();
        assert!(report.failed_observers.is_empty());
        assert_eq!(agent.scheduler().stats().observers, 0);
    }

    #[test]
    fn run_stops_when_shutdown_resolves() {
        let (agent, _) = make_agent();
        let result = tokio_test::block_on(agent.run(async {}));
        assert!(result.is_ok());
    }

    #[test]
    fn non_finite_physics_fails_the_step() {
        let (mut agent, id) = make_agent();
        agent.scheduler_mut().object_mut(id).unwrap().live.position.y = f64::INFINITY;
        let err = agent.step().unwrap_err();
        assert!(err.to_string().contains("Sync tick 1 failed"));
    }
}
