//! # Multi-Node Scheduling
//!
//! Three nodes start from the same genesis, each holding the key of exactly
//! one mediator. Units produced by one node are delivered to the others over
//! its broadcast channel and committed there. Every node must end up with
//! the same tip, the same round order and the same per-mediator statistics.
//!
//! ```text
//! [Node 0] ──UnitProduced──→ [Node 1], [Node 2]
//! [Node 1] ──UnitProduced──→ [Node 0], [Node 2]
//! [Node 2] ──UnitProduced──→ [Node 0], [Node 1]
//! ```

#[cfg(test)]
mod tests {
    use primitive_types::H256;
    use qc_17_mediator_scheduling::{
        restore_chain_state, BroadcastChannelPublisher, ChainParameters, ChainState, ChainTip,
        Ed25519KeyStore, GlobalProperty, InMemoryUnitStorage, Mediator, ProducerDependencies,
        ProductionCondition, SchedulingConfig, SchedulingQuery, SharedChainState, TimeSource,
        UnitProducedEvent, UnitProducer, UnitStorage, VerifiedUnit,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const GENESIS_TIME: u64 = 1_700_000_100;
    const INTERVAL: u64 = 3;
    const NODES: usize = 3;

    /// Wall clock shared by every node of the simulation
    struct SharedClock(AtomicU64);

    impl SharedClock {
        fn set_secs(&self, secs: u64) {
            self.0.store(secs * 1_000, Ordering::SeqCst);
        }
    }

    impl TimeSource for SharedClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    type Producer = UnitProducer<Ed25519KeyStore, InMemoryUnitStorage, BroadcastChannelPublisher>;

    struct Node {
        name: String,
        producer: Producer,
        keystore: Arc<Ed25519KeyStore>,
        storage: Arc<InMemoryUnitStorage>,
        units: broadcast::Receiver<UnitProducedEvent>,
        online: bool,
    }

    impl Node {
        fn state(&self) -> SharedChainState {
            self.producer.state()
        }

        /// Apply a unit received from another node
        async fn receive(&self, unit: &VerifiedUnit) {
            self.storage.append_unit(unit.clone()).await.unwrap();
            self.state().write().update_global_dyn_prop(unit).unwrap();
        }

        fn snapshot(&self) -> ChainTip {
            ChainTip::from_state(&self.state().read())
        }
    }

    fn committee() -> GlobalProperty {
        let mediators = (0..NODES)
            .map(|i| Arc::new(Mediator::new(format!("mediator{i}"), format!("key{i}"))))
            .collect();
        GlobalProperty::new(ChainParameters::new(INTERVAL, 0).unwrap(), mediators).unwrap()
    }

    fn seed(i: usize) -> [u8; 32] {
        [i as u8 + 1; 32]
    }

    fn start_node(i: usize, clock: Arc<SharedClock>) -> Node {
        let name = format!("mediator{i}");
        let keystore = Arc::new(Ed25519KeyStore::new().with_seed(format!("key{i}"), seed(i)));
        let storage = Arc::new(InMemoryUnitStorage::with_genesis(H256::zero()));
        let publisher = Arc::new(BroadcastChannelPublisher::new());
        let units = publisher.subscribe();

        let config = SchedulingConfig {
            chain: ChainParameters::new(INTERVAL, 0).unwrap(),
            local_mediators: vec![name.clone()],
            enable_stale_production: true,
            ..SchedulingConfig::default()
        };
        let state = ChainState::genesis(committee(), GENESIS_TIME, H256::zero()).into_shared();
        let producer = UnitProducer::new(
            state,
            ProducerDependencies {
                signer: Arc::clone(&keystore),
                storage: Arc::clone(&storage),
                broadcaster: publisher,
                config,
            },
        )
        .unwrap()
        .with_time_source(clock);

        Node {
            name,
            producer,
            keystore,
            storage,
            units,
            online: true,
        }
    }

    fn start_network() -> (Vec<Node>, Arc<SharedClock>) {
        let clock = Arc::new(SharedClock(AtomicU64::new(GENESIS_TIME * 1_000)));
        let nodes = (0..NODES).map(|i| start_node(i, Arc::clone(&clock))).collect();
        (nodes, clock)
    }

    /// Give every online node one attempt at the current slot and relay
    /// whatever gets produced. Returns the produced unit, if any.
    async fn run_slot(nodes: &mut [Node]) -> Option<VerifiedUnit> {
        for i in 0..nodes.len() {
            if !nodes[i].online {
                continue;
            }
            let condition = nodes[i].producer.maybe_produce_unit().await.unwrap();
            if let ProductionCondition::Produced { unit_num, .. } = condition {
                let event = nodes[i].units.recv().await.unwrap();
                assert_eq!(event.unit.unit_num, unit_num);
                for (j, node) in nodes.iter().enumerate() {
                    if j != i {
                        node.receive(&event.unit).await;
                    }
                }
                return Some(event.unit);
            }
        }
        None
    }

    fn assert_converged(nodes: &[Node]) {
        let reference = nodes[0].snapshot();
        for node in &nodes[1..] {
            let snapshot = node.snapshot();
            assert_eq!(snapshot.dynamic, reference.dynamic, "{} diverged", node.name);
            assert_eq!(
                snapshot.shuffled_mediators, reference.shuffled_mediators,
                "{} schedule diverged",
                node.name
            );
            assert_eq!(
                snapshot.mediator_stats, reference.mediator_stats,
                "{} statistics diverged",
                node.name
            );
        }
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_nodes_take_turns_and_converge() {
        let (mut nodes, clock) = start_network();
        let mut producers = Vec::new();

        for slot in 1..=9u64 {
            clock.set_secs(GENESIS_TIME + slot * INTERVAL);
            let unit = run_slot(&mut nodes).await.expect("every slot is filled");
            assert_eq!(unit.unit_num, slot);
            producers.push(unit.mediator);
            assert_converged(&nodes);
        }

        // Each round is served by every mediator exactly once
        for round in producers.chunks(NODES) {
            let mut names = round.to_vec();
            names.sort();
            assert_eq!(names, vec!["mediator0", "mediator1", "mediator2"]);
        }

        for node in &nodes {
            assert_eq!(node.storage.unit_count(), 9);
            assert_eq!(node.state().participation_rate(), 1.0);
            assert_eq!(node.state().mediator_stats(&node.name).total_produced, 3);
        }
    }

    #[tokio::test]
    async fn test_offline_mediator_misses_are_recorded_everywhere() {
        let (mut nodes, clock) = start_network();

        // Fill the first round so the schedule is known, then take the
        // owner of the next slot offline.
        for slot in 1..=3u64 {
            clock.set_secs(GENESIS_TIME + slot * INTERVAL);
            run_slot(&mut nodes).await.unwrap();
        }
        let absent = nodes[0].state().scheduled_mediator(1).unwrap();
        let absent_idx = nodes.iter().position(|n| n.name == absent.name).unwrap();
        nodes[absent_idx].online = false;

        clock.set_secs(GENESIS_TIME + 4 * INTERVAL);
        assert!(run_slot(&mut nodes).await.is_none());

        clock.set_secs(GENESIS_TIME + 5 * INTERVAL);
        let unit = run_slot(&mut nodes).await.unwrap();
        assert_eq!(unit.unit_num, 4);

        // The offline node still follows the chain
        nodes[absent_idx].online = true;
        assert_converged(&nodes);

        for node in &nodes {
            let state = node.state();
            assert_eq!(state.mediator_stats(&absent.name).total_missed, 1);
            assert_eq!(state.dynamic_global_property().current_absolute_slot, 5);
            assert!(state.participation_rate() < 1.0);
        }
    }

    #[tokio::test]
    async fn test_unit_signatures_verify_against_mediator_keys() {
        let (mut nodes, clock) = start_network();

        for slot in 1..=3u64 {
            clock.set_secs(GENESIS_TIME + slot * INTERVAL);
            let unit = run_slot(&mut nodes).await.unwrap();

            let producer = nodes.iter().find(|n| n.name == unit.mediator).unwrap();
            let reference = format!("key{}", &unit.mediator["mediator".len()..]);
            assert!(producer
                .keystore
                .verify(&reference, &unit.signing_payload(), &unit.signature));

            // No other node's key verifies the unit
            for other in nodes.iter().filter(|n| n.name != unit.mediator) {
                let other_ref = format!("key{}", &other.name["mediator".len()..]);
                assert!(!other
                    .keystore
                    .verify(&other_ref, &unit.signing_payload(), &unit.signature));
            }
        }
    }

    #[tokio::test]
    async fn test_restart_resumes_from_persisted_tip() {
        let (mut nodes, clock) = start_network();
        for slot in 1..=3u64 {
            clock.set_secs(GENESIS_TIME + slot * INTERVAL);
            run_slot(&mut nodes).await.unwrap();
        }
        // Leave slot 4 empty so the tip carries a missed slot
        let absent = nodes[0].state().scheduled_mediator(1).unwrap();
        clock.set_secs(GENESIS_TIME + 5 * INTERVAL);
        let idx = nodes.iter().position(|n| n.name == absent.name).unwrap();
        nodes[idx].online = false;
        run_slot(&mut nodes).await.unwrap();
        nodes[idx].online = true;

        let node = &nodes[0];
        let tip = node.snapshot();
        node.storage.save_tip(tip.clone());

        let restored = restore_chain_state(&*node.storage, committee(), GENESIS_TIME, H256::zero())
            .await
            .unwrap();

        assert_eq!(restored.dynamic_global_property(), &tip.dynamic);
        assert_eq!(restored.schedule().shuffled_mediators(), &tip.shuffled_mediators[..]);
        assert_eq!(restored.mediator_stats(&absent.name).total_missed, 1);
        assert_eq!(restored.all_mediator_stats(), &tip.mediator_stats);
        assert_eq!(
            restored.scheduled_mediator(1).unwrap(),
            node.state().scheduled_mediator(1).unwrap()
        );
        let head = node.storage.head().unwrap();
        assert_eq!(head.hash(), tip.dynamic.last_unit_hash);
        assert_eq!(node.storage.ancestors(&head.hash()).len(), 4);
    }

    #[tokio::test]
    async fn test_fresh_storage_starts_new_chain() {
        let storage = InMemoryUnitStorage::new();
        let state = restore_chain_state(&storage, committee(), GENESIS_TIME, H256::zero())
            .await
            .unwrap();

        assert_eq!(state.dynamic_global_property().last_unit_num, 0);
        assert_eq!(state.slot_time(1), GENESIS_TIME + INTERVAL);
        assert_eq!(state.schedule().shuffled_mediators().len(), NODES);
    }

    #[tokio::test]
    async fn test_event_serializes_for_the_wire() {
        let (mut nodes, clock) = start_network();
        clock.set_secs(GENESIS_TIME + INTERVAL);
        let unit = run_slot(&mut nodes).await.unwrap();

        let event = UnitProducedEvent::new(unit.clone());
        let json = serde_json::to_string(&event).unwrap();
        let decoded: UnitProducedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.unit, unit);
        assert_eq!(decoded.unit_hash, unit.hash());
        assert_eq!(decoded.sender_id, 17);
    }
}
