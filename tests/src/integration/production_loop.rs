//! # Production Loop Under Paused Time
//!
//! Runs the real per-slot driver against a clock derived from tokio's
//! (paused) timer, so slot sleeps complete instantly and deterministically.

#[cfg(test)]
mod tests {
    use primitive_types::H256;
    use qc_17_mediator_scheduling::{
        BroadcastChannelPublisher, ChainParameters, ChainState, Ed25519KeyStore, GlobalProperty,
        InMemoryUnitStorage, LoopState, Mediator, ProducerDependencies, ProductionLoop,
        SchedulingConfig, SchedulingQuery, TimeSource, UnitProducer,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::Instant;

    const GENESIS_TIME: u64 = 1_700_000_100;
    const INTERVAL: u64 = 3;

    /// Unix clock that advances with tokio's timer. `jump_ms` moves the
    /// wall clock forward without any timer firing, like a stalled process.
    struct TokioClock {
        start: Instant,
        start_millis: u64,
        jump_ms: AtomicU64,
    }

    impl TokioClock {
        fn jump(&self, millis: u64) {
            self.jump_ms.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for TokioClock {
        fn now_millis(&self) -> u64 {
            self.start_millis
                + self.start.elapsed().as_millis() as u64
                + self.jump_ms.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        production_loop: ProductionLoop<Ed25519KeyStore, InMemoryUnitStorage, BroadcastChannelPublisher>,
        publisher: Arc<BroadcastChannelPublisher>,
        storage: Arc<InMemoryUnitStorage>,
        producer: Arc<UnitProducer<Ed25519KeyStore, InMemoryUnitStorage, BroadcastChannelPublisher>>,
        clock: Arc<TokioClock>,
    }

    /// A single node controlling the whole three-mediator committee
    fn fixture() -> Fixture {
        let mediators = (0..3)
            .map(|i| Arc::new(Mediator::new(format!("mediator{i}"), format!("key{i}"))))
            .collect();
        let committee =
            GlobalProperty::new(ChainParameters::new(INTERVAL, 0).unwrap(), mediators).unwrap();
        let state = ChainState::genesis(committee, GENESIS_TIME, H256::zero()).into_shared();

        let mut keystore = Ed25519KeyStore::new();
        for i in 0..3u8 {
            keystore.insert_seed(format!("key{i}"), [i + 1; 32]);
        }
        let storage = Arc::new(InMemoryUnitStorage::with_genesis(H256::zero()));
        let publisher = Arc::new(BroadcastChannelPublisher::new());

        let clock = Arc::new(TokioClock {
            start: Instant::now(),
            start_millis: GENESIS_TIME * 1_000,
            jump_ms: AtomicU64::new(0),
        });
        let producer = Arc::new(
            UnitProducer::new(
                state,
                ProducerDependencies {
                    signer: Arc::new(keystore),
                    storage: Arc::clone(&storage),
                    broadcaster: Arc::clone(&publisher),
                    config: SchedulingConfig {
                        chain: ChainParameters::new(INTERVAL, 0).unwrap(),
                        local_mediators: (0..3).map(|i| format!("mediator{i}")).collect(),
                        enable_stale_production: true,
                        ..SchedulingConfig::default()
                    },
                },
            )
            .unwrap()
            .with_time_source(Arc::clone(&clock) as Arc<dyn TimeSource>),
        );

        Fixture {
            production_loop: ProductionLoop::new(Arc::clone(&producer)),
            publisher,
            storage,
            producer,
            clock,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_produces_every_slot_until_shutdown() {
        let Fixture {
            production_loop,
            publisher,
            storage,
            producer,
            ..
        } = fixture();
        let mut units = publisher.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        assert_eq!(production_loop.time_to_next_slot(), Duration::from_secs(INTERVAL));

        let loop_state = production_loop.state_handle();
        let handle = tokio::spawn(async move { production_loop.run(shutdown_rx).await });

        for expected in 1..=4u64 {
            let event = units.recv().await.unwrap();
            assert_eq!(event.unit.unit_num, expected);
            assert_eq!(event.unit.timestamp, GENESIS_TIME + expected * INTERVAL);
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(*loop_state.read(), LoopState::Idle);
        assert_eq!(storage.unit_count(), 4);
        assert_eq!(producer.metrics().get_units_produced(), 4);
        assert_eq!(producer.metrics().get_avg_missed_per_unit(), 0.0);
        assert_eq!(producer.state().participation_rate(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_slot() {
        let Fixture {
            production_loop,
            storage,
            ..
        } = fixture();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let result = production_loop.run(shutdown_rx).await;
            (result, production_loop.loop_state())
        });

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        shutdown_tx.send(true).unwrap();

        let (result, final_state) = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(final_state, LoopState::Idle);
        assert_eq!(storage.unit_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_wake_waits_for_following_slot() {
        let Fixture {
            production_loop,
            clock,
            ..
        } = fixture();

        // One second into slot 1: the loop must not try to catch up on it
        clock.jump(4_000);
        assert_eq!(production_loop.time_to_next_slot(), Duration::from_secs(2));

        clock.jump(1_500);
        assert_eq!(production_loop.time_to_next_slot(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_wake_skips_slot_and_records_miss() {
        let Fixture {
            production_loop,
            publisher,
            storage,
            producer,
            clock,
        } = fixture();
        let mut units = publisher.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { production_loop.run(shutdown_rx).await });

        let first = units.recv().await.unwrap().unit;
        assert_eq!(first.timestamp, GENESIS_TIME + INTERVAL);
        let skipped = producer.state().scheduled_mediator(1).unwrap();

        // The loop is asleep until the next boundary; it will wake a second late
        clock.jump(1_000);

        let second = units.recv().await.unwrap().unit;
        assert_eq!(second.unit_num, 2);
        assert_eq!(second.timestamp, GENESIS_TIME + 3 * INTERVAL);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let state = producer.state();
        assert_eq!(producer.metrics().lag_events.load(Ordering::Relaxed), 1);
        assert_eq!(state.dynamic_global_property().current_absolute_slot, 3);
        assert_eq!(state.mediator_stats(&skipped.name).total_missed, 1);
        assert!(state.participation_rate() < 1.0);
        assert_eq!(storage.unit_count(), 2);
    }
}
