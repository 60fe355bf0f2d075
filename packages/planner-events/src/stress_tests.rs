//! Stress tests designed to break event coalescing.
//!
//! Random but valid event sequences are replayed against a model of a UI
//! observer, once raw and once coalesced. Both replays must end with the same
//! rows and the same selection.

#[cfg(test)]
mod stress_tests {
    use tokio::sync::broadcast::error::RecvError;
    use tracing_subscriber::EnvFilter;

    use crate::buffer::{EventBuffer, PlannerEventBuffer};
    use crate::coalesce::coalesce;
    use crate::config::PlannerConfig;
    use crate::event::{PlannerEvent, PlannerEventType};
    use crate::planner::Planner;
    use crate::resource::{Resource, ResourceCell, ResourceId};
    use crate::testing::{drain_notifications, test_resources, with_text, TestResource};

    const POOL_SIZE: u32 = 8;
    const SEEDS: u64 = 500;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    // ==========================================================================
    // Observer Model
    // ==========================================================================

    /// Rows and selection as a table-like observer would render them.
    ///
    /// A deleted row leaves the selection; a selection may only name rows the
    /// observer currently shows.
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Observer {
        rows: Vec<(ResourceId, String)>,
        selected: Vec<ResourceId>,
    }

    impl Observer {
        fn from_planner(planner: &Planner<u32, u32>) -> Self {
            Self {
                rows: planner
                    .resources()
                    .iter()
                    .map(|r| (r.id(), text_of(r)))
                    .collect(),
                selected: planner.selected_resources().iter().map(|r| r.id()).collect(),
            }
        }

        fn apply(&mut self, event: &PlannerEvent<TestResource>) {
            match event.event_type() {
                PlannerEventType::AllResourcesDeleted => {
                    self.rows.clear();
                    self.selected.clear();
                }
                PlannerEventType::ResourcesInserted => {
                    for resource in event.resources() {
                        assert!(
                            !self.rows.iter().any(|(id, _)| *id == resource.id()),
                            "{} inserted twice",
                            resource.id()
                        );
                        self.rows.push((resource.id(), text_of(resource)));
                    }
                }
                PlannerEventType::ResourcesUpdated => {
                    for resource in event.resources() {
                        let row = self
                            .rows
                            .iter_mut()
                            .find(|(id, _)| *id == resource.id())
                            .unwrap_or_else(|| panic!("update of unknown {}", resource.id()));
                        row.1 = text_of(resource);
                    }
                }
                PlannerEventType::ResourcesDeleted => {
                    let ids = event.resource_ids();
                    self.rows.retain(|(id, _)| !ids.contains(id));
                    self.selected.retain(|id| !ids.contains(id));
                }
                PlannerEventType::ResourcesSelected => {
                    let ids = event.resource_ids();
                    for id in &ids {
                        assert!(
                            self.rows.iter().any(|(row, _)| row == id),
                            "selection of {id}, which is not shown"
                        );
                    }
                    self.selected = ids;
                }
            }
        }

        fn replay(mut self, events: &[PlannerEvent<TestResource>]) -> Self {
            for event in events {
                self.apply(event);
            }
            self
        }
    }

    fn text_of(resource: &TestResource) -> String {
        resource.cell().text.clone().unwrap_or_default()
    }

    // ==========================================================================
    // Sequence Generator
    // ==========================================================================

    /// Shuffled, non-empty prefix of `candidates` (at most three entries).
    fn some_of(rng: &mut fastrand::Rng, candidates: &[usize]) -> Vec<usize> {
        let mut picked = candidates.to_vec();
        rng.shuffle(&mut picked);
        picked.truncate(rng.usize(1..=picked.len().min(3)));
        picked
    }

    /// A random sequence that is valid for an observer starting with the
    /// resources in `visible`: only hidden resources are inserted, only
    /// visible ones are updated, deleted or selected.
    fn random_sequence(
        rng: &mut fastrand::Rng,
        pool: &[TestResource],
        visible: &mut Vec<usize>,
        len: usize,
    ) -> Vec<PlannerEvent<TestResource>> {
        let mut events = Vec::with_capacity(len);
        let mut attempts = 0;

        while events.len() < len && attempts < len * 10 {
            attempts += 1;
            let step = events.len();
            let hidden: Vec<usize> = (0..pool.len()).filter(|i| !visible.contains(i)).collect();

            match rng.u8(0..100) {
                0..=4 => {
                    visible.clear();
                    events.push(PlannerEvent::all_deleted());
                }
                5..=34 if !hidden.is_empty() => {
                    let picked = some_of(rng, &hidden);
                    let snapshots = picked
                        .iter()
                        .map(|&i| with_text(&pool[i], &format!("s{step}-{i}")))
                        .collect();
                    visible.extend(picked);
                    events.push(PlannerEvent::inserted(snapshots).unwrap());
                }
                35..=64 if !visible.is_empty() => {
                    let picked = some_of(rng, &visible[..]);
                    let snapshots = picked
                        .iter()
                        .map(|&i| with_text(&pool[i], &format!("s{step}-{i}")))
                        .collect();
                    events.push(PlannerEvent::updated(snapshots).unwrap());
                }
                65..=89 if !visible.is_empty() => {
                    let picked = some_of(rng, &visible[..]);
                    visible.retain(|i| !picked.contains(i));
                    let snapshots = picked.iter().map(|&i| pool[i].clone()).collect();
                    events.push(PlannerEvent::deleted(snapshots).unwrap());
                }
                90..=99 => {
                    // Deselect-all now and then, a subset of the shown rows otherwise.
                    let picked = if visible.is_empty() || rng.u8(0..5) == 0 {
                        Vec::new()
                    } else {
                        some_of(rng, &visible[..])
                    };
                    let snapshots = picked.iter().map(|&i| pool[i].clone()).collect();
                    events.push(PlannerEvent::selected(snapshots).unwrap());
                }
                _ => {}
            }
        }
        events
    }

    struct Scenario {
        initial: Observer,
        raw: Vec<PlannerEvent<TestResource>>,
        coalesced: Vec<PlannerEvent<TestResource>>,
    }

    fn scenario(seed: u64) -> Scenario {
        let mut rng = fastrand::Rng::with_seed(seed);
        let pool = test_resources(POOL_SIZE);

        let mut visible: Vec<usize> = (0..pool.len()).filter(|_| rng.bool()).collect();
        let initial = Observer {
            rows: visible
                .iter()
                .map(|&i| (pool[i].id(), text_of(&pool[i])))
                .collect(),
            selected: visible
                .iter()
                .filter(|_| rng.bool())
                .map(|&i| pool[i].id())
                .collect(),
        };

        let len = rng.usize(1..40);
        let raw = random_sequence(&mut rng, &pool, &mut visible, len);

        let mut buffer: PlannerEventBuffer<TestResource> = PlannerEventBuffer::new();
        for event in raw.iter().cloned() {
            buffer.add(event);
        }
        let coalesced = buffer.consume_and_coalesce_events();

        Scenario {
            initial,
            raw,
            coalesced,
        }
    }

    fn shape(events: &[PlannerEvent<TestResource>]) -> Vec<(PlannerEventType, Vec<ResourceId>)> {
        events
            .iter()
            .map(|e| (e.event_type(), e.resource_ids()))
            .collect()
    }

    // ==========================================================================
    // STRESS TEST 1: Coalesced replay ends in the same observer state
    // ==========================================================================

    #[test]
    fn test_random_sequences_preserve_observer_state() {
        init_tracing();

        for seed in 0..SEEDS {
            let s = scenario(seed);
            let expected = s.initial.clone().replay(&s.raw);
            let actual = s.initial.clone().replay(&s.coalesced);

            assert_eq!(
                actual,
                expected,
                "seed {seed}: raw {:?} coalesced {:?}",
                shape(&s.raw),
                shape(&s.coalesced)
            );
        }
    }

    // ==========================================================================
    // STRESS TEST 2: Coalesced output is minimal in structure
    // ==========================================================================

    #[test]
    fn test_random_sequences_are_minimal() {
        for seed in 0..SEEDS {
            let s = scenario(seed);
            let events = &s.coalesced;

            assert!(
                events.len() <= s.raw.len(),
                "seed {seed}: output grew from {} to {}",
                s.raw.len(),
                events.len()
            );

            for event in events {
                assert!(
                    event.event_type() == PlannerEventType::AllResourcesDeleted
                        || event.event_type() == PlannerEventType::ResourcesSelected
                        || event.resource_count() > 0,
                    "seed {seed}: empty {} survived",
                    event.event_type()
                );
            }

            for pair in events.windows(2) {
                assert_ne!(
                    pair[0].event_type(),
                    pair[1].event_type(),
                    "seed {seed}: adjacent events not merged in {:?}",
                    shape(events)
                );
            }

            let selections = events
                .iter()
                .filter(|e| e.event_type() == PlannerEventType::ResourcesSelected)
                .count();
            assert!(
                selections <= 1,
                "seed {seed}: {selections} selections survived in {:?}",
                shape(events)
            );

            let resets: Vec<usize> = events
                .iter()
                .enumerate()
                .filter(|(_, e)| e.event_type() == PlannerEventType::AllResourcesDeleted)
                .map(|(i, _)| i)
                .collect();
            assert!(
                resets.is_empty() || resets == vec![0],
                "seed {seed}: all-deleted marker not leading in {:?}",
                shape(events)
            );
        }
    }

    // ==========================================================================
    // STRESS TEST 3: Coalescing twice changes nothing
    // ==========================================================================

    #[test]
    fn test_coalescing_is_idempotent() {
        for seed in 0..SEEDS {
            let s = scenario(seed);
            let once = shape(&s.coalesced);
            let twice = shape(&coalesce(s.coalesced));

            assert_eq!(once, twice, "seed {seed}");
        }
    }

    // ==========================================================================
    // STRESS TEST 4: Large backlog collapses to one event per resource
    // ==========================================================================

    #[test]
    fn test_large_backlog_collapses() {
        let config = PlannerConfig {
            backlog_warn_threshold: 100,
            ..PlannerConfig::default()
        };
        let mut planner: Planner<u32, u32> = Planner::with_config(&config);
        let resources = test_resources(10);
        planner.add_resources(resources.clone()).unwrap();
        let mut receiver = planner.subscribe();

        planner.batch(|p| {
            for i in 0..20_000 {
                let snapshot = with_text(&resources[i % 10], &format!("v{i}"));
                p.update_resource(snapshot).unwrap();
            }
            assert_eq!(p.buffered_event_count(), 20_000);
        });

        let notifications = drain_notifications(&mut receiver);
        assert_eq!(notifications.len(), 1);

        let events = notifications[0].events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), PlannerEventType::ResourcesUpdated);
        assert_eq!(events[0].resource_count(), 10);
        assert_eq!(
            events[0].resources()[3].cell().text.as_deref(),
            Some("v19993")
        );
        assert_eq!(planner.buffered_event_count(), 0);
    }

    // ==========================================================================
    // STRESS TEST 5: Subscribers mirror the planner across many batches
    // ==========================================================================

    const ROUNDS: usize = 300;
    const MIRRORS: usize = 4;

    fn random_planner_op(
        rng: &mut fastrand::Rng,
        planner: &mut Planner<u32, u32>,
        next_key: &mut u32,
        round: usize,
    ) {
        let mut fresh = |rng: &mut fastrand::Rng| -> Vec<TestResource> {
            (0..rng.usize(1..4))
                .map(|_| {
                    *next_key += 1;
                    Resource::new(*next_key, ResourceCell::new(format!("r{next_key}")))
                })
                .collect()
        };

        let existing: Vec<usize> = (0..planner.resource_count()).collect();
        match rng.u8(0..100) {
            0..=2 => planner.delete_all_resources(),
            3..=5 => planner.replace_resources(fresh(rng)).unwrap(),
            6..=45 => planner.add_resources(fresh(rng)).unwrap(),
            46..=75 if !existing.is_empty() => {
                let snapshots = some_of(rng, &existing)
                    .into_iter()
                    .map(|i| with_text(&planner.resources()[i], &format!("round{round}")))
                    .collect();
                planner.update_resources(snapshots).unwrap();
            }
            76..=99 if !existing.is_empty() => {
                let ids: Vec<ResourceId> = some_of(rng, &existing)
                    .into_iter()
                    .map(|i| planner.resources()[i].id())
                    .collect();
                planner.delete_resources(&ids);
                if rng.bool() {
                    planner.select_resources(&ids);
                }
            }
            _ => {
                let ids: Vec<ResourceId> = planner.resources().iter().map(Resource::id).collect();
                planner.select_resources(&ids);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribers_mirror_planner_state() {
        init_tracing();

        let config = PlannerConfig {
            bus_capacity: ROUNDS * 2,
            ..PlannerConfig::default()
        };
        let mut planner: Planner<u32, u32> = Planner::with_config(&config);

        let mirrors: Vec<_> = (0..MIRRORS)
            .map(|_| {
                let mut receiver = planner.subscribe();
                tokio::spawn(async move {
                    let mut observer = Observer::default();
                    let mut notifications = 0usize;
                    loop {
                        match receiver.recv().await {
                            Ok(notification) => {
                                notifications += 1;
                                for event in notification.events() {
                                    observer.apply(event);
                                }
                            }
                            Err(RecvError::Closed) => break,
                            Err(RecvError::Lagged(missed)) => panic!("mirror lagged by {missed}"),
                        }
                    }
                    (observer, notifications)
                })
            })
            .collect();

        let mut rng = fastrand::Rng::with_seed(7);
        let mut next_key = 0u32;
        for round in 0..ROUNDS {
            let ops = rng.usize(1..6);
            let nested = rng.bool();
            planner.batch(|p| {
                for _ in 0..ops {
                    random_planner_op(&mut rng, p, &mut next_key, round);
                    if nested {
                        p.batch(|p| random_planner_op(&mut rng, p, &mut next_key, round));
                    }
                }
            });
            assert!(!planner.is_planner_changing());
        }

        let expected = Observer::from_planner(&planner);
        // Dropping the planner drops the bus sender and closes every receiver.
        drop(planner);

        for mirror in mirrors {
            let (observer, notifications) = mirror.await.unwrap();
            assert_eq!(observer, expected);
            assert!(
                notifications <= ROUNDS,
                "one batch per round at most, got {notifications}"
            );
        }
    }

    // ==========================================================================
    // STRESS TEST 6: Uncoalesced batches reach the same state
    // ==========================================================================

    #[test]
    fn test_uncoalesced_planner_matches_coalesced() {
        let mut states = Vec::new();

        for coalesce_events in [true, false] {
            let config = PlannerConfig {
                coalesce_events,
                ..PlannerConfig::default()
            };
            let mut planner: Planner<u32, u32> = Planner::with_config(&config);
            let mut receiver = planner.subscribe();
            let mut observer = Observer::default();
            let mut rng = fastrand::Rng::with_seed(42);
            let mut next_key = 0u32;

            for round in 0..50 {
                planner.batch(|p| {
                    for _ in 0..8 {
                        random_planner_op(&mut rng, p, &mut next_key, round);
                    }
                });
                for notification in drain_notifications(&mut receiver) {
                    for event in notification.events() {
                        observer.apply(event);
                    }
                }
            }

            assert_eq!(observer, Observer::from_planner(&planner));
            states.push(
                observer
                    .rows
                    .into_iter()
                    .map(|(_, text)| text)
                    .collect::<Vec<_>>(),
            );
        }

        assert_eq!(states[0], states[1]);
    }
}
