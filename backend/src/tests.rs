#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use tokio::time::timeout;
    use crate::{
        build_rocket,
        config::{ServerConfig, StoreKind},
        hub::{Hub, HubConfig},
        locks::LockRegistry,
        processor::PollProcessor,
        store::{MemoryStore, PollStore, StoreError},
    };
    use shared::{models::*, PollError};

    fn option(id: &str) -> PollOption {
        PollOption::new(id, format!("Restaurant {}", &id[1..]), format!("Address {}", &id[1..]))
    }

    fn sample_poll() -> Poll {
        let mut poll = Poll::new("test", vec![option("r1"), option("r2")]);
        poll.votes.insert("r1".into(), vec!["Jack".into(), "Tom".into()]);
        poll.votes.insert("r2".into(), vec!["Will".into(), "TJ".into()]);
        poll
    }

    fn vote(user: &str, option_id: &str) -> VoteRequest {
        VoteRequest { user: user.into(), option_id: option_id.into() }
    }

    /// Wraps a store and yields between steps so unsynchronized
    /// read-modify-write cycles would interleave.
    struct YieldingStore {
        inner: MemoryStore,
        fail_saves: AtomicBool,
        unreachable: AtomicBool,
    }

    impl YieldingStore {
        fn new(inner: MemoryStore) -> Self {
            Self { inner, fail_saves: AtomicBool::new(false), unreachable: AtomicBool::new(false) }
        }

        fn check_reachable(&self) -> Result<(), StoreError> {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(StoreError::Database("connection refused".into()));
            }
            Ok(())
        }
    }

    #[rocket::async_trait]
    impl PollStore for YieldingStore {
        async fn get_poll(&self, id: &str) -> Result<Poll, StoreError> {
            self.check_reachable()?;
            let poll = self.inner.get_poll(id).await;
            tokio::task::yield_now().await;
            poll
        }

        async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError> {
            tokio::task::yield_now().await;
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::Database("write rejected".into()));
            }
            self.inner.save_poll(poll).await
        }

        async fn create_poll(&self, options: Vec<PollOption>) -> Result<Poll, StoreError> {
            self.check_reachable()?;
            self.inner.create_poll(options).await
        }

        async fn delete_poll(&self, id: &str) -> Result<(), StoreError> {
            self.check_reachable()?;
            self.inner.delete_poll(id).await
        }

        async fn close(&self) -> Result<(), StoreError> {
            self.inner.close().await
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn processor_with(store: Arc<dyn PollStore>) -> PollProcessor {
        init_tracing();
        PollProcessor::new(store, LockRegistry::new(), Hub::spawn(HubConfig::default()))
    }

    #[tokio::test]
    async fn test_vote_scenario() {
        let processor = processor_with(Arc::new(MemoryStore::with_polls([sample_poll()])));
        let poll = processor.add_vote("test", &vote("Will", "r1")).await.unwrap();

        assert_eq!(poll.votes["r1"], vec!["Jack", "Tom", "Will"]);
        assert_eq!(poll.votes["r2"], vec!["TJ"]);
        assert_eq!(processor.get_poll("test").await.unwrap(), poll);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_are_not_lost() {
        let store = Arc::new(YieldingStore::new(MemoryStore::with_polls([sample_poll()])));
        let processor = Arc::new(processor_with(store));
        let voters: Vec<String> = (0..64).map(|n| format!("voter{}", n)).collect();

        let tasks: Vec<_> = voters
            .iter()
            .enumerate()
            .map(|(n, voter)| {
                let processor = Arc::clone(&processor);
                let request = vote(voter, if n % 2 == 0 { "r1" } else { "r2" });
                tokio::spawn(async move { processor.add_vote("test", &request).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let poll = processor.get_poll("test").await.unwrap();
        assert_eq!(poll.total_votes(), 4 + voters.len());
        let recorded: HashSet<&String> = poll.votes.values().flatten().collect();
        assert_eq!(recorded.len(), poll.total_votes());
        assert!(voters.iter().all(|v| recorded.contains(v)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_subscribers_end_on_the_committed_state() {
        let store = Arc::new(YieldingStore::new(MemoryStore::with_polls([sample_poll()])));
        let processor = Arc::new(processor_with(store));
        let mut sub = processor.hub().register("test").await.unwrap();
        let mut last_total = sample_poll().total_votes();

        for round in 0..50 {
            let tasks: Vec<_> = (0..32)
                .map(|n| {
                    let processor = Arc::clone(&processor);
                    let request = vote(&format!("voter{}-{}", round, n), if n % 2 == 0 { "r1" } else { "r2" });
                    tokio::spawn(async move { processor.add_vote("test", &request).await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            // Every publish is in the mailbox by now; a count round trip waits them out.
            processor.hub().subscriber_count("test").await.unwrap();
            let mut last = None;
            while let Ok(payload) = sub.queue.try_recv() {
                let received: Poll = serde_json::from_str(&payload).unwrap();
                assert_eq!(received.total_votes(), last_total + 1, "update delivered out of commit order");
                last_total = received.total_votes();
                last = Some(received);
            }

            assert_eq!(last, Some(processor.get_poll("test").await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_missing_poll_is_not_found() {
        let processor = processor_with(Arc::new(MemoryStore::new()));
        let err = processor.add_vote("unknown", &vote("Jack", "r1")).await.unwrap_err();
        assert!(matches!(err, PollError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_store_failures_release_the_lock() {
        let store = Arc::new(YieldingStore::new(MemoryStore::with_polls([sample_poll()])));
        let processor = processor_with(store.clone());

        store.unreachable.store(true, Ordering::SeqCst);
        let err = processor.add_vote("test", &vote("Ann", "r1")).await.unwrap_err();
        assert!(matches!(err, PollError::StoreUnavailable(_)));

        store.unreachable.store(false, Ordering::SeqCst);
        store.fail_saves.store(true, Ordering::SeqCst);
        let err = processor.add_vote("test", &vote("Ann", "r1")).await.unwrap_err();
        assert!(matches!(err, PollError::StoreUnavailable(_)));

        store.fail_saves.store(false, Ordering::SeqCst);
        let next = timeout(Duration::from_secs(1), processor.add_vote("test", &vote("Ann", "r1"))).await;
        assert!(next.expect("lock was leaked").is_ok());
    }

    #[tokio::test]
    async fn test_failed_edit_writes_nothing_and_publishes_nothing() {
        let processor = processor_with(Arc::new(MemoryStore::with_polls([sample_poll()])));
        let mut sub = processor.hub().register("test").await.unwrap();

        let err = processor.add_vote("test", &vote("Jack", "r9")).await.unwrap_err();
        assert!(matches!(err, PollError::NotFound(_)));
        assert_eq!(processor.get_poll("test").await.unwrap(), sample_poll());

        processor.hub().subscriber_count("test").await.unwrap();
        assert!(sub.queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_committed_edits_are_broadcast() {
        let processor = processor_with(Arc::new(MemoryStore::with_polls([sample_poll()])));
        let mut sub = processor.hub().register("test").await.unwrap();

        let updated = processor.clear_votes_for("test", "Tom").await.unwrap();
        let payload = timeout(Duration::from_secs(1), sub.queue.recv()).await.unwrap().unwrap();
        let received: Poll = serde_json::from_str(&payload).unwrap();
        assert_eq!(received, updated);
        assert_eq!(received.votes["r1"], vec!["Jack"]);
    }

    #[tokio::test]
    async fn test_remove_unknown_option_is_identity() {
        let processor = processor_with(Arc::new(MemoryStore::with_polls([sample_poll()])));
        let poll = processor.remove_option("test", "r9").await.unwrap();
        assert_eq!(poll.options, sample_poll().options);
        assert_eq!(poll.votes, sample_poll().votes);

        let poll = processor.remove_option("test", "r1").await.unwrap();
        assert_eq!(poll.options, vec![option("r2")]);
        assert!(!poll.votes.contains_key("r1"));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let processor = processor_with(Arc::new(MemoryStore::new()));
        let created = processor.create_poll(vec![option("r1"), option("r2")]).await.unwrap();
        let fetched = processor.get_poll(&created.id).await.unwrap();

        assert_eq!(fetched.options, vec![option("r1"), option("r2")]);
        assert!(fetched.votes.is_empty());

        let err = processor.create_poll(Vec::new()).await.unwrap_err();
        assert!(matches!(err, PollError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let processor = processor_with(Arc::new(MemoryStore::with_polls([sample_poll()])));

        let mut replacement = sample_poll();
        replacement.options.push(option("r3"));
        replacement.votes.insert("r3".into(), vec!["Ann".into()]);
        assert_eq!(processor.replace_poll(replacement.clone()).await.unwrap(), replacement);

        let mut unknown = sample_poll();
        unknown.id = "elsewhere".into();
        assert!(matches!(processor.replace_poll(unknown).await, Err(PollError::NotFound(_))));

        processor.delete_poll("test").await.unwrap();
        assert!(matches!(processor.get_poll("test").await, Err(PollError::NotFound(_))));
        assert!(matches!(processor.delete_poll("test").await, Err(PollError::NotFound(_))));
    }

    #[test]
    fn test_config_lookup() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.store, StoreKind::Document);
        assert_eq!(config.allowed_origin, "*");

        let config = ServerConfig::from_lookup(|key| match key {
            "POLL_STORE" => Some("memory".into()),
            "SUBSCRIBER_QUEUE_CAPACITY" => Some("8".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.hub.queue_capacity, 8);

        assert!(ServerConfig::from_lookup(|key| (key == "POLL_STORE").then(|| "redis".into())).is_err());
        assert!(ServerConfig::from_lookup(|key| (key == "HUB_MAILBOX_CAPACITY").then(|| "0".into())).is_err());
    }

    async fn client() -> Client {
        init_tracing();
        let config = ServerConfig { store: StoreKind::Memory, ..Default::default() };
        let store = Arc::new(MemoryStore::with_polls([sample_poll()]));
        Client::tracked(build_rocket(&config, store)).await.unwrap()
    }

    #[rocket::async_test]
    async fn test_get_poll_route() {
        let client = client().await;

        let response = client.get("/api/poll?id=test").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<Poll>().await.unwrap(), sample_poll());

        assert_eq!(client.get("/api/poll").dispatch().await.status(), Status::BadRequest);
        assert_eq!(client.get("/api/poll?id=").dispatch().await.status(), Status::BadRequest);
        assert_eq!(client.get("/api/poll?id=unknown").dispatch().await.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_create_and_vote_routes() {
        let client = client().await;

        let response = client
            .put("/api/poll")
            .header(ContentType::JSON)
            .body(r#"[{"id":"r1","name":"Restaurant 1","address":"Address 1"},{"id":"r2","name":"Restaurant 2","address":"Address 2"}]"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created = response.into_json::<Poll>().await.unwrap();

        let response = client
            .post(format!("/api/vote?id={}", created.id))
            .header(ContentType::JSON)
            .body(r#"{"user":"Jack","restaurant_ID":"r2"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Accepted);
        let poll = response.into_json::<Poll>().await.unwrap();
        assert_eq!(poll.votes["r2"], vec!["Jack"]);

        let response = client
            .delete(format!("/api/vote?id={}&user=Jack", created.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Accepted);
        assert_eq!(response.into_json::<Poll>().await.unwrap().total_votes(), 0);
    }

    #[rocket::async_test]
    async fn test_bad_bodies_are_rejected() {
        let client = client().await;

        let response = client.put("/api/poll").header(ContentType::JSON).body("[]").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client.put("/api/poll").header(ContentType::JSON).body("not json").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/api/vote?id=test")
            .header(ContentType::JSON)
            .body(r#"{"user":"Jack"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/api/vote?id=test")
            .header(ContentType::JSON)
            .body(r#"{"user":"Jack","restaurant_ID":"r9"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_option_and_delete_routes() {
        let client = client().await;

        let response = client
            .post("/api/option?id=test")
            .header(ContentType::JSON)
            .body(r#"{"id":"r3","name":"Restaurant 3","address":"Address 3"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Accepted);
        assert_eq!(response.into_json::<Poll>().await.unwrap().options.len(), 3);

        let response = client.delete("/api/option?id=test&option=r1").dispatch().await;
        assert_eq!(response.status(), Status::Accepted);
        let poll = response.into_json::<Poll>().await.unwrap();
        assert!(!poll.has_option("r1"));
        assert!(!poll.votes.contains_key("r1"));

        assert_eq!(client.delete("/api/poll?id=test").dispatch().await.status(), Status::NoContent);
        assert_eq!(client.delete("/api/poll?id=test").dispatch().await.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_cors_headers() {
        let client = client().await;
        let response = client.options("/api/poll").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("*"));
    }
}
