#![allow(dead_code)]

use routeguide::chat::NoteRouter;
use routeguide::config::ChatConfig;
use routeguide::geo::{Feature, Point};
use routeguide::server::{self, AppState};
use routeguide::service::RouteGuideService;
use routeguide::store::{self, FeatureStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const BERKSHIRE: Point = Point::new(409146138, -746188906);

/// Path of the sample feature database shipped with the crate.
pub fn sample_db_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/route_guide_db.json")
}

/// The shipped sample database as a store.
pub fn sample_store() -> FeatureStore {
    FeatureStore::new(store::load_features(sample_db_path()).unwrap())
}

/// A store with a single feature, "Berkshire Valley".
pub fn berkshire_store() -> FeatureStore {
    FeatureStore::new(vec![Feature::new("Berkshire Valley", BERKSHIRE)])
}

pub fn test_service(store: FeatureStore) -> RouteGuideService {
    RouteGuideService::new(Arc::new(store), Arc::new(NoteRouter::default()))
}

/// Deterministic pseudo-random sequence (LCG) for property-style tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform-ish value in `[lo, hi]`.
    pub fn range(&mut self, lo: i32, hi: i32) -> i32 {
        let span = (hi as i64 - lo as i64 + 1) as u64;
        (lo as i64 + (self.next_u32() as u64 % span) as i64) as i32
    }
}

/// Await `fut` or fail the test after a few seconds.
pub async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

pub struct TestServer {
    pub base_url: String,
    pub stop: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn shutdown(self) {
        self.stop.cancel();
        within(self.handle).await.unwrap().unwrap();
    }
}

/// Serve `store` on an ephemeral localhost port.
pub async fn spawn_server(store: FeatureStore) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = CancellationToken::new();
    let state = AppState::new(store, &ChatConfig::default());
    let handle = tokio::spawn(server::serve_with(
        listener,
        state,
        stop.clone().cancelled_owned(),
    ));
    TestServer {
        base_url: format!("http://{addr}"),
        stop,
        handle,
    }
}
