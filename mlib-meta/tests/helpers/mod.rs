//! Shared fakes for mlib-meta integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mlib_common::events::EventBus;
use mlib_meta::inherited::AncestorInfo;
use mlib_meta::persistence::{
    AncestorProvider, ItemRepository, MetadataProvider, ProviderResult, UpdateReason,
};
use mlib_meta::probe::{FileProbe, ProbeError};
use mlib_meta::{Item, ItemKind, MetaError, MetadataService, RefreshDecision, Result, SourceType};

/// In-memory repository recording every save
#[derive(Default)]
pub struct MemoryRepository {
    items: Mutex<HashMap<Uuid, Item>>,
    saves: Mutex<Vec<(Uuid, UpdateReason)>>,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saves(&self) -> Vec<(Uuid, UpdateReason)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn stored(&self, id: Uuid) -> Option<Item> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }
}

#[async_trait]
impl ItemRepository for MemoryRepository {
    async fn update_to_repository(
        &self,
        item: &Item,
        reason: UpdateReason,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MetaError::Cancelled);
        }
        self.items.lock().unwrap().insert(item.id, item.clone());
        self.saves.lock().unwrap().push((item.id, reason));
        Ok(())
    }

    async fn load_item(&self, id: Uuid) -> Result<Option<Item>> {
        Ok(self.stored(id))
    }

    async fn load_all(&self) -> Result<Vec<Item>> {
        Ok(self.items.lock().unwrap().values().cloned().collect())
    }

    async fn delete_item(&self, id: Uuid) -> Result<bool> {
        Ok(self.items.lock().unwrap().remove(&id).is_some())
    }
}

#[async_trait]
impl AncestorProvider for MemoryRepository {
    async fn ancestors(&self, item: &Item) -> Result<Vec<AncestorInfo>> {
        let items = self.items.lock().unwrap();
        let mut chain = Vec::new();
        let mut next = item.parent_id;
        while let Some(id) = next {
            let Some(parent) = items.get(&id) else { break };
            chain.push(AncestorInfo::from_item(parent));
            next = parent.parent_id;
        }
        Ok(chain)
    }
}

/// Probe answering from a fixed set of missing paths
#[derive(Default)]
pub struct SetProbe {
    missing: HashSet<PathBuf>,
    failing: HashSet<PathBuf>,
}

impl SetProbe {
    pub fn missing(paths: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: paths.iter().map(PathBuf::from).collect(),
            failing: HashSet::new(),
        })
    }

    pub fn failing(paths: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: HashSet::new(),
            failing: paths.iter().map(PathBuf::from).collect(),
        })
    }
}

#[async_trait]
impl FileProbe for SetProbe {
    async fn exists(&self, path: &Path) -> std::result::Result<bool, ProbeError> {
        if self.failing.contains(path) {
            return Err(ProbeError::Unavailable("network share offline".to_string()));
        }
        Ok(!self.missing.contains(path))
    }
}

/// Provider returning a fixed result after an optional delay
///
/// Tracks how many fetches run at once, overall and per item.
pub struct StaticProvider {
    result: Option<ProviderResult>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    per_item: Mutex<HashMap<Uuid, usize>>,
    max_per_item: AtomicUsize,
}

impl StaticProvider {
    pub fn new(result: Option<ProviderResult>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            per_item: Mutex::new(HashMap::new()),
            max_per_item: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_per_item(&self) -> usize {
        self.max_per_item.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for StaticProvider {
    async fn fetch(
        &self,
        item: &Item,
        _decision: &RefreshDecision,
        _cancel: &CancellationToken,
    ) -> Result<Option<ProviderResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut per_item = self.per_item.lock().unwrap();
            let count = per_item.entry(item.id).or_insert(0);
            *count += 1;
            self.max_per_item.fetch_max(*count, Ordering::SeqCst);
        }

        tokio::time::sleep(self.delay).await;

        *self.per_item.lock().unwrap().entry(item.id).or_insert(1) -= 1;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Provider that never answers
pub struct PendingProvider;

#[async_trait]
impl MetadataProvider for PendingProvider {
    async fn fetch(
        &self,
        _item: &Item,
        _decision: &RefreshDecision,
        _cancel: &CancellationToken,
    ) -> Result<Option<ProviderResult>> {
        std::future::pending().await
    }
}

/// Provider that always fails
pub struct FailingProvider;

#[async_trait]
impl MetadataProvider for FailingProvider {
    async fn fetch(
        &self,
        _item: &Item,
        _decision: &RefreshDecision,
        _cancel: &CancellationToken,
    ) -> Result<Option<ProviderResult>> {
        Err(MetaError::Provider("upstream returned 503".to_string()))
    }
}

pub fn service(repository: Arc<MemoryRepository>, probe: Arc<dyn FileProbe>) -> MetadataService {
    MetadataService::new(repository.clone(), repository, probe, EventBus::new(100))
}

/// Library movie that does not require refresh on its own
pub fn settled_movie(name: &str) -> Item {
    Item::new(
        ItemKind::movie(),
        name,
        Some(PathBuf::from(format!("/media/movies/{}/{}.mkv", name, name))),
        SourceType::Library,
    )
    .with_provider_id("tmdb", name)
}
