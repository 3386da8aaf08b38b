//! Integration tests for batch cache-aside loading.
//!
//! The repository and backend doubles record every call so the tests can
//! assert exactly what reached the source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cacheside_core::{
    BatchLoader, CacheError, CacheResult, CancellationToken, Cacheable, DynBackend,
    KeyValueBackend, ListRepository, MemoryBackend, Namespace, NullBackend, RawEntries,
    SourceError, TypedCache, load_cacheable_list,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: String,
    label: String,
}

impl Cacheable for Item {
    const NAMESPACE: &'static str = "item";
}

fn item(id: &str, label: &str) -> Item {
    Item {
        id: id.into(),
        label: label.into(),
    }
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// Source of truth backed by a fixed map, recording every request.
#[derive(Default)]
struct RecordingRepository {
    items: HashMap<String, Item>,
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRepository {
    fn with(items: &[Item]) -> Self {
        Self {
            items: items.iter().map(|i| (i.id.clone(), i.clone())).collect(),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListRepository<Item> for RecordingRepository {
    async fn get_by_id_list(
        &self,
        _ctx: &CancellationToken,
        ids: &[String],
    ) -> Result<HashMap<String, Item>, SourceError> {
        self.calls.lock().unwrap().push(ids.to_vec());
        if self.fail {
            return Err("database unavailable".into());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|i| (id.clone(), i.clone())))
            .collect())
    }
}

/// Backend whose every operation fails.
struct BrokenBackend;

#[async_trait]
impl KeyValueBackend for BrokenBackend {
    async fn get_raw(&self, _ctx: &CancellationToken, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::backend_unavailable("connection refused"))
    }

    async fn set_raw(
        &self,
        _ctx: &CancellationToken,
        _key: &str,
        _value: &str,
        _ttl: Option<Duration>,
    ) -> CacheResult<()> {
        Err(CacheError::backend_unavailable("connection refused"))
    }

    async fn delete_raw(&self, _ctx: &CancellationToken, _key: &str) -> CacheResult<()> {
        Err(CacheError::backend_unavailable("connection refused"))
    }

    async fn multi_get_raw(
        &self,
        _ctx: &CancellationToken,
        _keys: &[String],
    ) -> CacheResult<RawEntries> {
        Err(CacheError::backend_unavailable("connection refused"))
    }

    async fn list_all_keys(&self, _ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        Err(CacheError::backend_unavailable("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

/// Memory backend that counts batched reads and can refuse writes.
#[derive(Default)]
struct CountingBackend {
    inner: MemoryBackend,
    multi_gets: Mutex<usize>,
    reject_writes: bool,
}

#[async_trait]
impl KeyValueBackend for CountingBackend {
    async fn get_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<Option<String>> {
        self.inner.get_raw(ctx, key).await
    }

    async fn set_raw(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        if self.reject_writes {
            return Err(CacheError::backend_unavailable("read-only replica"));
        }
        self.inner.set_raw(ctx, key, value, ttl).await
    }

    async fn delete_raw(&self, ctx: &CancellationToken, key: &str) -> CacheResult<()> {
        self.inner.delete_raw(ctx, key).await
    }

    async fn multi_get_raw(
        &self,
        ctx: &CancellationToken,
        keys: &[String],
    ) -> CacheResult<RawEntries> {
        *self.multi_gets.lock().unwrap() += 1;
        self.inner.multi_get_raw(ctx, keys).await
    }

    async fn list_all_keys(&self, ctx: &CancellationToken) -> CacheResult<Vec<String>> {
        self.inner.list_all_keys(ctx).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

fn memory_cache() -> (MemoryBackend, TypedCache<Item>) {
    let backend = MemoryBackend::new();
    let cache = TypedCache::for_type(Arc::new(backend.clone())).unwrap();
    (backend, cache)
}

async fn seed(cache: &TypedCache<Item>, items: &[Item]) {
    let ctx = CancellationToken::new();
    for i in items {
        cache.set(&ctx, &i.id, i).await.unwrap();
    }
}

#[tokio::test]
async fn test_partial_hit_merges_source_results_and_warms_cache() {
    let (_, cache) = memory_cache();
    seed(&cache, &[item("1", "A")]).await;
    let repo = RecordingRepository::with(&[item("2", "B"), item("3", "C")]);
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1", "2", "3"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(values.len(), 3);
    assert_eq!(values["1"], Some(item("1", "A")));
    assert_eq!(values["2"], Some(item("2", "B")));
    assert_eq!(values["3"], Some(item("3", "C")));
    assert_eq!(repo.calls(), vec![ids(&["2", "3"])]);

    for (id, label) in [("1", "A"), ("2", "B"), ("3", "C")] {
        assert_eq!(cache.get(&ctx, id).await.unwrap(), Some(item(id, label)));
    }
}

#[tokio::test]
async fn test_source_failure_without_hits_is_returned() {
    let (_, cache) = memory_cache();
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let err = load_cacheable_list(&ctx, &ids(&["x"]), &repo, &cache)
        .await
        .unwrap_err();

    assert!(err.is_source());
    assert_eq!(err.to_string(), "Source of truth error: database unavailable");
}

#[tokio::test]
async fn test_source_failure_with_hits_returns_partial_result() {
    let (_, cache) = memory_cache();
    seed(&cache, &[item("a", "val")]).await;
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["a", "b"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values["a"], Some(item("a", "val")));
    assert_eq!(values["b"], None);
    assert_eq!(repo.calls(), vec![ids(&["b"])]);
}

#[tokio::test]
async fn test_partial_failure_is_visible_in_report() {
    let (_, cache) = memory_cache();
    seed(&cache, &[item("a", "val")]).await;
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let report = BatchLoader::new(&cache, &repo)
        .load_detailed(&ctx, &ids(&["a", "b"]))
        .await
        .unwrap();

    assert!(report.is_degraded());
    assert!(report.degraded.as_ref().unwrap().is_source());
    assert_eq!(report.cache_hits, 1);
    assert_eq!(report.source_hits, 0);
    assert_eq!(report.not_found(), 1);
}

#[tokio::test]
async fn test_cache_read_failure_falls_back_to_source() {
    let cache = TypedCache::<Item>::for_type(Arc::new(BrokenBackend)).unwrap();
    let repo = RecordingRepository::with(&[item("p", "X"), item("q", "Y")]);
    let ctx = CancellationToken::new();

    let report = BatchLoader::new(&cache, &repo)
        .load_detailed(&ctx, &ids(&["p", "q"]))
        .await
        .unwrap();

    assert_eq!(report.values["p"], Some(item("p", "X")));
    assert_eq!(report.values["q"], Some(item("q", "Y")));
    assert_eq!(repo.calls(), vec![ids(&["p", "q"])]);
    assert!(report.degraded.unwrap().is_backend_unavailable());
}

#[tokio::test]
async fn test_cache_and_source_both_failing_is_an_error() {
    let cache = TypedCache::<Item>::for_type(Arc::new(BrokenBackend)).unwrap();
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let err = load_cacheable_list(&ctx, &ids(&["p"]), &repo, &cache)
        .await
        .unwrap_err();
    assert!(err.is_source());
}

#[tokio::test]
async fn test_fully_warm_batch_skips_source() {
    let (_, cache) = memory_cache();
    seed(&cache, &[item("1", "A"), item("2", "B")]).await;
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1", "2"]), &repo, &cache)
        .await
        .unwrap();

    assert!(repo.calls().is_empty());
    let expected: HashMap<String, Option<Item>> = [
        ("1".to_string(), Some(item("1", "A"))),
        ("2".to_string(), Some(item("2", "B"))),
    ]
    .into_iter()
    .collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_cold_cache_mirrors_source_with_absent_entries() {
    let (_, cache) = memory_cache();
    let repo = RecordingRepository::with(&[item("1", "A")]);
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1", "missing"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values["1"], Some(item("1", "A")));
    assert_eq!(values["missing"], None);
    assert_eq!(cache.get(&ctx, "missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_source_is_asked_for_exactly_the_uncached_ids() {
    let (_, cache) = memory_cache();
    seed(&cache, &[item("b", "B"), item("d", "D")]).await;
    let repo = RecordingRepository::with(&[item("a", "A"), item("c", "C"), item("e", "E")]);
    let ctx = CancellationToken::new();

    load_cacheable_list(&ctx, &ids(&["a", "b", "c", "d", "e"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(repo.calls(), vec![ids(&["a", "c", "e"])]);
}

#[tokio::test]
async fn test_second_load_is_served_from_warmed_cache() {
    let (_, cache) = memory_cache();
    let repo = RecordingRepository::with(&[item("1", "A"), item("2", "B")]);
    let ctx = CancellationToken::new();
    let request = ids(&["1", "2", "3"]);

    let first = load_cacheable_list(&ctx, &request, &repo, &cache).await.unwrap();
    let second = load_cacheable_list(&ctx, &request, &repo, &cache).await.unwrap();

    assert_eq!(first, second);
    // "3" is unknown to the source and stays uncached, so it is asked for again.
    assert_eq!(repo.calls(), vec![ids(&["1", "2", "3"]), ids(&["3"])]);
}

#[tokio::test]
async fn test_duplicate_ids_are_loaded_once() {
    let (_, cache) = memory_cache();
    let repo = RecordingRepository::with(&[item("1", "A")]);
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1", "1", "1"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(values.len(), 1);
    assert_eq!(repo.calls(), vec![ids(&["1"])]);
}

#[tokio::test]
async fn test_cache_is_read_in_a_single_round_trip() {
    let backend = Arc::new(CountingBackend::default());
    let cache = TypedCache::<Item>::for_type(backend.clone()).unwrap();
    let repo = RecordingRepository::with(&[item("1", "A"), item("2", "B")]);
    let ctx = CancellationToken::new();

    load_cacheable_list(&ctx, &ids(&["1", "2", "3"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(*backend.multi_gets.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_write_back_failure_does_not_fail_load() {
    let backend = CountingBackend {
        reject_writes: true,
        ..Default::default()
    };
    let cache = TypedCache::<Item>::for_type(Arc::new(backend)).unwrap();
    let repo = RecordingRepository::with(&[item("1", "A")]);
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1"]), &repo, &cache)
        .await
        .unwrap();

    assert_eq!(values["1"], Some(item("1", "A")));
    assert_eq!(cache.get(&ctx, "1").await.unwrap(), None);
}

#[tokio::test]
async fn test_values_the_source_was_not_asked_for_are_ignored() {
    struct ChattyRepository;

    #[async_trait]
    impl ListRepository<Item> for ChattyRepository {
        async fn get_by_id_list(
            &self,
            _ctx: &CancellationToken,
            ids: &[String],
        ) -> Result<HashMap<String, Item>, SourceError> {
            let mut found: HashMap<String, Item> =
                ids.iter().map(|id| (id.clone(), item(id, "asked"))).collect();
            found.insert("extra".into(), item("extra", "unasked"));
            Ok(found)
        }
    }

    let (_, cache) = memory_cache();
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &ids(&["1"]), &ChattyRepository, &cache)
        .await
        .unwrap();

    assert_eq!(values.len(), 1);
    assert!(!values.contains_key("extra"));
    assert_eq!(cache.get(&ctx, "extra").await.unwrap(), None);
}

#[tokio::test]
async fn test_undecodable_cache_entry_falls_back_to_source() {
    let (backend, cache) = memory_cache();
    let ctx = CancellationToken::new();
    backend.set_raw(&ctx, "item:1", "{corrupt", None).await.unwrap();
    let repo = RecordingRepository::with(&[item("1", "A")]);

    let report = BatchLoader::new(&cache, &repo)
        .load_detailed(&ctx, &ids(&["1"]))
        .await
        .unwrap();

    assert_eq!(report.values["1"], Some(item("1", "A")));
    assert!(report.degraded.unwrap().is_serialization());
    // Write-back replaced the corrupt payload.
    assert_eq!(cache.get(&ctx, "1").await.unwrap(), Some(item("1", "A")));
}

#[tokio::test]
async fn test_batch_decode_binds_payload_to_requested_id() {
    // Regression guard: every decoded value must come from its own key.
    let (_, cache) = memory_cache();
    let stored: Vec<Item> = (0..20)
        .map(|i| item(&i.to_string(), &format!("v{i}")))
        .collect();
    seed(&cache, &stored).await;
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let request: Vec<String> = (0..20).rev().map(|i| i.to_string()).collect();
    let values = load_cacheable_list(&ctx, &request, &repo, &cache)
        .await
        .unwrap();

    for i in 0..20 {
        let id = i.to_string();
        assert_eq!(values[&id], Some(item(&id, &format!("v{i}"))));
    }
}

#[tokio::test]
async fn test_null_backend_always_consults_source() {
    let backend: DynBackend = Arc::new(NullBackend::new());
    let cache = TypedCache::<Item>::new(backend, Namespace::new("item").unwrap());
    let repo = RecordingRepository::with(&[item("1", "A")]);
    let ctx = CancellationToken::new();
    let request = ids(&["1"]);

    load_cacheable_list(&ctx, &request, &repo, &cache).await.unwrap();
    load_cacheable_list(&ctx, &request, &repo, &cache).await.unwrap();

    assert_eq!(repo.calls().len(), 2);
}

#[tokio::test]
async fn test_empty_request_touches_nothing() {
    let (_, cache) = memory_cache();
    let repo = RecordingRepository::failing();
    let ctx = CancellationToken::new();

    let values = load_cacheable_list(&ctx, &[], &repo, &cache).await.unwrap();

    assert!(values.is_empty());
    assert!(repo.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_source_read_follows_failure_policy() {
    struct SlowRepository;

    #[async_trait]
    impl ListRepository<Item> for SlowRepository {
        async fn get_by_id_list(
            &self,
            ctx: &CancellationToken,
            _ids: &[String],
        ) -> Result<HashMap<String, Item>, SourceError> {
            ctx.cancel();
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    let (_, cache) = memory_cache();
    seed(&cache, &[item("hit", "H")]).await;

    let ctx = CancellationToken::new();
    let err = load_cacheable_list(&ctx, &ids(&["miss"]), &SlowRepository, &cache)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    let ctx = CancellationToken::new();
    let report = BatchLoader::new(&cache, &SlowRepository)
        .load_detailed(&ctx, &ids(&["hit", "miss"]))
        .await
        .unwrap();
    assert_eq!(report.values["hit"], Some(item("hit", "H")));
    assert_eq!(report.values["miss"], None);
    assert!(report.degraded.unwrap().is_cancelled());
}

#[tokio::test]
async fn test_loader_works_with_dyn_repository() {
    let (_, cache) = memory_cache();
    let repo: Arc<dyn ListRepository<Item>> =
        Arc::new(RecordingRepository::with(&[item("1", "A")]));
    let ctx = CancellationToken::new();

    let values = BatchLoader::new(&cache, repo.as_ref())
        .load(&ctx, &ids(&["1"]))
        .await
        .unwrap();
    assert_eq!(values["1"], Some(item("1", "A")));
}

#[tokio::test]
async fn test_concurrent_loads_of_overlapping_ids() {
    let (_, cache) = memory_cache();
    let repo = Arc::new(RecordingRepository::with(&[
        item("1", "A"),
        item("2", "B"),
        item("3", "C"),
    ]));
    let ctx = CancellationToken::new();

    let mut handles = Vec::new();
    for request in [ids(&["1", "2"]), ids(&["2", "3"]), ids(&["1", "3"])] {
        let cache = cache.clone();
        let repo = Arc::clone(&repo);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            load_cacheable_list(&ctx, &request, repo.as_ref(), &cache).await
        }));
    }
    for handle in handles {
        let values = handle.await.unwrap().unwrap();
        assert!(values.values().all(Option::is_some));
    }

    for (id, label) in [("1", "A"), ("2", "B"), ("3", "C")] {
        assert_eq!(cache.get(&ctx, id).await.unwrap(), Some(item(id, label)));
    }
}
