//! 分析结果缓存
//!
//! 按 (基金, 周期, 数据版本) 缓存分析结果，同一键同时最多只有一个计算在进行：
//! 并发请求者等待进行中的计算并共享其结果，失败结果会传递给所有等待者且不被缓存。
//! 计算在独立任务中运行，请求方放弃等待不会取消计算。

use crate::types::*;
use crate::{AnalyticsError, Result};
use chrono::NaiveDate;
use dashmap::DashMap;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fund_code: FundCode,
    pub period: Period,
    /// 计算所依据的最新净值日期
    pub data_vintage: NaiveDate,
}

impl CacheKey {
    pub fn new(fund_code: &str, period: Period, data_vintage: NaiveDate) -> Self {
        Self {
            fund_code: fund_code.to_string(),
            period,
            data_vintage,
        }
    }

    fn supersedes(&self, other: &CacheKey) -> bool {
        self.fund_code == other.fund_code && self.period == other.period && self.data_vintage > other.data_vintage
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.fund_code, self.period, self.data_vintage)
    }
}

/// 缓存统计
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// 实际执行的计算次数
    pub computations: u64,
    /// 直接共享进行中计算结果的请求数
    pub joins: u64,
    pub failures: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests > 0 {
            self.hits as f64 / requests as f64
        } else {
            0.0
        }
    }
}

struct SlotState<V> {
    value: Option<V>,
    /// 最近一次计算的结果，供等待者共享
    last_outcome: Option<Result<V>>,
}

/// 单个键的临界区；generation 在每次计算完成时递增
struct CacheSlot<V> {
    generation: AtomicU64,
    state: Arc<Mutex<SlotState<V>>>,
}

impl<V> CacheSlot<V> {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            state: Arc::new(Mutex::new(SlotState {
                value: None,
                last_outcome: None,
            })),
        }
    }
}

/// 单飞分析缓存
pub struct AnalysisCache<V = AnalysisResult> {
    slots: DashMap<CacheKey, Arc<CacheSlot<V>>>,
    stats: parking_lot::Mutex<CacheStats>,
}

impl<V> Default for AnalysisCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AnalysisCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            stats: parking_lot::Mutex::new(CacheStats::default()),
        }
    }

    /// 获取缓存结果，未命中时计算
    ///
    /// `force_refresh` 跳过缓存读取，但仍与同键的并发请求共享同一次计算。
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F, force_refresh: bool) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CacheSlot::new()))
            .clone();

        let seen = slot.generation.load(Ordering::Acquire);
        let mut guard = slot.state.clone().lock_owned().await;

        if slot.generation.load(Ordering::Acquire) != seen {
            if let Some(outcome) = guard.last_outcome.clone() {
                self.stats.lock().joins += 1;
                debug!("🔗 共享进行中的计算结果: {}", key);
                return outcome;
            }
        }

        if !force_refresh {
            if let Some(value) = guard.value.clone() {
                self.stats.lock().hits += 1;
                debug!("📦 缓存命中: {}", key);
                return Ok(value);
            }
            self.stats.lock().misses += 1;
            debug!("📭 缓存未命中: {}", key);
        } else {
            debug!("🔄 强制刷新: {}", key);
        }

        self.stats.lock().computations += 1;
        let future = compute();
        let task_slot = slot.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            // 计算崩溃同样要写入槽位，否则排队的请求会各自重算
            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(AnalyticsError::cache_failed(&task_key.to_string(), "computation panicked")),
            };
            guard.value = outcome.as_ref().ok().cloned();
            guard.last_outcome = Some(outcome.clone());
            task_slot.generation.fetch_add(1, Ordering::Release);
            drop(guard);
            outcome
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(AnalyticsError::cache_failed(&key.to_string(), &e.to_string())),
        };

        match &outcome {
            Ok(_) => self.purge_superseded(&key),
            Err(e) => {
                self.stats.lock().failures += 1;
                warn!("❌ 计算失败，结果不缓存: {} ({})", key, e);
            }
        }

        outcome
    }

    /// 删除某只基金的所有缓存
    pub fn invalidate(&self, fund_code: &str) {
        let before = self.slots.len();
        self.slots.retain(|key, _| key.fund_code != fund_code);
        info!("🗑️ 已清除基金 {} 的 {} 条缓存", fund_code, before.saturating_sub(self.slots.len()));
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// 数据版本更新后，同基金同周期的旧版本条目不再可能被访问
    fn purge_superseded(&self, key: &CacheKey) {
        self.slots.retain(|existing, _| !key.supersedes(existing));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn vintage(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn key(day: u32) -> CacheKey {
        CacheKey::new("110011", Period::OneYear, vintage(day))
    }

    async fn slow_value(counter: Arc<AtomicUsize>, value: u64, delay_ms: u64) -> Result<u64> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(value)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_compute_once() {
        let cache = Arc::new(AnalysisCache::<u64>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key(28), move || slow_value(counter, 42, 100), false)
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.joins, 15);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_computation() {
        let cache = AnalysisCache::<u64>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        assert_eq!(cache.get_or_compute(key(28), move || slow_value(c, 1, 0), false).await.unwrap(), 1);
        let c = counter.clone();
        assert_eq!(cache.get_or_compute(key(28), move || slow_value(c, 2, 0), false).await.unwrap(), 1);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_force_refresh_dedupes_concurrent_calls() {
        let cache = Arc::new(AnalysisCache::<u64>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        cache.get_or_compute(key(28), move || slow_value(c, 1, 0), false).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key(28), move || slow_value(counter, 2, 200), true)
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = Arc::new(AnalysisCache::<u64>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(
                        key(28),
                        move || async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Err::<u64, _>(AnalyticsError::data_unavailable("110011", "no NAV"))
                        },
                        false,
                    )
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AnalyticsError::DataUnavailable { .. }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().failures, 1);

        let c = counter.clone();
        assert_eq!(cache.get_or_compute(key(28), move || slow_value(c, 7, 0), false).await.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_computation_is_shared_once() {
        let cache = Arc::new(AnalysisCache::<u64>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(
                        key(28),
                        move || async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            if counter.load(Ordering::SeqCst) > 0 {
                                panic!("factor matrix corrupted");
                            }
                            Ok::<u64, AnalyticsError>(0)
                        },
                        false,
                    )
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, AnalyticsError::CacheComputationFailed { .. }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().computations, 1);
        assert_eq!(cache.stats().joins, 3);

        let c = counter.clone();
        assert_eq!(cache.get_or_compute(key(28), move || slow_value(c, 5, 0), false).await.unwrap(), 5);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_new_vintage_replaces_stale_entry() {
        let cache = AnalysisCache::<u64>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        cache.get_or_compute(key(27), move || slow_value(c, 1, 0), false).await.unwrap();
        let c = counter.clone();
        let fresh = cache.get_or_compute(key(28), move || slow_value(c, 2, 0), false).await.unwrap();

        assert_eq!(fresh, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);

        cache.invalidate("110011");
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_request_does_not_cancel_computation() {
        let cache = Arc::new(AnalysisCache::<u64>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = cache.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(28), move || slow_value(counter, 9, 100), false)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let c = counter.clone();
        let value = cache.get_or_compute(key(28), move || slow_value(c, 0, 0), false).await.unwrap();
        assert_eq!(value, 9);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }
}
