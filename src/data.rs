//! 基金数据访问层
//!
//! 持仓、净值收益和因子数据三类提供方接口，统一超时控制与调用统计

pub mod mock;

pub use mock::{SyntheticFactorProvider, MockMarket};

use crate::types::*;
use crate::{AnalyticsError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// 持仓数据提供方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// 不晚于as_of的最近一期持仓
    async fn get_holdings(&self, fund_code: &str, as_of: NaiveDate) -> Result<HoldingsSnapshot>;
}

/// 净值收益数据提供方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReturnProvider: Send + Sync {
    /// [start, end] 区间内的日收益序列，基金与指数共用
    async fn get_return_series(&self, code: &str, start: NaiveDate, end: NaiveDate) -> Result<ReturnSeries>;

    /// 最新净值日期
    async fn data_vintage(&self, fund_code: &str) -> Result<NaiveDate>;
}

/// 因子数据提供方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FactorProvider: Send + Sync {
    /// 缺少数据的证券不出现在返回结果中
    async fn get_factor_vectors(
        &self,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> Result<HashMap<InstrumentCode, FactorVector>>;
}

/// 数据统计
#[derive(Debug, Clone, Default)]
pub struct DataStats {
    pub requests: u64,
    pub timeouts: u64,
    pub failures: u64,
}

impl DataStats {
    pub fn failure_rate(&self) -> f64 {
        if self.requests > 0 {
            (self.timeouts + self.failures) as f64 / self.requests as f64
        } else {
            0.0
        }
    }
}

/// 数据管理器
///
/// 所有提供方调用都经过这里：单次调用超时后按数据不可用处理。
pub struct DataManager {
    holdings: Arc<dyn HoldingsProvider>,
    returns: Arc<dyn ReturnProvider>,
    factors: Arc<dyn FactorProvider>,
    timeout: Duration,
    stats: Arc<RwLock<DataStats>>,
}

impl DataManager {
    pub fn new(
        holdings: Arc<dyn HoldingsProvider>,
        returns: Arc<dyn ReturnProvider>,
        factors: Arc<dyn FactorProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            holdings,
            returns,
            factors,
            timeout,
            stats: Arc::new(RwLock::new(DataStats::default())),
        }
    }

    pub async fn get_holdings(&self, fund_code: &str, as_of: NaiveDate) -> Result<HoldingsSnapshot> {
        self.call(fund_code, "holdings", self.holdings.get_holdings(fund_code, as_of))
            .await
    }

    pub async fn get_return_series(
        &self,
        fund_code: &str,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReturnSeries> {
        self.call(fund_code, "returns", self.returns.get_return_series(code, start, end))
            .await
    }

    pub async fn data_vintage(&self, fund_code: &str) -> Result<NaiveDate> {
        self.call(fund_code, "vintage", self.returns.data_vintage(fund_code))
            .await
    }

    pub async fn get_factor_vectors(
        &self,
        fund_code: &str,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> Result<HashMap<InstrumentCode, FactorVector>> {
        self.call(fund_code, "factors", self.factors.get_factor_vectors(instruments, as_of))
            .await
    }

    pub async fn get_stats(&self) -> DataStats {
        self.stats.read().await.clone()
    }

    async fn call<T, F>(&self, fund_code: &str, what: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        {
            let mut stats = self.stats.write().await;
            stats.requests += 1;
        }

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.stats.write().await.failures += 1;
                Err(e.into_data_unavailable(fund_code))
            }
            Err(_) => {
                self.stats.write().await.timeouts += 1;
                tracing::warn!("⏱️ 基金 {} 的{}数据请求超时 ({:?})", fund_code, what, self.timeout);
                Err(AnalyticsError::data_unavailable(
                    fund_code,
                    &format!("{} request timed out after {:?}", what, self.timeout),
                ))
            }
        }
    }
}

/// 内存持仓数据源，同一基金可保存多期快照
#[derive(Debug, Default)]
pub struct MemoryHoldingsProvider {
    snapshots: RwLock<HashMap<FundCode, BTreeMap<NaiveDate, HoldingsSnapshot>>>,
    calls: AtomicUsize,
}

impl MemoryHoldingsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_snapshot(&self, snapshot: HoldingsSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        snapshots
            .entry(snapshot.fund_code.clone())
            .or_default()
            .insert(snapshot.as_of, snapshot);
    }

    /// 累计调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HoldingsProvider for MemoryHoldingsProvider {
    async fn get_holdings(&self, fund_code: &str, as_of: NaiveDate) -> Result<HoldingsSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(fund_code)
            .and_then(|by_date| by_date.range(..=as_of).next_back())
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| {
                AnalyticsError::data_unavailable(fund_code, &format!("no holdings on or before {}", as_of))
            })
    }
}

/// 内存收益数据源
#[derive(Debug, Default)]
pub struct MemoryReturnProvider {
    series: RwLock<HashMap<String, ReturnSeries>>,
    calls: AtomicUsize,
}

impl MemoryReturnProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_series(&self, series: ReturnSeries) {
        let mut storage = self.series.write().await;
        storage.insert(series.code().to_string(), series);
    }

    /// 累计调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReturnProvider for MemoryReturnProvider {
    async fn get_return_series(&self, code: &str, start: NaiveDate, end: NaiveDate) -> Result<ReturnSeries> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let storage = self.series.read().await;
        let series = storage
            .get(code)
            .ok_or_else(|| AnalyticsError::data_unavailable(code, "no return series"))?;

        let points = series
            .points()
            .iter()
            .copied()
            .filter(|p| p.date >= start && p.date <= end)
            .collect();
        ReturnSeries::new(code, points)
    }

    async fn data_vintage(&self, fund_code: &str) -> Result<NaiveDate> {
        let storage = self.series.read().await;
        storage
            .get(fund_code)
            .and_then(|s| s.last_date())
            .ok_or_else(|| AnalyticsError::data_unavailable(fund_code, "no NAV history"))
    }
}

/// 内存因子数据源，每只证券按日期保存因子快照
#[derive(Debug, Default)]
pub struct MemoryFactorProvider {
    vectors: RwLock<HashMap<InstrumentCode, BTreeMap<NaiveDate, FactorVector>>>,
    calls: AtomicUsize,
}

impl MemoryFactorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_vector(&self, instrument: InstrumentCode, as_of: NaiveDate, vector: FactorVector) {
        let mut vectors = self.vectors.write().await;
        vectors.entry(instrument).or_default().insert(as_of, vector);
    }

    /// 累计调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactorProvider for MemoryFactorProvider {
    async fn get_factor_vectors(
        &self,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> Result<HashMap<InstrumentCode, FactorVector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vectors = self.vectors.read().await;
        Ok(instruments
            .iter()
            .filter_map(|instrument| {
                vectors
                    .get(instrument)
                    .and_then(|by_date| by_date.range(..=as_of).next_back())
                    .map(|(_, vector)| (instrument.clone(), *vector))
            })
            .collect())
    }
}
