//! 基金分析引擎
//!
//! 对外提供三组操作：证券代码分类、单基金多周期分析、多基金对比。
//! 单基金分析流程：取数据版本 → 取收益/基准/持仓/因子 → 计算风险、集中度与综合评分，
//! 整个流程包裹在单飞缓存中。

use crate::classifier::InstrumentClassifier;
use crate::concentration::ConcentrationAnalyzer;
use crate::config::EngineConfig;
use crate::data::{DataManager, FactorProvider, HoldingsProvider, ReturnProvider};
use crate::factors::FactorAggregator;
use crate::metrics::MetricsEngine;
use crate::services::analysis_cache::{AnalysisCache, CacheKey, CacheStats};
use crate::services::fund_comparator::FundComparator;
use crate::types::*;
use crate::{AnalyticsError, Result};
use chrono::{Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 基金分析引擎
pub struct AnalysisEngine {
    config: EngineConfig,
    classifier: InstrumentClassifier,
    cache: Arc<AnalysisCache>,
    pipeline: Arc<AnalysisPipeline>,
}

impl AnalysisEngine {
    /// 创建分析引擎，缓存由调用方注入
    pub fn new(config: EngineConfig, data: DataManager, cache: Arc<AnalysisCache>) -> Result<Self> {
        let classifier = InstrumentClassifier::from_config(&config.classifier)?;
        let pipeline = AnalysisPipeline {
            data: Arc::new(data),
            metrics: MetricsEngine::new(config.engine.risk_free_rate, config.engine.low_confidence_observations),
            aggregator: FactorAggregator::new(),
            analyzer: ConcentrationAnalyzer::from_settings(&config.analysis),
            benchmark_code: config.providers.benchmark_code.clone(),
            style_history_snapshots: config.analysis.style_history_snapshots,
        };

        info!(
            "🚀 {} 初始化完成 (分类规则 v{}, 基准 {})",
            config.engine.name,
            classifier.rules_version(),
            config.providers.benchmark_code.as_deref().unwrap_or("无")
        );

        Ok(Self {
            config,
            classifier,
            cache,
            pipeline: Arc::new(pipeline),
        })
    }

    /// 由三个数据提供方直接创建，使用独立缓存
    pub fn from_providers(
        config: EngineConfig,
        holdings: Arc<dyn HoldingsProvider>,
        returns: Arc<dyn ReturnProvider>,
        factors: Arc<dyn FactorProvider>,
    ) -> Result<Self> {
        let data = DataManager::new(holdings, returns, factors, config.providers.timeout());
        Self::new(config, data, Arc::new(AnalysisCache::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate(&self, fund_code: &str) {
        self.cache.invalidate(fund_code);
    }

    /// 证券代码分类
    pub fn classify(&self, raw_code: &str) -> InstrumentCode {
        let instrument = self.classifier.classify(raw_code);
        if instrument.is_low_confidence() {
            warn!("⚠️ 代码 {} 未匹配任何规则，按场外基金处理", raw_code.trim());
        }
        instrument
    }

    pub fn classify_batch<S: AsRef<str>>(&self, raw_codes: &[S]) -> Vec<InstrumentCode> {
        raw_codes.iter().map(|c| self.classify(c.as_ref())).collect()
    }

    /// 分析单只基金的多个周期
    ///
    /// 任何失败都以 DataUnavailable 返回给调用方。
    pub async fn analyze_fund(
        &self,
        fund_code: &str,
        periods: &[Period],
        force_refresh: bool,
    ) -> Result<BTreeMap<Period, AnalysisResult>> {
        let fund_code = fund_code.trim();
        let vintage = self.pipeline.data.data_vintage(fund_code).await?;

        let mut unique: Vec<Period> = periods.to_vec();
        unique.sort();
        unique.dedup();

        let analyses = unique
            .iter()
            .map(|period| self.analyze_at_vintage(fund_code, *period, vintage, force_refresh));
        let results = futures::future::try_join_all(analyses).await?;

        Ok(unique.into_iter().zip(results).collect())
    }

    /// 分析单只基金的单个周期
    pub async fn analyze_period(&self, fund_code: &str, period: Period, force_refresh: bool) -> Result<AnalysisResult> {
        let fund_code = fund_code.trim();
        let vintage = self.pipeline.data.data_vintage(fund_code).await?;
        self.analyze_at_vintage(fund_code, period, vintage, force_refresh).await
    }

    /// 多基金对比
    pub async fn compare_funds<S: AsRef<str>>(&self, fund_codes: &[S], period: Period) -> ComparisonResult {
        FundComparator::from_settings(&self.config.analysis)
            .compare(self, fund_codes, period)
            .await
    }

    /// 任意一组证券的因子数据，失败时返回空集合
    pub(crate) async fn factor_vectors(
        &self,
        label: &str,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> HashMap<InstrumentCode, FactorVector> {
        self.pipeline.factor_vectors(label, instruments, as_of).await
    }

    async fn analyze_at_vintage(
        &self,
        fund_code: &str,
        period: Period,
        vintage: NaiveDate,
        force_refresh: bool,
    ) -> Result<AnalysisResult> {
        let key = CacheKey::new(fund_code, period, vintage);
        let pipeline = self.pipeline.clone();
        let fund = fund_code.to_string();

        self.cache
            .get_or_compute(key, move || pipeline.run(fund, period, vintage), force_refresh)
            .await
            .map_err(|e| e.into_data_unavailable(fund_code))
    }
}

/// 单基金单周期的分析流水线，所有I/O都在这里
struct AnalysisPipeline {
    data: Arc<DataManager>,
    metrics: MetricsEngine,
    aggregator: FactorAggregator,
    analyzer: ConcentrationAnalyzer,
    benchmark_code: Option<String>,
    style_history_snapshots: usize,
}

impl AnalysisPipeline {
    async fn run(self: Arc<Self>, fund_code: FundCode, period: Period, vintage: NaiveDate) -> Result<AnalysisResult> {
        info!("🔬 开始分析 {} [{}]，数据截至 {}", fund_code, period, vintage);

        let start = match period.calendar_days() {
            Some(days) => vintage - Duration::days(days),
            None => NaiveDate::MIN,
        };

        let series = self
            .data
            .get_return_series(&fund_code, &fund_code, start, vintage)
            .await?;
        let series = match period.trading_days() {
            Some(days) => series.last_n(days),
            None => series,
        };
        if series.is_empty() {
            return Err(AnalyticsError::data_unavailable(
                &fund_code,
                &format!("no returns between {} and {}", start, vintage),
            ));
        }

        let benchmark = self.benchmark_series(&fund_code, &series, vintage).await;
        let holdings = self.data.get_holdings(&fund_code, vintage).await?;
        let factors = self
            .factor_vectors(&fund_code, &holdings.instruments(), holdings.as_of)
            .await;
        let factor_exposure = self.aggregator.aggregate_with_coverage(&holdings, &factors);
        let factor_history = self
            .factor_history(&fund_code, vintage, &holdings, factor_exposure.exposure)
            .await;

        let risk = self.metrics.compute(&series, benchmark.as_ref());
        let returns = self.metrics.return_statistics(&series, benchmark.as_ref());
        let mut concentration = self.analyzer.analyze(&holdings, Some(factor_history.as_slice()));
        concentration.market_timing = benchmark
            .as_ref()
            .and_then(|b| self.analyzer.market_timing(&series, b, self.metrics.risk_free_rate()));
        let overall_score = overall_score(&risk, &concentration);

        info!(
            "✅ {} [{}] 分析完成: {} 个观测, 综合评分 {:.1}",
            fund_code, period, risk.observations, overall_score
        );

        Ok(AnalysisResult {
            analysis_id: Uuid::new_v4(),
            fund_code,
            period,
            data_vintage: vintage,
            risk,
            returns,
            concentration,
            factor_exposure,
            holdings,
            overall_score,
            created_at: Utc::now(),
        })
    }

    /// 基准缺失不影响分析，只是相对指标为空
    async fn benchmark_series(&self, fund_code: &str, series: &ReturnSeries, vintage: NaiveDate) -> Option<ReturnSeries> {
        let code = self.benchmark_code.as_deref()?;
        let start = series.first_date()?;

        match self.data.get_return_series(fund_code, code, start, vintage).await {
            Ok(benchmark) if !benchmark.is_empty() => Some(benchmark),
            Ok(_) => {
                debug!("基准 {} 在 {} 之后没有数据", code, start);
                None
            }
            Err(e) => {
                warn!("⚠️ 基准 {} 获取失败，跳过相对指标: {}", code, e);
                None
            }
        }
    }

    async fn factor_vectors(
        &self,
        label: &str,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> HashMap<InstrumentCode, FactorVector> {
        match self.data.get_factor_vectors(label, instruments, as_of).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("⚠️ {} 因子数据获取失败，按零覆盖处理: {}", label, e);
                HashMap::new()
            }
        }
    }

    /// 按季度回溯的组合因子暴露，从早到晚排列，最后一项为当期
    async fn factor_history(
        &self,
        fund_code: &str,
        vintage: NaiveDate,
        current: &HoldingsSnapshot,
        current_exposure: FactorVector,
    ) -> Vec<FactorVector> {
        let mut seen: HashSet<NaiveDate> = HashSet::from([current.as_of]);
        let mut history = Vec::with_capacity(self.style_history_snapshots);

        for k in (1..self.style_history_snapshots).rev() {
            let as_of = vintage - Duration::days(QUARTER_DAYS * k as i64);
            let snapshot = match self.data.get_holdings(fund_code, as_of).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    debug!("基金 {} 在 {} 没有历史持仓: {}", fund_code, as_of, e);
                    continue;
                }
            };
            if !seen.insert(snapshot.as_of) {
                continue;
            }

            let factors = self
                .factor_vectors(fund_code, &snapshot.instruments(), snapshot.as_of)
                .await;
            history.push(self.aggregator.aggregate(&snapshot, &factors));
        }

        history.push(current_exposure);
        history
    }
}

/// 综合评分 (0-100)
///
/// 夏普 50%、回撤 30%、分散化 20%；缺失的分项取中性值50。
pub fn overall_score(risk: &RiskMetricsBundle, concentration: &ConcentrationReport) -> f64 {
    let sharpe_score = risk
        .sharpe_ratio
        .map_or(50.0, |s| (50.0 + 20.0 * s).clamp(0.0, 100.0));
    let drawdown_score = risk
        .max_drawdown
        .map_or(50.0, |d| (100.0 * (1.0 + d)).clamp(0.0, 100.0));
    let diversification_score = if concentration.holdings_count > 0 {
        100.0 * concentration.diversification_score
    } else {
        50.0
    };

    0.5 * sharpe_score + 0.3 * drawdown_score + 0.2 * diversification_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryFactorProvider, MemoryHoldingsProvider, MemoryReturnProvider, MockHoldingsProvider};

    fn vintage() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.providers.benchmark_code = Some("000300.SH".to_string());
        config
    }

    fn series(code: &str, end: NaiveDate, values: &[f64]) -> ReturnSeries {
        let n = values.len() as i64;
        let pairs = values
            .iter()
            .enumerate()
            .map(|(i, v)| (end - Duration::days(n - 1 - i as i64), *v))
            .collect();
        ReturnSeries::from_pairs(code, pairs).unwrap()
    }

    struct Fixture {
        holdings: Arc<MemoryHoldingsProvider>,
        returns: Arc<MemoryReturnProvider>,
        factors: Arc<MemoryFactorProvider>,
    }

    impl Fixture {
        async fn new() -> Self {
            let classifier = InstrumentClassifier::default();
            let holdings = Arc::new(MemoryHoldingsProvider::new());
            let returns = Arc::new(MemoryReturnProvider::new());
            let factors = Arc::new(MemoryFactorProvider::new());

            let fund_values: Vec<f64> = (0..300).map(|i| ((i % 7) as f64 - 3.0) * 0.004 + 0.0005).collect();
            let bench_values: Vec<f64> = (0..300).map(|i| ((i % 5) as f64 - 2.0) * 0.005).collect();
            returns.add_series(series("110011", vintage(), &fund_values)).await;
            returns.add_series(series("000300.SH", vintage(), &bench_values)).await;

            let snapshot = HoldingsSnapshot::new(
                "110011",
                vintage(),
                vec![
                    Holding::new(classifier.classify("600000"), 0.5).with_industry("银行"),
                    Holding::new(classifier.classify("000001"), 0.3).with_industry("银行"),
                    Holding::new(classifier.classify("300001"), 0.1).with_industry("电子"),
                ],
            );
            for (code, size) in [("600000", 1.2), ("000001", -0.5), ("300001", 0.8)] {
                factors
                    .add_vector(classifier.classify(code), vintage(), FactorVector::from_pairs([(FactorName::Size, size)]))
                    .await;
            }
            holdings.add_snapshot(snapshot).await;

            Self { holdings, returns, factors }
        }

        fn engine(&self) -> AnalysisEngine {
            AnalysisEngine::from_providers(config(), self.holdings.clone(), self.returns.clone(), self.factors.clone())
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_analyze_fund_end_to_end() {
        let fixture = Fixture::new().await;
        let engine = fixture.engine();

        let results = engine
            .analyze_fund("110011", &[Period::OneYear, Period::OneMonth, Period::OneYear], false)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let one_year = &results[&Period::OneYear];
        assert_eq!(one_year.data_vintage, vintage());
        assert_eq!(one_year.risk.observations, 252);
        assert!(one_year.risk.benchmark.is_some());
        assert!(one_year.concentration.market_timing.is_some());
        assert!(one_year.overall_score >= 0.0 && one_year.overall_score <= 100.0);

        let expected_size = 0.5 * 1.2 + 0.3 * -0.5 + 0.1 * 0.8;
        assert!((one_year.factor_exposure.exposure.get(FactorName::Size) - expected_size).abs() < 1e-12);
        assert_eq!(one_year.concentration.industry_style, IndustryStyle::Concentrated);

        assert_eq!(results[&Period::OneMonth].risk.observations, 21);
        assert!(!results[&Period::OneMonth].risk.low_confidence);
    }

    #[tokio::test]
    async fn test_long_periods_span_holiday_calendar() {
        use chrono::{Datelike, Weekday};

        let fixture = Fixture::new().await;
        let engine = fixture.engine();

        // 七年的交易日历，剔除周末与春节、国庆长假
        let pairs: Vec<(NaiveDate, f64)> = (0..=7 * 365)
            .rev()
            .map(|offset| vintage() - Duration::days(offset))
            .filter(|d| {
                let holiday = (d.month() == 2 && d.day() <= 14) || (d.month() == 10 && d.day() <= 7);
                !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) && !holiday
            })
            .enumerate()
            .map(|(i, d)| (d, ((i % 11) as f64 - 5.0) * 0.002))
            .collect();
        fixture
            .returns
            .add_series(ReturnSeries::from_pairs("110011", pairs).unwrap())
            .await;

        let results = engine
            .analyze_fund("110011", &[Period::ThreeYears, Period::FiveYears], false)
            .await
            .unwrap();
        assert_eq!(results[&Period::ThreeYears].risk.observations, 756);
        assert_eq!(results[&Period::FiveYears].risk.observations, 1260);
        assert_eq!(results[&Period::FiveYears].data_vintage, vintage());
    }

    #[tokio::test]
    async fn test_repeated_analysis_hits_cache() {
        let fixture = Fixture::new().await;
        let engine = fixture.engine();

        let first = engine.analyze_period("110011", Period::SixMonths, false).await.unwrap();
        let holdings_calls = fixture.holdings.calls();
        let second = engine.analyze_period("110011", Period::SixMonths, false).await.unwrap();

        assert_eq!(first.analysis_id, second.analysis_id);
        assert_eq!(fixture.holdings.calls(), holdings_calls);
        assert_eq!(engine.cache_stats().hits, 1);

        let refreshed = engine.analyze_period("110011", Period::SixMonths, true).await.unwrap();
        assert_ne!(refreshed.analysis_id, first.analysis_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_analysis_runs_pipeline_once() {
        let fixture = Fixture::new().await;
        let engine = Arc::new(fixture.engine());

        let mut handles = Vec::new();
        for _ in 0..12 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.analyze_period("110011", Period::OneYear, false).await
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().analysis_id);
        }
        assert_eq!(ids.len(), 1);
        // 当期持仓 + 3期历史持仓
        assert_eq!(fixture.holdings.calls(), 4);
        assert_eq!(engine.cache_stats().computations, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_analyze_fund_computes_each_period_once() {
        let fixture = Fixture::new().await;
        let engine = Arc::new(fixture.engine());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .analyze_fund("110011", &[Period::OneYear, Period::OneMonth], false)
                    .await
            }));
        }

        let mut one_year_ids = HashSet::new();
        let mut one_month_ids = HashSet::new();
        for handle in handles {
            let results = handle.await.unwrap().unwrap();
            one_year_ids.insert(results[&Period::OneYear].analysis_id);
            one_month_ids.insert(results[&Period::OneMonth].analysis_id);
        }
        assert_eq!(one_year_ids.len(), 1);
        assert_eq!(one_month_ids.len(), 1);
        assert_eq!(engine.cache_stats().computations, 2);
    }

    #[tokio::test]
    async fn test_new_nav_data_invalidates_cached_result() {
        let fixture = Fixture::new().await;
        let engine = fixture.engine();

        let first = engine.analyze_period("110011", Period::OneMonth, false).await.unwrap();

        let next_day = vintage() + Duration::days(1);
        let values: Vec<f64> = (0..301).map(|i| ((i % 7) as f64 - 3.0) * 0.004).collect();
        fixture.returns.add_series(series("110011", next_day, &values)).await;

        let second = engine.analyze_period("110011", Period::OneMonth, false).await.unwrap();
        assert_eq!(second.data_vintage, next_day);
        assert_ne!(first.analysis_id, second.analysis_id);
        assert_eq!(engine.cache_stats().computations, 2);
    }

    #[tokio::test]
    async fn test_missing_fund_is_data_unavailable() {
        let fixture = Fixture::new().await;
        let engine = fixture.engine();

        let err = engine.analyze_fund("999999", &[Period::OneYear], false).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable { ref fund_code, .. } if fund_code == "999999"));
    }

    #[tokio::test]
    async fn test_holdings_failure_surfaces_as_data_unavailable() {
        let fixture = Fixture::new().await;
        let mut holdings = MockHoldingsProvider::new();
        holdings
            .expect_get_holdings()
            .returning(|fund, _| Err(AnalyticsError::validation(&format!("holdings feed down for {}", fund))));

        let mut config = config();
        config.providers.timeout_ms = 1_000;
        let engine = AnalysisEngine::from_providers(config, Arc::new(holdings), fixture.returns.clone(), fixture.factors.clone())
            .unwrap();

        let err = engine.analyze_period("110011", Period::OneYear, false).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable { .. }));
        assert!(err.to_string().contains("holdings feed down"));
        assert_eq!(engine.cache_stats().failures, 1);
    }

    #[tokio::test]
    async fn test_missing_benchmark_still_analyzes() {
        let fixture = Fixture::new().await;
        let mut config = config();
        config.providers.benchmark_code = Some("NOT_A_BENCHMARK".to_string());
        let engine = AnalysisEngine::from_providers(
            config,
            fixture.holdings.clone(),
            fixture.returns.clone(),
            fixture.factors.clone(),
        )
        .unwrap();

        let result = engine.analyze_period("110011", Period::ThreeMonths, false).await.unwrap();
        assert!(result.risk.benchmark.is_none());
        assert!(result.returns.relative.is_none());
        assert!(result.concentration.market_timing.is_none());
        assert!(result.risk.volatility.is_some());
    }

    #[test]
    fn test_classify_facade() {
        let engine = AnalysisEngine::from_providers(
            EngineConfig::default(),
            Arc::new(MemoryHoldingsProvider::new()),
            Arc::new(MemoryReturnProvider::new()),
            Arc::new(MemoryFactorProvider::new()),
        )
        .unwrap();

        assert_eq!(engine.classify("600000").canonical(), "600000.SH");
        assert!(engine.classify("ABCDEF").is_low_confidence());
        let batch = engine.classify_batch(&["510050", "159915"]);
        assert_eq!(batch[0].canonical(), "510050.SH");
        assert_eq!(batch[1].canonical(), "159915.OF");
    }

    #[test]
    fn test_overall_score_neutral_defaults() {
        let classifier = InstrumentClassifier::default();
        let empty = HoldingsSnapshot::new("F1", vintage(), Vec::new());
        let concentration = ConcentrationAnalyzer::default().analyze(&empty, None);
        let risk = MetricsEngine::default().compute(&ReturnSeries::empty("F1"), None);
        assert!((overall_score(&risk, &concentration) - 50.0).abs() < 1e-12);

        let holdings = HoldingsSnapshot::new(
            "F1",
            vintage(),
            vec![Holding::new(classifier.classify("600000"), 0.45), Holding::new(classifier.classify("000001"), 0.45)],
        );
        let concentration = ConcentrationAnalyzer::default().analyze(&holdings, None);
        let flat = MetricsEngine::default().compute(&series("F1", vintage(), &[0.0; 30]), None);
        // 夏普缺失取50，回撤为0得100，等权分散化得100
        assert!((overall_score(&flat, &concentration) - (25.0 + 30.0 + 20.0)).abs() < 1e-9);
    }
}
