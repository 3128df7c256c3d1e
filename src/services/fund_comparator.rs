//! 多基金对比
//!
//! 并发分析每只基金，汇总收益最高、风险最低与夏普最高的基金。
//! 单只基金失败不影响其他基金，失败基金在结果中单独列出。

use crate::config::AnalysisSettings;
use crate::factors::FactorAggregator;
use crate::services::analysis_engine::AnalysisEngine;
use crate::types::*;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

/// 基金对比器
#[derive(Debug, Clone)]
pub struct FundComparator {
    max_concurrent_funds: usize,
    aggregator: FactorAggregator,
}

impl FundComparator {
    pub fn new(max_concurrent_funds: usize) -> Self {
        Self {
            max_concurrent_funds: max_concurrent_funds.max(1),
            aggregator: FactorAggregator::new(),
        }
    }

    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self::new(settings.max_concurrent_funds)
    }

    /// 对比一组基金在同一周期上的表现
    pub async fn compare<S: AsRef<str>>(
        &self,
        engine: &AnalysisEngine,
        fund_codes: &[S],
        period: Period,
    ) -> ComparisonResult {
        let codes: BTreeSet<String> = fund_codes
            .iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        info!("📊 开始对比 {} 只基金 [{}]", codes.len(), period);

        let outcomes: Vec<_> = stream::iter(codes)
            .map(|code| async move {
                let outcome = engine.analyze_period(&code, period, false).await;
                (code, outcome)
            })
            .buffer_unordered(self.max_concurrent_funds)
            .collect()
            .await;

        let mut per_fund = BTreeMap::new();
        let mut failures = Vec::new();
        for (code, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    per_fund.insert(code, result);
                }
                Err(e) => {
                    error!("❌ 基金 {} 分析失败: {}", code, e);
                    failures.push(FundFailure {
                        fund_code: code,
                        error: e.to_string(),
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.fund_code.cmp(&b.fund_code));

        let summary = summarize(&per_fund);
        let relative_exposures = self.relative_exposures(engine, &per_fund).await;

        info!(
            "✅ 对比完成: {} 成功, {} 失败, 收益最高 {:?}",
            per_fund.len(),
            failures.len(),
            summary.best_return
        );

        ComparisonResult {
            period,
            per_fund,
            failures,
            summary,
            relative_exposures,
        }
    }

    /// 各基金相对同组平均持仓的因子暴露
    async fn relative_exposures(
        &self,
        engine: &AnalysisEngine,
        per_fund: &BTreeMap<FundCode, AnalysisResult>,
    ) -> BTreeMap<FundCode, FactorVector> {
        if per_fund.len() < 2 {
            return BTreeMap::new();
        }

        let snapshots: Vec<HoldingsSnapshot> = per_fund.values().map(|r| r.holdings.clone()).collect();
        let peer_benchmark = self.aggregator.benchmark_from_funds(&snapshots);
        let factors = engine
            .factor_vectors(&peer_benchmark.fund_code, &peer_benchmark.instruments(), peer_benchmark.as_of)
            .await;
        if factors.is_empty() {
            warn!("⚠️ 同组基准没有因子数据，跳过相对暴露");
            return BTreeMap::new();
        }
        let benchmark_exposure = self.aggregator.aggregate(&peer_benchmark, &factors);

        per_fund
            .iter()
            .map(|(code, result)| {
                let relative = self
                    .aggregator
                    .relative_exposure(&result.factor_exposure.exposure, &benchmark_exposure);
                (code.clone(), relative)
            })
            .collect()
    }
}

/// 按基金代码字典序遍历，只有严格更优才替换，平局时字典序靠前者胜出
fn summarize(per_fund: &BTreeMap<FundCode, AnalysisResult>) -> ComparisonSummary {
    ComparisonSummary {
        best_return: select(per_fund, |r| r.returns.total_return, |candidate, best| candidate > best),
        lowest_risk: select(per_fund, |r| r.risk.volatility, |candidate, best| candidate < best),
        best_sharpe: select(per_fund, |r| r.risk.sharpe_ratio, |candidate, best| candidate > best),
    }
}

fn select<V, M, B>(per_fund: &BTreeMap<FundCode, V>, metric: M, better: B) -> Option<FundCode>
where
    M: Fn(&V) -> Option<f64>,
    B: Fn(f64, f64) -> bool,
{
    let mut best: Option<(&FundCode, f64)> = None;
    for (code, result) in per_fund {
        let Some(value) = metric(result) else { continue };
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((code, value)),
        }
    }
    best.map(|(code, _)| code.clone())
}
