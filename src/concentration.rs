//! 分散化与集中度分析
//!
//! 持仓层面：HHI、前五/前十大集中度、行业风格、分散化得分。
//! 因子层面：因子集中度、跨期风格一致性与风格漂移。
//! 另提供 Treynor-Mazuy 择时能力回归。

use crate::config::AnalysisSettings;
use crate::metrics::pearson;
use crate::types::*;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

const EPSILON: f64 = 1e-12;
const RANK_TOLERANCE: f64 = 1e-10;

/// 集中度分析器
#[derive(Debug, Clone)]
pub struct ConcentrationAnalyzer {
    industry_threshold: f64,
    drift_threshold: f64,
    top_industries: usize,
}

impl Default for ConcentrationAnalyzer {
    fn default() -> Self {
        Self {
            industry_threshold: 0.30,
            drift_threshold: 0.7,
            top_industries: 3,
        }
    }
}

impl ConcentrationAnalyzer {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            industry_threshold: settings.industry_concentration_threshold,
            drift_threshold: settings.style_drift_threshold,
            top_industries: settings.top_industries,
        }
    }

    /// 分析持仓集中度
    ///
    /// `factor_history` 按时间从早到晚排列，最后一项为当期组合因子暴露。
    pub fn analyze(&self, holdings: &HoldingsSnapshot, factor_history: Option<&[FactorVector]>) -> ConcentrationReport {
        let mut weights: Vec<f64> = holdings.holdings.iter().map(|h| h.weight).collect();
        weights.sort_by(|a, b| b.total_cmp(a));

        let sum_weight: f64 = weights.iter().sum();
        let sum_squared: f64 = weights.iter().map(|w| w * w).sum();
        let hhi = sum_squared * 10_000.0;

        let effective_holdings = (sum_squared > EPSILON).then(|| sum_weight * sum_weight / sum_squared);
        let (industry_style, dominant_industries) = self.industry_allocation(holdings, sum_weight);

        let history = factor_history.unwrap_or(&[]);
        let (style_consistency, min_style_similarity) = style_signals(history);
        let style_drift = min_style_similarity.map_or(false, |s| s < self.drift_threshold);
        if style_drift {
            tracing::info!(
                "🔄 基金 {} 出现风格漂移 (最低相似度 {:.3})",
                holdings.fund_code,
                min_style_similarity.unwrap_or_default()
            );
        }

        ConcentrationReport {
            hhi,
            concentration_level: ConcentrationLevel::from_hhi(hhi),
            top5_concentration: weights.iter().take(5).sum(),
            top10_concentration: weights.iter().take(10).sum(),
            holdings_count: weights.len(),
            effective_holdings,
            equity_weight: sum_weight,
            cash_residual: holdings.cash_residual(),
            diversification_score: diversification_score(&weights, sum_weight),
            industry_style,
            dominant_industries,
            factor_concentration: history.last().and_then(factor_concentration),
            style_consistency,
            min_style_similarity,
            style_drift,
            market_timing: None,
        }
    }

    /// Treynor-Mazuy 择时回归
    ///
    /// `r_p - r_f = α + β(r_m - r_f) + γ(r_m - r_f)² + ε`，两序列先按日期内连接。
    /// α 年化报告；观测不足4个或设计矩阵奇异时返回None。
    pub fn market_timing(
        &self,
        fund_returns: &ReturnSeries,
        benchmark_returns: &ReturnSeries,
        risk_free_rate: f64,
    ) -> Option<MarketTiming> {
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let joined = fund_returns.inner_join(benchmark_returns);
        let n = joined.len();
        if n < 4 {
            return None;
        }

        let mut design = DMatrix::<f64>::zeros(n, 3);
        let mut target = DVector::<f64>::zeros(n);
        for (row, (_, p, q)) in joined.iter().enumerate() {
            let market_excess = q - daily_rf;
            design[(row, 0)] = 1.0;
            design[(row, 1)] = market_excess;
            design[(row, 2)] = market_excess * market_excess;
            target[row] = p - daily_rf;
        }

        let coefficients = least_squares(design, &target)?;

        Some(MarketTiming {
            alpha: coefficients[0] * TRADING_DAYS_PER_YEAR,
            beta: coefficients[1],
            gamma: coefficients[2],
            observations: n,
        })
    }

    /// 行业权重按占权益仓位比例降序
    fn industry_allocation(&self, holdings: &HoldingsSnapshot, equity_weight: f64) -> (IndustryStyle, Vec<IndustryWeight>) {
        let mut by_industry: HashMap<&str, f64> = HashMap::new();
        for holding in &holdings.holdings {
            if let Some(industry) = holding.industry.as_deref() {
                *by_industry.entry(industry).or_insert(0.0) += holding.weight;
            }
        }

        if by_industry.is_empty() || equity_weight <= EPSILON {
            return (IndustryStyle::Diversified, Vec::new());
        }

        let mut industries: Vec<IndustryWeight> = by_industry
            .into_iter()
            .map(|(industry, weight)| IndustryWeight {
                industry: industry.to_string(),
                weight,
                share_of_equity: weight / equity_weight,
            })
            .collect();
        industries.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.industry.cmp(&b.industry))
        });

        let style = if industries.iter().any(|i| i.share_of_equity > self.industry_threshold) {
            IndustryStyle::Concentrated
        } else {
            IndustryStyle::Diversified
        };
        industries.truncate(self.top_industries);

        (style, industries)
    }
}

/// 归一化HHI得分：1为完全均匀，0为单一持仓
fn diversification_score(weights: &[f64], sum_weight: f64) -> f64 {
    let n = weights.len();
    if n <= 1 || sum_weight <= EPSILON {
        return 0.0;
    }

    let normalized_hhi: f64 = weights.iter().map(|w| (w / sum_weight).powi(2)).sum();
    let floor = 1.0 / n as f64;
    (1.0 - (normalized_hhi - floor) / (1.0 - floor)).clamp(0.0, 1.0)
}

/// 以绝对暴露占比计算的因子HHI
fn factor_concentration(vector: &FactorVector) -> Option<f64> {
    let total: f64 = vector.as_slice().iter().map(|v| v.abs()).sum();
    if total <= EPSILON {
        return None;
    }
    Some(vector.as_slice().iter().map(|v| (v.abs() / total).powi(2)).sum())
}

/// 相邻快照的平均相关系数与最低余弦相似度
fn style_signals(history: &[FactorVector]) -> (Option<f64>, Option<f64>) {
    if history.len() < 2 {
        return (None, None);
    }

    let mut correlations = Vec::new();
    let mut min_similarity: Option<f64> = None;
    for pair in history.windows(2) {
        let (previous, current) = (pair[0].as_slice(), pair[1].as_slice());
        if let Some(correlation) = pearson(previous, current) {
            correlations.push(correlation);
        }
        if let Some(similarity) = cosine_similarity(previous, current) {
            min_similarity = Some(min_similarity.map_or(similarity, |m| m.min(similarity)));
        }
    }

    let consistency = (!correlations.is_empty())
        .then(|| correlations.iter().sum::<f64>() / correlations.len() as f64);
    (consistency, min_similarity)
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= EPSILON || norm_b <= EPSILON {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

/// 列归一化后的SVD最小二乘
///
/// 低波动基准的平方项量级极小，按列范数缩放后再判断秩，容差相对最大奇异值。
fn least_squares(mut design: DMatrix<f64>, target: &DVector<f64>) -> Option<Vec<f64>> {
    let scales: Vec<f64> = design.column_iter().map(|column| column.norm()).collect();
    if scales.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
        return None;
    }
    for (mut column, scale) in design.column_iter_mut().zip(&scales) {
        column /= *scale;
    }

    let svd = design.svd(true, true);
    let max_singular = svd.singular_values.max();
    let min_singular = svd.singular_values.min();
    if !(min_singular > max_singular * RANK_TOLERANCE) {
        return None;
    }

    let solution = svd.solve(target, 0.0).ok()?;
    Some(solution.iter().zip(&scales).map(|(x, s)| x / s).collect())
}
