/// 风险与绩效指标计算引擎
///
/// 基于日收益序列计算波动率、回撤、风险调整收益、尾部风险以及相对基准的指标。
/// 约定：年化因子 √252，标准差为样本标准差，VaR/CVaR为历史模拟法。
/// 纯计算模块，不做任何I/O。

use crate::types::*;
use crate::{AnalyticsError, Result};
use statrs::statistics::Statistics;

/// 数值为零的判定阈值
const EPSILON: f64 = 1e-12;

/// 统计量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticType {
    Mean,
    StdDev,
    Variance,
    /// 仅负收益的标准差
    DownsideDeviation,
    Skewness,
    Kurtosis,
}

impl StatisticType {
    /// 计算所需的最少观测数
    fn min_observations(self) -> usize {
        match self {
            StatisticType::Mean => 1,
            StatisticType::StdDev | StatisticType::Variance | StatisticType::DownsideDeviation => 2,
            StatisticType::Skewness => 3,
            StatisticType::Kurtosis => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            StatisticType::Mean => "mean",
            StatisticType::StdDev => "std_dev",
            StatisticType::Variance => "variance",
            StatisticType::DownsideDeviation => "downside_deviation",
            StatisticType::Skewness => "skewness",
            StatisticType::Kurtosis => "kurtosis",
        }
    }
}

/// 风险指标计算引擎
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    /// 年化无风险利率
    risk_free_rate: f64,
    low_confidence_observations: usize,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(0.02, 20)
    }
}

impl MetricsEngine {
    pub fn new(risk_free_rate: f64, low_confidence_observations: usize) -> Self {
        Self {
            risk_free_rate,
            low_confidence_observations,
        }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// 计算统计指标，数据不足时返回 InsufficientHistory
    pub fn calculate_statistic(&self, data: &[f64], stat_type: StatisticType) -> Result<f64> {
        let sample: Vec<f64> = match stat_type {
            StatisticType::DownsideDeviation => data.iter().copied().filter(|r| *r < 0.0).collect(),
            _ => data.to_vec(),
        };

        let required = stat_type.min_observations();
        if sample.len() < required {
            return Err(AnalyticsError::insufficient_history(stat_type.name(), required, sample.len()));
        }

        match stat_type {
            StatisticType::Mean => Ok(sample.iter().mean()),
            StatisticType::StdDev | StatisticType::DownsideDeviation => Ok(sample.iter().std_dev()),
            StatisticType::Variance => Ok(sample.iter().variance()),
            StatisticType::Skewness => {
                let (mean, std_dev) = population_moments(&sample);
                if std_dev < EPSILON {
                    return Ok(0.0);
                }
                Ok(sample.iter().map(|x| ((x - mean) / std_dev).powi(3)).sum::<f64>() / sample.len() as f64)
            }
            StatisticType::Kurtosis => {
                let (mean, std_dev) = population_moments(&sample);
                if std_dev < EPSILON {
                    return Ok(0.0);
                }
                let kurtosis = sample.iter().map(|x| ((x - mean) / std_dev).powi(4)).sum::<f64>()
                    / sample.len() as f64;
                Ok(kurtosis - 3.0) // 超额峰度
            }
        }
    }

    /// 计算风险指标集合
    pub fn compute(&self, returns: &ReturnSeries, benchmark_returns: Option<&ReturnSeries>) -> RiskMetricsBundle {
        let values = returns.values();
        let n = values.len();
        let annualization = TRADING_DAYS_PER_YEAR.sqrt();

        let mean = self.calculate_statistic(&values, StatisticType::Mean).ok();
        let volatility = self
            .calculate_statistic(&values, StatisticType::StdDev)
            .ok()
            .map(|sd| sd * annualization);
        let downside_deviation = self
            .calculate_statistic(&values, StatisticType::DownsideDeviation)
            .ok()
            .map(|sd| sd * annualization);

        let annual_mean = mean.map(|m| m * TRADING_DAYS_PER_YEAR);
        let sharpe_ratio = ratio(annual_mean.map(|m| m - self.risk_free_rate), volatility);
        let sortino_ratio = ratio(annual_mean.map(|m| m - self.risk_free_rate), downside_deviation);

        let max_drawdown = self.max_drawdown(&values);
        let calmar_ratio = ratio(annualized_return(&values), max_drawdown.map(f64::abs));

        let tail_95 = self.historical_var(&values, 0.95);
        let tail_99 = self.historical_var(&values, 0.99);

        let benchmark = benchmark_returns.map(|b| self.benchmark_metrics(&returns.inner_join(b)));

        let low_confidence = n < self.low_confidence_observations;
        if low_confidence {
            tracing::debug!("⚠️ 序列 {} 仅有 {} 个观测，结果为低置信度", returns.code(), n);
        }

        RiskMetricsBundle {
            observations: n,
            low_confidence,
            volatility,
            downside_deviation,
            max_drawdown,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            var_95: tail_95.map(|(var, _)| var),
            var_99: tail_99.map(|(var, _)| var),
            cvar_95: tail_95.map(|(_, cvar)| cvar),
            cvar_99: tail_99.map(|(_, cvar)| cvar),
            skewness: self.calculate_statistic(&values, StatisticType::Skewness).ok(),
            kurtosis: self.calculate_statistic(&values, StatisticType::Kurtosis).ok(),
            max_consecutive_loss_days: max_consecutive_losses(&values),
            risk_level: volatility.map(RiskLevel::from_volatility),
            benchmark,
        }
    }

    /// 计算收益统计
    pub fn return_statistics(&self, returns: &ReturnSeries, benchmark_returns: Option<&ReturnSeries>) -> ReturnStatistics {
        let values = returns.values();
        let n = values.len();

        let relative = benchmark_returns.and_then(|b| {
            let joined = returns.inner_join(b);
            if joined.is_empty() {
                return None;
            }
            let fund: Vec<f64> = joined.iter().map(|(_, p, _)| *p).collect();
            let bench: Vec<f64> = joined.iter().map(|(_, _, q)| *q).collect();
            let fund_total = total_return(&fund);
            let benchmark_total = total_return(&bench);
            let wins = joined.iter().filter(|(_, p, q)| p > q).count();
            let correlation = if joined.len() >= 2 {
                pearson(&fund, &bench)
            } else {
                None
            };

            Some(RelativeReturnStatistics {
                benchmark_total_return: benchmark_total,
                excess_total_return: fund_total - benchmark_total,
                correlation,
                win_rate_vs_benchmark: wins as f64 / joined.len() as f64,
            })
        });

        ReturnStatistics {
            observations: n,
            start_date: returns.first_date(),
            end_date: returns.last_date(),
            total_return: (n > 0).then(|| total_return(&values)),
            annualized_return: annualized_return(&values),
            mean_daily_return: self.calculate_statistic(&values, StatisticType::Mean).ok(),
            win_rate: (n > 0).then(|| values.iter().filter(|r| **r > 0.0).count() as f64 / n as f64),
            best_day: values.iter().copied().reduce(f64::max),
            worst_day: values.iter().copied().reduce(f64::min),
            relative,
        }
    }

    /// 最大回撤：单次前向遍历，跟踪累计净值的历史高点；结果≤0
    pub fn max_drawdown(&self, returns: &[f64]) -> Option<f64> {
        if returns.is_empty() {
            return None;
        }

        let mut value = 1.0;
        let mut peak = 1.0;
        let mut max_drawdown: f64 = 0.0;
        for &ret in returns {
            value *= 1.0 + ret;
            if value > peak {
                peak = value;
            }
            max_drawdown = max_drawdown.min(value / peak - 1.0);
        }

        Some(max_drawdown)
    }

    /// 历史模拟法 VaR 与 CVaR，返回 (VaR, CVaR)，亏损为负数
    pub fn historical_var(&self, returns: &[f64], confidence: f64) -> Option<(f64, f64)> {
        if returns.is_empty() {
            return None;
        }

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let index = ((sorted.len() as f64 * (1.0 - confidence)).floor() as usize).min(sorted.len() - 1);
        let var = sorted[index];

        let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= var).collect();
        let cvar = tail.iter().sum::<f64>() / tail.len() as f64;

        Some((var, cvar))
    }

    /// 相对基准指标，先按日期内连接
    fn benchmark_metrics(&self, joined: &[(chrono::NaiveDate, f64, f64)]) -> BenchmarkMetrics {
        let m = joined.len();
        let mut metrics = BenchmarkMetrics {
            overlapping_observations: m,
            beta: None,
            alpha: None,
            tracking_error: None,
            information_ratio: None,
            upside_capture: None,
            downside_capture: None,
            r_squared: None,
            correlation: None,
        };

        if m < 2 {
            tracing::debug!("基准对齐后仅有 {} 个观测，相对指标置空", m);
            return metrics;
        }

        let fund: Vec<f64> = joined.iter().map(|(_, p, _)| *p).collect();
        let bench: Vec<f64> = joined.iter().map(|(_, _, q)| *q).collect();
        let excess: Vec<f64> = joined.iter().map(|(_, p, q)| p - q).collect();
        let annualization = TRADING_DAYS_PER_YEAR.sqrt();

        let excess_mean = excess.iter().mean();
        let excess_sd = excess.iter().std_dev();
        metrics.tracking_error = Some(excess_sd * annualization);
        metrics.information_ratio = (excess_sd > EPSILON).then(|| excess_mean / excess_sd * annualization);
        metrics.alpha = Some(excess_mean * TRADING_DAYS_PER_YEAR);

        let covariance = fund.iter().covariance(bench.iter());
        let bench_variance = bench.iter().variance();
        if bench_variance > EPSILON {
            metrics.beta = Some(covariance / bench_variance);
        }
        metrics.correlation = pearson(&fund, &bench);
        metrics.r_squared = metrics.correlation.map(|c| c * c);

        metrics.upside_capture = capture_ratio(joined, |q| q > 0.0);
        metrics.downside_capture = capture_ratio(joined, |q| q < 0.0);

        metrics
    }
}

/// 分母为零或缺失时比率为空
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(num), Some(den)) if den > EPSILON => Some(num / den),
        _ => None,
    }
}

/// 样本Pearson相关系数，任一序列无波动时为空
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let x_variance = x.iter().variance();
    let y_variance = y.iter().variance();
    if x_variance <= EPSILON || y_variance <= EPSILON {
        return None;
    }
    Some(x.iter().covariance(y.iter()) / (x_variance.sqrt() * y_variance.sqrt()))
}

fn population_moments(data: &[f64]) -> (f64, f64) {
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    (mean, variance.sqrt())
}

fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// 几何年化收益
fn annualized_return(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let growth = 1.0 + total_return(returns);
    if growth <= 0.0 {
        return Some(-1.0);
    }
    Some(growth.powf(TRADING_DAYS_PER_YEAR / returns.len() as f64) - 1.0)
}

/// 最长连续下跌天数（严格为负）
fn max_consecutive_losses(returns: &[f64]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for &r in returns {
        if r < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// 基准满足条件的交易日上，基金平均收益 / 基准平均收益
fn capture_ratio<F>(joined: &[(chrono::NaiveDate, f64, f64)], condition: F) -> Option<f64>
where
    F: Fn(f64) -> bool,
{
    let selected: Vec<(f64, f64)> = joined
        .iter()
        .filter(|(_, _, q)| condition(*q))
        .map(|(_, p, q)| (*p, *q))
        .collect();
    if selected.is_empty() {
        return None;
    }

    let count = selected.len() as f64;
    let fund_mean = selected.iter().map(|(p, _)| p).sum::<f64>() / count;
    let bench_mean = selected.iter().map(|(_, q)| q).sum::<f64>() / count;
    (bench_mean.abs() > EPSILON).then(|| fund_mean / bench_mean)
}
