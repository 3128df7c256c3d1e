//! 分析结果相关类型定义

use super::*;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 波动率风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl RiskLevel {
    /// 按年化波动率分级
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility < 0.05 {
            RiskLevel::Low
        } else if volatility < 0.10 {
            RiskLevel::MediumLow
        } else if volatility < 0.15 {
            RiskLevel::Medium
        } else if volatility < 0.20 {
            RiskLevel::MediumHigh
        } else {
            RiskLevel::High
        }
    }
}

/// 相对基准的风险指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// 日期对齐后的观测数
    pub overlapping_observations: usize,
    pub beta: Option<f64>,
    /// 年化超额收益
    pub alpha: Option<f64>,
    pub tracking_error: Option<f64>,
    pub information_ratio: Option<f64>,
    pub upside_capture: Option<f64>,
    pub downside_capture: Option<f64>,
    pub r_squared: Option<f64>,
    pub correlation: Option<f64>,
}

/// 风险指标集合（不可变值对象）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricsBundle {
    pub observations: usize,
    /// 观测数少于阈值时为true
    pub low_confidence: bool,
    pub volatility: Option<f64>,
    pub downside_deviation: Option<f64>,
    /// 非正数，如 -0.25 表示回撤25%
    pub max_drawdown: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub var_95: Option<f64>,
    pub var_99: Option<f64>,
    pub cvar_95: Option<f64>,
    pub cvar_99: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub max_consecutive_loss_days: usize,
    pub risk_level: Option<RiskLevel>,
    pub benchmark: Option<BenchmarkMetrics>,
}

/// 相对基准的收益统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeReturnStatistics {
    pub benchmark_total_return: f64,
    pub excess_total_return: f64,
    /// 重叠区间上的日收益相关系数
    pub correlation: Option<f64>,
    /// 跑赢基准的交易日占比
    pub win_rate_vs_benchmark: f64,
}

/// 收益统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_return: Option<f64>,
    pub annualized_return: Option<f64>,
    pub mean_daily_return: Option<f64>,
    pub win_rate: Option<f64>,
    pub best_day: Option<f64>,
    pub worst_day: Option<f64>,
    pub relative: Option<RelativeReturnStatistics>,
}

/// 持仓集中度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcentrationLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl ConcentrationLevel {
    /// HHI分档：<1500 / 1500-2500 / 2500-5000 / >5000
    pub fn from_hhi(hhi: f64) -> Self {
        if hhi < 1_500.0 {
            ConcentrationLevel::Low
        } else if hhi < 2_500.0 {
            ConcentrationLevel::Medium
        } else if hhi <= 5_000.0 {
            ConcentrationLevel::High
        } else {
            ConcentrationLevel::Extreme
        }
    }
}

/// 行业配置风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustryStyle {
    Concentrated,
    Diversified,
}

/// 行业权重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryWeight {
    pub industry: String,
    pub weight: f64,
    /// 占权益仓位的比例
    pub share_of_equity: f64,
}

/// Treynor-Mazuy择时回归结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTiming {
    pub alpha: f64,
    pub beta: f64,
    /// 二次项系数，正值表示具备择时能力
    pub gamma: f64,
    pub observations: usize,
}

impl MarketTiming {
    pub fn has_timing_skill(&self) -> bool {
        self.gamma > 0.0
    }
}

/// 分散化与集中度报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationReport {
    /// 0-10000
    pub hhi: f64,
    pub concentration_level: ConcentrationLevel,
    pub top5_concentration: f64,
    pub top10_concentration: f64,
    pub holdings_count: usize,
    pub effective_holdings: Option<f64>,
    pub equity_weight: f64,
    pub cash_residual: f64,
    /// 0-1，越高越分散
    pub diversification_score: f64,
    pub industry_style: IndustryStyle,
    pub dominant_industries: Vec<IndustryWeight>,
    pub factor_concentration: Option<f64>,
    pub style_consistency: Option<f64>,
    pub min_style_similarity: Option<f64>,
    pub style_drift: bool,
    pub market_timing: Option<MarketTiming>,
}

/// 组合因子暴露及数据覆盖情况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorExposureReport {
    pub exposure: FactorVector,
    pub total_weight: f64,
    /// 有因子数据的持仓权重之和
    pub covered_weight: f64,
    pub covered_holdings: usize,
    pub total_holdings: usize,
    /// 按持仓个数计的覆盖率
    pub coverage_ratio: f64,
}

/// 单只基金在单个周期上的分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub fund_code: FundCode,
    pub period: Period,
    /// 计算所依据的数据版本（最新净值日期）
    pub data_vintage: NaiveDate,
    pub risk: RiskMetricsBundle,
    pub returns: ReturnStatistics,
    pub concentration: ConcentrationReport,
    pub factor_exposure: FactorExposureReport,
    pub holdings: HoldingsSnapshot,
    /// 0-100
    pub overall_score: f64,
    pub created_at: DateTime<Utc>,
}

/// 对比汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub best_return: Option<FundCode>,
    pub lowest_risk: Option<FundCode>,
    pub best_sharpe: Option<FundCode>,
}

/// 单只基金的失败信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFailure {
    pub fund_code: FundCode,
    pub error: String,
}

/// 多基金对比结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub period: Period,
    pub per_fund: BTreeMap<FundCode, AnalysisResult>,
    pub failures: Vec<FundFailure>,
    pub summary: ComparisonSummary,
    /// 相对同组基金平均持仓的因子暴露
    pub relative_exposures: BTreeMap<FundCode, FactorVector>,
}

impl ComparisonResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concentration_breakpoints() {
        assert_eq!(ConcentrationLevel::from_hhi(1_499.9), ConcentrationLevel::Low);
        assert_eq!(ConcentrationLevel::from_hhi(1_500.0), ConcentrationLevel::Medium);
        assert_eq!(ConcentrationLevel::from_hhi(2_500.0), ConcentrationLevel::High);
        assert_eq!(ConcentrationLevel::from_hhi(5_000.0), ConcentrationLevel::High);
        assert_eq!(ConcentrationLevel::from_hhi(5_000.1), ConcentrationLevel::Extreme);
    }

    #[test]
    fn test_risk_level_from_volatility() {
        assert_eq!(RiskLevel::from_volatility(0.03), RiskLevel::Low);
        assert_eq!(RiskLevel::from_volatility(0.12), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_volatility(0.35), RiskLevel::High);
    }
}
