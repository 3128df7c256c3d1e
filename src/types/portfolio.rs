//! 持仓与因子暴露相关类型定义

use super::*;
use chrono::NaiveDate;

/// Barra风格因子数量
pub const FACTOR_COUNT: usize = 18;

/// Barra风格因子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FactorName {
    Size,
    Midcap,
    Btop,
    Earnyld,
    Resvol,
    Growth,
    Sgro,
    Rstr,
    Dastd,
    Cmra,
    Mlev,
    Dtoa,
    Stom,
    Stoq,
    Stoa,
    Atvr,
    Blev,
    Beta,
}

impl FactorName {
    pub const ALL: [FactorName; FACTOR_COUNT] = [
        FactorName::Size,
        FactorName::Midcap,
        FactorName::Btop,
        FactorName::Earnyld,
        FactorName::Resvol,
        FactorName::Growth,
        FactorName::Sgro,
        FactorName::Rstr,
        FactorName::Dastd,
        FactorName::Cmra,
        FactorName::Mlev,
        FactorName::Dtoa,
        FactorName::Stom,
        FactorName::Stoq,
        FactorName::Stoa,
        FactorName::Atvr,
        FactorName::Blev,
        FactorName::Beta,
    ];

    /// 在因子向量中的列位置
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FactorName::Size => "SIZE",
            FactorName::Midcap => "MIDCAP",
            FactorName::Btop => "BTOP",
            FactorName::Earnyld => "EARNYLD",
            FactorName::Resvol => "RESVOL",
            FactorName::Growth => "GROWTH",
            FactorName::Sgro => "SGRO",
            FactorName::Rstr => "RSTR",
            FactorName::Dastd => "DASTD",
            FactorName::Cmra => "CMRA",
            FactorName::Mlev => "MLEV",
            FactorName::Dtoa => "DTOA",
            FactorName::Stom => "STOM",
            FactorName::Stoq => "STOQ",
            FactorName::Stoa => "STOA",
            FactorName::Atvr => "ATVR",
            FactorName::Blev => "BLEV",
            FactorName::Beta => "BETA",
        }
    }
}

impl Display for FactorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 因子暴露向量，未提供的因子视为0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FactorVector {
    values: [f64; FACTOR_COUNT],
}

impl FactorVector {
    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn from_array(values: [f64; FACTOR_COUNT]) -> Self {
        Self { values }
    }

    /// 从 (因子, 暴露) 列表构建
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (FactorName, f64)>,
    {
        let mut vector = Self::zeros();
        for (factor, value) in pairs {
            vector.set(factor, value);
        }
        vector
    }

    #[inline]
    pub fn get(&self, factor: FactorName) -> f64 {
        self.values[factor.index()]
    }

    #[inline]
    pub fn set(&mut self, factor: FactorName, value: f64) {
        self.values[factor.index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactorName, f64)> + '_ {
        FactorName::ALL.iter().map(move |&f| (f, self.values[f.index()]))
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

/// 单个持仓
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument: InstrumentCode,
    /// 占净值比例 [0, 1]
    pub weight: f64,
    /// 所属行业（申万一级等），可缺失
    pub industry: Option<String>,
}

impl Holding {
    pub fn new(instrument: InstrumentCode, weight: f64) -> Self {
        Self { instrument, weight, industry: None }
    }

    pub fn with_industry(mut self, industry: &str) -> Self {
        self.industry = Some(industry.to_string());
        self
    }
}

/// 持仓快照；权重之和小于1时剩余部分为现金、债券等非权益资产
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub fund_code: FundCode,
    pub as_of: NaiveDate,
    pub holdings: Vec<Holding>,
}

impl HoldingsSnapshot {
    pub fn new(fund_code: &str, as_of: NaiveDate, holdings: Vec<Holding>) -> Self {
        Self {
            fund_code: fund_code.to_string(),
            as_of,
            holdings,
        }
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    /// 非权益资产的剩余权重
    pub fn cash_residual(&self) -> f64 {
        (1.0 - self.total_weight()).max(0.0)
    }

    pub fn weight_of(&self, instrument: &InstrumentCode) -> Option<f64> {
        self.holdings
            .iter()
            .find(|h| &h.instrument == instrument)
            .map(|h| h.weight)
    }

    pub fn instruments(&self) -> Vec<InstrumentCode> {
        self.holdings.iter().map(|h| h.instrument.clone()).collect()
    }

    /// 所有权重乘以常数k
    pub fn scaled(&self, k: f64) -> Self {
        let mut scaled = self.clone();
        for holding in &mut scaled.holdings {
            holding.weight *= k;
        }
        scaled
    }
}
