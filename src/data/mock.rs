//! 模拟数据生成
//!
//! 按代码做确定性种子，同一输入总是生成相同的数据，便于演示与测试。

use super::*;
use crate::classifier::InstrumentClassifier;
use chrono::{Datelike, Duration, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// 模拟股票池 (代码, 申万一级行业)
const STOCK_UNIVERSE: [(&str, &str); 20] = [
    ("600519", "食品饮料"),
    ("000858", "食品饮料"),
    ("600036", "银行"),
    ("000001", "银行"),
    ("601318", "非银金融"),
    ("300750", "电力设备"),
    ("002594", "汽车"),
    ("600276", "医药生物"),
    ("300760", "医药生物"),
    ("002415", "计算机"),
    ("688981", "电子"),
    ("603501", "电子"),
    ("600900", "公用事业"),
    ("601899", "有色金属"),
    ("002352", "交通运输"),
    ("600309", "基础化工"),
    ("000002", "房地产"),
    ("601888", "社会服务"),
    ("300059", "非银金融"),
    ("002714", "农林牧渔"),
];

/// 每只模拟基金的持仓数
const HOLDINGS_PER_FUND: usize = 10;

/// FNV-1a 哈希作为代码种子
pub fn seed_for(code: &str) -> u64 {
    code.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn quarter_index(date: NaiveDate) -> u64 {
    (date.year() as u64) * 4 + (date.month0() / 3) as u64
}

/// 生成单只证券的模拟因子暴露
///
/// 基础暴露由代码决定，每个季度叠加小幅扰动。
pub fn mock_factor_vector(instrument: &InstrumentCode, as_of: NaiveDate) -> FactorVector {
    let mut base_rng = StdRng::seed_from_u64(seed_for(instrument.raw()));
    let mut drift_rng = StdRng::seed_from_u64(seed_for(instrument.raw()) ^ quarter_index(as_of));

    let mut vector = FactorVector::zeros();
    for factor in FactorName::ALL {
        let base: f64 = base_rng.gen_range(-1.5..1.5);
        let drift: f64 = drift_rng.gen_range(-0.2..0.2);
        vector.set(factor, base + drift);
    }
    vector
}

/// 生成以end结束、跳过周末的模拟日收益序列
pub fn mock_return_series(
    code: &str,
    end: NaiveDate,
    observations: usize,
    annual_return: f64,
    annual_volatility: f64,
) -> Result<ReturnSeries> {
    let mut rng = StdRng::seed_from_u64(seed_for(code));
    let daily_mean = annual_return / TRADING_DAYS_PER_YEAR;
    // 均匀分布 U(-a, a) 的标准差为 a/√3
    let half_width = annual_volatility / TRADING_DAYS_PER_YEAR.sqrt() * 3f64.sqrt();

    let mut dates = Vec::with_capacity(observations);
    let mut date = end;
    while dates.len() < observations {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
        }
        date = date - Duration::days(1);
    }
    dates.reverse();

    let pairs = dates
        .into_iter()
        .map(|d| (d, daily_mean + rng.gen_range(-half_width..half_width)))
        .collect();
    ReturnSeries::from_pairs(code, pairs)
}

/// 生成模拟持仓：股票池按基金代码固定抽取，权重按季度变化
pub fn mock_holdings(fund_code: &str, as_of: NaiveDate, classifier: &InstrumentClassifier) -> HoldingsSnapshot {
    let mut selection_rng = StdRng::seed_from_u64(seed_for(fund_code));
    let mut universe = STOCK_UNIVERSE.to_vec();
    universe.shuffle(&mut selection_rng);
    universe.truncate(HOLDINGS_PER_FUND);

    let mut weight_rng = StdRng::seed_from_u64(seed_for(fund_code) ^ quarter_index(as_of));
    let equity_ratio: f64 = weight_rng.gen_range(0.80..0.95);
    let raw: Vec<f64> = universe.iter().map(|_| weight_rng.gen_range(1.0..10.0)).collect();
    let total: f64 = raw.iter().sum();

    let mut holdings: Vec<Holding> = universe
        .iter()
        .zip(raw)
        .map(|((code, industry), w)| {
            Holding::new(classifier.classify(code), w / total * equity_ratio).with_industry(industry)
        })
        .collect();
    holdings.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    HoldingsSnapshot::new(fund_code, as_of, holdings)
}

/// 为任意股票即时生成模拟因子的提供方；基金类证券没有因子数据
#[derive(Debug, Default)]
pub struct SyntheticFactorProvider {
    calls: AtomicUsize,
}

impl SyntheticFactorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactorProvider for SyntheticFactorProvider {
    async fn get_factor_vectors(
        &self,
        instruments: &[InstrumentCode],
        as_of: NaiveDate,
    ) -> Result<HashMap<InstrumentCode, FactorVector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(instruments
            .iter()
            .filter(|i| i.is_stock())
            .map(|i| (i.clone(), mock_factor_vector(i, as_of)))
            .collect())
    }
}

/// 一组基金的完整模拟数据
pub struct MockMarket {
    pub as_of: NaiveDate,
    pub holdings: Arc<MemoryHoldingsProvider>,
    pub returns: Arc<MemoryReturnProvider>,
    pub factors: Arc<SyntheticFactorProvider>,
}

impl MockMarket {
    /// 约五年日收益
    pub const OBSERVATIONS: usize = 1_300;

    /// 为每只基金生成收益序列与最近 `quarters` 期季度持仓
    pub async fn generate(
        fund_codes: &[&str],
        benchmark_code: Option<&str>,
        as_of: NaiveDate,
        quarters: usize,
    ) -> Result<Self> {
        let classifier = InstrumentClassifier::default();
        let holdings = Arc::new(MemoryHoldingsProvider::new());
        let returns = Arc::new(MemoryReturnProvider::new());

        for fund_code in fund_codes {
            let mut rng = StdRng::seed_from_u64(seed_for(fund_code));
            let annual_return = rng.gen_range(-0.05..0.20);
            let annual_volatility = rng.gen_range(0.10..0.30);
            returns
                .add_series(mock_return_series(fund_code, as_of, Self::OBSERVATIONS, annual_return, annual_volatility)?)
                .await;

            for k in 0..quarters.max(1) {
                let snapshot_date = as_of - Duration::days(QUARTER_DAYS * k as i64);
                holdings.add_snapshot(mock_holdings(fund_code, snapshot_date, &classifier)).await;
            }
        }

        if let Some(code) = benchmark_code {
            returns
                .add_series(mock_return_series(code, as_of, Self::OBSERVATIONS, 0.06, 0.18)?)
                .await;
        }

        tracing::info!("🎲 已生成 {} 只基金的模拟数据 (截至 {})", fund_codes.len(), as_of);

        Ok(Self {
            as_of,
            holdings,
            returns,
            factors: Arc::new(SyntheticFactorProvider::new()),
        })
    }

    pub fn data_manager(&self, timeout: std::time::Duration) -> DataManager {
        DataManager::new(self.holdings.clone(), self.returns.clone(), self.factors.clone(), timeout)
    }
}
