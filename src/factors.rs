//! 组合因子暴露聚合
//!
//! 组合因子暴露 = 持仓权重行向量 × 个股因子矩阵。缺少因子数据的持仓
//! （未上市证券、债券、现金等）在因子矩阵中是结构性零行：它们不贡献暴露，
//! 权重也不会被重新归一化，覆盖不全时结果会低于完整暴露。

use crate::types::*;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// 因子暴露聚合器
#[derive(Debug, Clone, Default)]
pub struct FactorAggregator;

impl FactorAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 计算组合因子暴露
    pub fn aggregate(
        &self,
        holdings: &HoldingsSnapshot,
        factors_by_security: &HashMap<InstrumentCode, FactorVector>,
    ) -> FactorVector {
        self.aggregate_with_coverage(holdings, factors_by_security).exposure
    }

    /// 计算组合因子暴露并返回数据覆盖情况
    pub fn aggregate_with_coverage(
        &self,
        holdings: &HoldingsSnapshot,
        factors_by_security: &HashMap<InstrumentCode, FactorVector>,
    ) -> FactorExposureReport {
        let n = holdings.len();
        let weights = Array1::from_iter(holdings.holdings.iter().map(|h| h.weight));
        let mut factor_matrix = Array2::<f64>::zeros((n, FACTOR_COUNT));

        let mut covered_weight = 0.0;
        let mut covered_holdings = 0;
        for (row, holding) in holdings.holdings.iter().enumerate() {
            if let Some(vector) = factors_by_security.get(&holding.instrument) {
                for (col, value) in vector.as_slice().iter().enumerate() {
                    factor_matrix[[row, col]] = *value;
                }
                covered_weight += holding.weight;
                covered_holdings += 1;
            }
        }

        let product = weights.dot(&factor_matrix);
        let mut values = [0.0; FACTOR_COUNT];
        for (slot, value) in values.iter_mut().zip(product.iter()) {
            *slot = *value;
        }

        let coverage_ratio = if n > 0 {
            covered_holdings as f64 / n as f64
        } else {
            0.0
        };

        if covered_holdings < n {
            tracing::debug!(
                "基金 {} 因子覆盖 {}/{} 个持仓 (权重 {:.4})",
                holdings.fund_code, covered_holdings, n, covered_weight
            );
        }

        FactorExposureReport {
            exposure: FactorVector::from_array(values),
            total_weight: holdings.total_weight(),
            covered_weight,
            covered_holdings,
            total_holdings: n,
            coverage_ratio,
        }
    }

    /// 相对基准的因子暴露（逐因子相减）
    pub fn relative_exposure(&self, portfolio: &FactorVector, benchmark: &FactorVector) -> FactorVector {
        let mut relative = FactorVector::zeros();
        for factor in FactorName::ALL {
            relative.set(factor, portfolio.get(factor) - benchmark.get(factor));
        }
        relative
    }

    /// 相对暴露中绝对值最大的一项
    pub fn max_absolute_exposure(&self, relative: &FactorVector) -> f64 {
        relative
            .as_slice()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// 以多只基金的平均持仓构建合成基准
    ///
    /// 每只证券的基准权重 = 各基金中该证券权重之和 / 基金数。
    /// 源基金持有非权益资产时，基准总权重小于1，反映平均权益仓位。
    pub fn benchmark_from_funds(&self, fund_holdings: &[HoldingsSnapshot]) -> HoldingsSnapshot {
        let as_of = fund_holdings
            .iter()
            .map(|h| h.as_of)
            .max()
            .unwrap_or(chrono::NaiveDate::MIN);

        let mut merged: Vec<Holding> = Vec::new();
        let mut index: HashMap<InstrumentCode, usize> = HashMap::new();
        for snapshot in fund_holdings {
            for holding in &snapshot.holdings {
                match index.get(&holding.instrument) {
                    Some(&pos) => merged[pos].weight += holding.weight,
                    None => {
                        index.insert(holding.instrument.clone(), merged.len());
                        merged.push(holding.clone());
                    }
                }
            }
        }

        let fund_count = fund_holdings.len();
        if fund_count > 1 {
            for holding in &mut merged {
                holding.weight /= fund_count as f64;
            }
        }

        tracing::debug!(
            "合成基准: {} 只基金, {} 个证券, 总权重 {:.4}",
            fund_count,
            merged.len(),
            merged.iter().map(|h| h.weight).sum::<f64>()
        );

        HoldingsSnapshot::new("BENCHMARK", as_of, merged)
    }
}
