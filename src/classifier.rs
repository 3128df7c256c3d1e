//! 证券代码分类器
//!
//! 将6位数字代码解析为带交易所后缀的标准代码。分类是纯函数：
//! 同一原始代码在同一规则配置下总是得到相同结果，且永不失败。
//!
//! 规则按优先级匹配，首个命中生效：
//!
//! | 前缀 | 结果 |
//! |---|---|
//! | `688`, `6` | 上交所股票 `.SH` |
//! | `300`, `002`, `001` | 深交所股票 `.SZ` |
//! | `51` | 上交所ETF `.SH` |
//! | `159` | 深交所ETF `.OF` |
//! | `16` | 深交所LOF `.SZ` |
//! | `92`, `83`, `87`, `88` | 北交所股票 `.BJ` |
//! | `9` | 上交所B股 `.SH` |
//! | `000` | 排除列表/阈值命中为深交所股票 `.SZ`，否则为场外基金 `.OF` |
//! | `1`, `4`, `5`, `7` | 场外开放式基金 `.OF` |
//! | 其他 | 场外基金 `.OF`（低置信度） |
//!
//! `92` 北交所号段先于通用的 `9` B股规则匹配。

use crate::config::ClassifierConfig;
use crate::types::*;
use crate::{AnalyticsError, Result};
use std::collections::BTreeSet;

const CODE_WIDTH: usize = 6;

/// 证券代码分类器
#[derive(Debug, Clone)]
pub struct InstrumentClassifier {
    /// 000xxx区间按股票处理的代码数值
    stock_exclusions: BTreeSet<u32>,
    stock_threshold: Option<u32>,
    rules_version: semver::Version,
}

impl Default for InstrumentClassifier {
    fn default() -> Self {
        let config = ClassifierConfig::default();
        Self {
            stock_exclusions: config.ambiguous_stock_exclusions.into_iter().collect(),
            stock_threshold: config.ambiguous_stock_threshold,
            rules_version: semver::Version::new(1, 0, 0),
        }
    }
}

impl InstrumentClassifier {
    /// 从配置创建分类器
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let rules_version = semver::Version::parse(&config.rules_version).map_err(|e| {
            AnalyticsError::config(&format!("Invalid classifier rules version: {}", e))
        })?;

        Ok(Self {
            stock_exclusions: config.ambiguous_stock_exclusions.iter().copied().collect(),
            stock_threshold: config.ambiguous_stock_threshold,
            rules_version,
        })
    }

    pub fn rules_version(&self) -> &semver::Version {
        &self.rules_version
    }

    /// 分类单个代码
    pub fn classify(&self, raw_code: &str) -> InstrumentCode {
        let code = normalize(raw_code);

        if code.len() != CODE_WIDTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return fallback(code);
        }

        if code.starts_with('6') {
            // 688科创板也落在6开头的上交所号段
            return stock(code, Market::Sse, CodeSuffix::Sh);
        }
        if ["300", "002", "001"].iter().any(|p| code.starts_with(p)) {
            return stock(code, Market::Szse, CodeSuffix::Sz);
        }
        if code.starts_with("51") {
            return InstrumentCode::new(code, Some(Market::Sse), InstrumentKind::Etf, CodeSuffix::Sh, Confidence::High);
        }
        if code.starts_with("159") {
            return InstrumentCode::new(code, Some(Market::Szse), InstrumentKind::Etf, CodeSuffix::Of, Confidence::High);
        }
        if code.starts_with("16") {
            return InstrumentCode::new(code, Some(Market::Szse), InstrumentKind::Fund, CodeSuffix::Sz, Confidence::High);
        }
        if ["92", "83", "87", "88"].iter().any(|p| code.starts_with(p)) {
            return stock(code, Market::Bse, CodeSuffix::Bj);
        }
        if code.starts_with('9') {
            return stock(code, Market::Sse, CodeSuffix::Sh);
        }
        if code.starts_with("000") {
            return self.resolve_ambiguous(code);
        }
        if ['1', '4', '5', '7'].iter().any(|p| code.starts_with(*p)) {
            return InstrumentCode::new(code, None, InstrumentKind::Fund, CodeSuffix::Of, Confidence::High);
        }

        fallback(code)
    }

    /// 批量分类，保持输入顺序
    pub fn classify_batch<S: AsRef<str>>(&self, raw_codes: &[S]) -> Vec<InstrumentCode> {
        raw_codes.iter().map(|c| self.classify(c.as_ref())).collect()
    }

    /// 低置信度结果作为错误返回
    pub fn classify_strict(&self, raw_code: &str) -> Result<InstrumentCode> {
        let instrument = self.classify(raw_code);
        if instrument.is_low_confidence() {
            return Err(AnalyticsError::ClassificationAmbiguous {
                code: raw_code.trim().to_string(),
            });
        }
        Ok(instrument)
    }

    /// 000xxx既可能是深市主板股票也可能是场外基金
    fn resolve_ambiguous(&self, code: String) -> InstrumentCode {
        let numeric: u32 = code.parse().unwrap_or(0);
        let is_stock = self.stock_exclusions.contains(&numeric)
            || self.stock_threshold.map_or(false, |t| numeric >= t);

        if is_stock {
            InstrumentCode::new(code, Some(Market::Szse), InstrumentKind::Stock, CodeSuffix::Sz, Confidence::Heuristic)
        } else {
            InstrumentCode::new(code, None, InstrumentKind::Fund, CodeSuffix::Of, Confidence::Heuristic)
        }
    }
}

/// 去除空白和已有的后缀
fn normalize(raw_code: &str) -> String {
    let trimmed = raw_code.trim();
    match trimmed.split_once('.') {
        Some((digits, _)) => digits.to_string(),
        None => trimmed.to_string(),
    }
}

fn stock(code: String, market: Market, suffix: CodeSuffix) -> InstrumentCode {
    InstrumentCode::new(code, Some(market), InstrumentKind::Stock, suffix, Confidence::High)
}

fn fallback(code: String) -> InstrumentCode {
    tracing::debug!("⚠️ 无法识别的代码 {}，按场外基金处理", code);
    InstrumentCode::new(code, None, InstrumentKind::Fund, CodeSuffix::Of, Confidence::Low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(code: &str) -> String {
        InstrumentClassifier::default().classify(code).canonical()
    }

    #[test]
    fn test_documented_cases() {
        assert_eq!(canonical("000001"), "000001.SZ");
        assert_eq!(canonical("600000"), "600000.SH");
        assert_eq!(canonical("300001"), "300001.SZ");
        assert_eq!(canonical("510050"), "510050.SH");
        assert_eq!(canonical("159915"), "159915.OF");
        assert_eq!(canonical("920001"), "920001.BJ");
    }

    #[test]
    fn test_exchange_rules() {
        let classifier = InstrumentClassifier::default();

        let star = classifier.classify("688981");
        assert_eq!(star.kind(), InstrumentKind::Stock);
        assert_eq!(star.market(), Some(Market::Sse));

        assert_eq!(canonical("002594"), "002594.SZ");
        assert_eq!(canonical("001979"), "001979.SZ");
        assert_eq!(canonical("161725"), "161725.SZ");
        assert_eq!(canonical("900901"), "900901.SH");
        assert_eq!(canonical("830799"), "830799.BJ");
        assert_eq!(canonical("870204"), "870204.BJ");

        let etf = classifier.classify("510300");
        assert_eq!(etf.kind(), InstrumentKind::Etf);
        assert!(etf.is_fund());
        assert!(!etf.is_stock());
    }

    #[test]
    fn test_open_end_funds() {
        let classifier = InstrumentClassifier::default();
        for code in ["110011", "420002", "501001", "700001"] {
            let instrument = classifier.classify(code);
            assert_eq!(instrument.suffix(), CodeSuffix::Of, "{}", code);
            assert_eq!(instrument.kind(), InstrumentKind::Fund);
            assert_eq!(instrument.market(), None);
            assert_eq!(instrument.confidence(), Confidence::High);
        }
    }

    #[test]
    fn test_ambiguous_range_uses_exclusion_list() {
        let classifier = InstrumentClassifier::default();

        let wuliangye = classifier.classify("000858");
        assert_eq!(wuliangye.kind(), InstrumentKind::Stock);
        assert_eq!(wuliangye.confidence(), Confidence::Heuristic);

        let fund = classifier.classify("000216");
        assert_eq!(fund.canonical(), "000216.OF");
        assert_eq!(fund.confidence(), Confidence::Heuristic);
    }

    #[test]
    fn test_ambiguous_range_threshold() {
        let config = ClassifierConfig {
            rules_version: "1.1.0".to_string(),
            ambiguous_stock_exclusions: vec![1],
            ambiguous_stock_threshold: Some(500),
        };
        let classifier = InstrumentClassifier::from_config(&config).unwrap();

        assert_eq!(classifier.classify("000001").canonical(), "000001.SZ");
        assert_eq!(classifier.classify("000499").canonical(), "000499.OF");
        assert_eq!(classifier.classify("000500").canonical(), "000500.SZ");
        assert_eq!(classifier.rules_version(), &semver::Version::new(1, 1, 0));
    }

    #[test]
    fn test_unrecognized_codes_fall_back_to_fund() {
        let classifier = InstrumentClassifier::default();

        for code in ["ABC", "12345", "0012345", "", "003816"] {
            let instrument = classifier.classify(code);
            assert_eq!(instrument.kind(), InstrumentKind::Fund);
            assert_eq!(instrument.suffix(), CodeSuffix::Of);
            assert!(instrument.is_low_confidence());
        }

        assert!(classifier.classify_strict("ABC").is_err());
        assert!(classifier.classify_strict("600000").is_ok());
    }

    #[test]
    fn test_deterministic_and_accepts_suffixed_input() {
        let classifier = InstrumentClassifier::default();
        for code in ["000001", "600000", "159915", "999999", "xyz"] {
            assert_eq!(classifier.classify(code), classifier.classify(code));
        }
        assert_eq!(classifier.classify(" 600000.SH "), classifier.classify("600000"));
    }

    #[test]
    fn test_batch_preserves_order() {
        let classifier = InstrumentClassifier::default();
        let batch = classifier.classify_batch(&["600000", "000001", "110011"]);
        let ids: Vec<String> = batch.iter().map(|c| c.to_string()).collect();
        assert_eq!(ids, vec!["600000.SH", "000001.SZ", "110011.OF"]);
    }
}
