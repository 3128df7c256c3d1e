//! 基金分析引擎核心数据类型模块
//!
//! 证券代码、持仓快照、因子向量、收益序列与分析结果

pub mod instrument;
pub mod portfolio;
pub mod series;
pub mod analysis;

// 重新导出所有公共类型
pub use instrument::*;
pub use portfolio::*;
pub use series::*;
pub use analysis::*;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// 基金代码
pub type FundCode = String;

/// 年化交易日数
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// A股全年交易日的保守下限（春节、国庆长假后约242~245天）
pub const MIN_TRADING_DAYS_PER_YEAR: f64 = 240.0;

/// 季度持仓快照间隔（天）
pub const QUARTER_DAYS: i64 = 91;

/// 分析周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "since_inception")]
    SinceInception,
}

impl Period {
    pub const ALL: [Period; 8] = [
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::ThreeYears,
        Period::FiveYears,
        Period::SinceInception,
    ];

    /// 回看的交易日数量，成立以来返回None
    pub fn trading_days(self) -> Option<usize> {
        match self {
            Period::OneMonth => Some(21),
            Period::ThreeMonths => Some(63),
            Period::SixMonths => Some(126),
            Period::OneYear => Some(252),
            Period::TwoYears => Some(504),
            Period::ThreeYears => Some(756),
            Period::FiveYears => Some(1260),
            Period::SinceInception => None,
        }
    }

    /// 覆盖该交易日窗口所需的自然日数
    ///
    /// 按每年至少240个交易日换算并留出余量，取回后再截取最近的交易日。
    pub fn calendar_days(self) -> Option<i64> {
        self.trading_days()
            .map(|days| (days as f64 * 365.0 / MIN_TRADING_DAYS_PER_YEAR).ceil() as i64 + 30)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::ThreeYears => "3y",
            Period::FiveYears => "5y",
            Period::SinceInception => "since_inception",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = crate::AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::AnalyticsError::validation(&format!("Unknown period: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_windows() {
        assert_eq!(Period::OneYear.trading_days(), Some(252));
        assert_eq!(Period::FiveYears.trading_days(), Some(1260));
        assert_eq!(Period::SinceInception.trading_days(), None);
        // 自然日窗口必须覆盖交易日窗口
        for period in Period::ALL {
            if let (Some(trading), Some(calendar)) = (period.trading_days(), period.calendar_days()) {
                assert!(calendar as usize > trading);
            }
        }
    }

    #[test]
    fn test_calendar_window_covers_holiday_calendar() {
        use chrono::{Datelike, Duration, NaiveDate, Weekday};

        // 周末加春节、国庆长假，每年约245个交易日
        let is_trading_day = |d: NaiveDate| {
            let holiday = (d.month() == 2 && d.day() <= 14) || (d.month() == 10 && d.day() <= 7);
            !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) && !holiday
        };
        let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();

        for period in Period::ALL {
            let (Some(trading), Some(calendar)) = (period.trading_days(), period.calendar_days()) else {
                continue;
            };
            let available = (0..=calendar)
                .map(|offset| end - Duration::days(offset))
                .filter(|d| is_trading_day(*d))
                .count();
            assert!(available >= trading, "{} window holds only {} trading days", period, available);
        }
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("3m".parse::<Period>().unwrap(), Period::ThreeMonths);
        assert_eq!("since_inception".parse::<Period>().unwrap(), Period::SinceInception);
        assert!("7y".parse::<Period>().is_err());
        assert_eq!(Period::TwoYears.to_string(), "2y");
    }
}
