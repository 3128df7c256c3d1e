//! 收益序列相关类型定义

use super::*;
use chrono::NaiveDate;

/// 单期收益
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// 按日期严格递增的收益序列；缺失的交易日直接跳过，不补零
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReturnSeries")]
pub struct ReturnSeries {
    code: String,
    points: Vec<ReturnPoint>,
}

/// 反序列化中间形态，统一经过 `ReturnSeries::new` 校验
#[derive(Deserialize)]
struct RawReturnSeries {
    code: String,
    points: Vec<ReturnPoint>,
}

impl TryFrom<RawReturnSeries> for ReturnSeries {
    type Error = crate::AnalyticsError;

    fn try_from(raw: RawReturnSeries) -> std::result::Result<Self, Self::Error> {
        Self::new(&raw.code, raw.points)
    }
}

impl ReturnSeries {
    /// 创建收益序列，日期必须严格递增
    pub fn new(code: &str, points: Vec<ReturnPoint>) -> crate::Result<Self> {
        if let Some(pair) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(crate::AnalyticsError::validation(&format!(
                "Return series {} is not strictly date-ordered at {}",
                code, pair[1].date
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(crate::AnalyticsError::validation(&format!(
                "Return series {} has non-finite value at {}",
                code, bad.date
            )));
        }

        Ok(Self {
            code: code.to_string(),
            points,
        })
    }

    /// 由 (日期, 收益) 列表创建
    pub fn from_pairs(code: &str, pairs: Vec<(NaiveDate, f64)>) -> crate::Result<Self> {
        let points = pairs
            .into_iter()
            .map(|(date, value)| ReturnPoint { date, value })
            .collect();
        Self::new(code, points)
    }

    /// 由单位净值序列计算日收益，首个净值只作为基准
    pub fn from_navs(code: &str, navs: &[(NaiveDate, f64)]) -> crate::Result<Self> {
        let mut points = Vec::with_capacity(navs.len().saturating_sub(1));
        for w in navs.windows(2) {
            let (prev_date, prev_nav) = w[0];
            let (date, nav) = w[1];
            if date <= prev_date {
                return Err(crate::AnalyticsError::validation(&format!(
                    "NAV series {} is not strictly date-ordered at {}",
                    code, date
                )));
            }
            if prev_nav <= 0.0 {
                return Err(crate::AnalyticsError::validation(&format!(
                    "NAV series {} has non-positive value at {}",
                    code, prev_date
                )));
            }
            points.push(ReturnPoint { date, value: nav / prev_nav - 1.0 });
        }
        Self::new(code, points)
    }

    pub fn empty(code: &str) -> Self {
        Self {
            code: code.to_string(),
            points: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// 取最近n个观测
    pub fn last_n(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            code: self.code.clone(),
            points: self.points[start..].to_vec(),
        }
    }

    /// 截取不晚于end的部分
    pub fn until(&self, end: NaiveDate) -> Self {
        Self {
            code: self.code.clone(),
            points: self.points.iter().copied().filter(|p| p.date <= end).collect(),
        }
    }

    /// 按日期内连接，返回 (日期, 本序列收益, 另一序列收益)
    pub fn inner_join(&self, other: &ReturnSeries) -> Vec<(NaiveDate, f64, f64)> {
        let mut joined = Vec::with_capacity(self.len().min(other.len()));
        let (mut i, mut j) = (0, 0);
        while i < self.points.len() && j < other.points.len() {
            let (a, b) = (self.points[i], other.points[j]);
            match a.date.cmp(&b.date) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    joined.push((a.date, a.value, b.value));
                    i += 1;
                    j += 1;
                }
            }
        }
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_rejects_unordered_dates() {
        let result = ReturnSeries::from_pairs("F1", vec![(d(2), 0.01), (d(1), 0.02)]);
        assert!(result.is_err());

        let duplicated = ReturnSeries::from_pairs("F1", vec![(d(1), 0.01), (d(1), 0.02)]);
        assert!(duplicated.is_err());
    }

    #[test]
    fn test_deserialize_validates_order_and_values() {
        let ordered = r#"{"code":"110011","points":[{"date":"2024-01-02","value":0.01},{"date":"2024-01-03","value":-0.02}]}"#;
        let series: ReturnSeries = serde_json::from_str(ordered).unwrap();
        assert_eq!(series.len(), 2);

        let unordered = r#"{"code":"110011","points":[{"date":"2024-01-03","value":0.01},{"date":"2024-01-02","value":-0.02}]}"#;
        let err = serde_json::from_str::<ReturnSeries>(unordered).unwrap_err();
        assert!(err.to_string().contains("not strictly date-ordered"));

        let duplicated = r#"{"code":"110011","points":[{"date":"2024-01-02","value":0.01},{"date":"2024-01-02","value":0.02}]}"#;
        assert!(serde_json::from_str::<ReturnSeries>(duplicated).is_err());
    }

    #[test]
    fn test_from_navs() {
        let series = ReturnSeries::from_navs("F1", &[(d(1), 1.0), (d(4), 1.1), (d(5), 0.99)]).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series.points()[0].value - 0.1).abs() < 1e-12);
        assert!((series.points()[1].value + 0.1).abs() < 1e-12);
        assert_eq!(series.first_date(), Some(d(4)));
    }

    #[test]
    fn test_inner_join_drops_unmatched_dates() {
        let a = ReturnSeries::from_pairs("A", vec![(d(1), 0.01), (d(2), 0.02), (d(4), 0.04)]).unwrap();
        let b = ReturnSeries::from_pairs("B", vec![(d(2), -0.02), (d(3), -0.03), (d(4), -0.04)]).unwrap();

        let joined = a.inner_join(&b);
        assert_eq!(joined, vec![(d(2), 0.02, -0.02), (d(4), 0.04, -0.04)]);
    }

    #[test]
    fn test_last_n() {
        let series = ReturnSeries::from_pairs("A", vec![(d(1), 0.01), (d(2), 0.02), (d(3), 0.03)]).unwrap();
        assert_eq!(series.last_n(2).values(), vec![0.02, 0.03]);
        assert_eq!(series.last_n(10).len(), 3);
    }
}
