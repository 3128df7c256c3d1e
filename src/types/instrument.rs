//! 证券代码相关类型定义

use super::*;

/// 交易场所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Sse,    // 上交所
    Szse,   // 深交所
    Bse,    // 北交所
}

/// 证券类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    Stock,
    Fund,
    Etf,
}

/// 代码后缀
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeSuffix {
    Sh,
    Sz,
    Bj,
    Of,
}

impl CodeSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            CodeSuffix::Sh => "SH",
            CodeSuffix::Sz => "SZ",
            CodeSuffix::Bj => "BJ",
            CodeSuffix::Of => "OF",
        }
    }
}

/// 分类置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    High,
    /// 命中歧义区间的启发式规则
    Heuristic,
    /// 未匹配任何规则，按基金兜底
    Low,
}

/// 已解析的证券代码，解析后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentCode {
    raw: String,
    /// 场外开放式基金没有交易场所
    market: Option<Market>,
    kind: InstrumentKind,
    suffix: CodeSuffix,
    confidence: Confidence,
}

impl InstrumentCode {
    pub(crate) fn new(
        raw: String,
        market: Option<Market>,
        kind: InstrumentKind,
        suffix: CodeSuffix,
        confidence: Confidence,
    ) -> Self {
        Self { raw, market, kind, suffix, confidence }
    }

    /// 原始数字代码
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn market(&self) -> Option<Market> {
        self.market
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    pub fn suffix(&self) -> CodeSuffix {
        self.suffix
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// 带后缀的标准代码，如 `600000.SH`
    pub fn canonical(&self) -> String {
        format!("{}.{}", self.raw, self.suffix.as_str())
    }

    pub fn is_low_confidence(&self) -> bool {
        self.confidence == Confidence::Low
    }

    /// ETF同样视为基金
    pub fn is_fund(&self) -> bool {
        matches!(self.kind, InstrumentKind::Fund | InstrumentKind::Etf)
    }

    pub fn is_stock(&self) -> bool {
        self.kind == InstrumentKind::Stock
    }
}

impl Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.raw, self.suffix.as_str())
    }
}
