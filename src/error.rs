//! 基金分析引擎错误处理系统
//!
//! 统一的错误类型；引擎层所有错误都以单只基金为作用域，不存在致命错误

use thiserror::Error;

/// 引擎统一错误类型
#[derive(Error, Debug, Clone)]
pub enum AnalyticsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data unavailable for fund {fund_code}: {message}")]
    DataUnavailable { fund_code: String, message: String },

    #[error("Insufficient history for {statistic}: required {required}, got {actual}")]
    InsufficientHistory { statistic: String, required: usize, actual: usize },

    #[error("Ambiguous classification for code {code}")]
    ClassificationAmbiguous { code: String },

    #[error("Cache computation failed for {key}: {message}")]
    CacheComputationFailed { key: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl From<std::io::Error> for AnalyticsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for AnalyticsError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl AnalyticsError {
    /// 创建数据不可用错误
    pub fn data_unavailable(fund_code: &str, message: &str) -> Self {
        Self::DataUnavailable {
            fund_code: fund_code.to_string(),
            message: message.to_string(),
        }
    }

    /// 创建历史数据不足错误
    pub fn insufficient_history(statistic: &str, required: usize, actual: usize) -> Self {
        Self::InsufficientHistory {
            statistic: statistic.to_string(),
            required,
            actual,
        }
    }

    /// 创建缓存计算失败错误
    pub fn cache_failed(key: &str, message: &str) -> Self {
        Self::CacheComputationFailed {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// 创建配置相关错误
    pub fn config(message: &str) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// 创建验证相关错误
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }

    /// 是否为单只基金范围内的错误
    pub fn is_fund_scoped(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. }
                | Self::InsufficientHistory { .. }
                | Self::ClassificationAmbiguous { .. }
                | Self::CacheComputationFailed { .. }
        )
    }

    /// 转换为调用方可见的数据不可用错误
    pub fn into_data_unavailable(self, fund_code: &str) -> Self {
        match self {
            Self::DataUnavailable { .. } => self,
            other => Self::data_unavailable(fund_code, &other.to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AnalyticsError>;
