//! 基金分析引擎配置管理系统
//!
//! 支持YAML/TOML配置文件，按文件扩展名选择格式

use crate::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 引擎基础设置
    pub engine: EngineSettings,
    /// 证券分类规则
    pub classifier: ClassifierConfig,
    /// 数据提供方设置
    pub providers: ProviderSettings,
    /// 分析参数
    pub analysis: AnalysisSettings,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 引擎基础设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// 引擎名称
    pub name: String,
    /// 年化无风险利率
    pub risk_free_rate: f64,
    /// 低于该观测数的结果标记为低置信度
    pub low_confidence_observations: usize,
}

/// 证券分类规则配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// 规则版本（semver）
    pub rules_version: String,
    /// 000xxx区间中按股票处理的代码数值
    pub ambiguous_stock_exclusions: Vec<u32>,
    /// 000xxx区间中数值不小于该阈值的按股票处理，None表示关闭
    pub ambiguous_stock_threshold: Option<u32>,
}

/// 数据提供方设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// 单次数据调用超时（毫秒）
    pub timeout_ms: u64,
    /// 业绩基准代码
    pub benchmark_code: Option<String>,
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 分析参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// 风格一致性使用的历史持仓快照数（按季度回溯，含当期）
    pub style_history_snapshots: usize,
    /// 相邻快照因子向量余弦相似度低于该值视为风格漂移
    pub style_drift_threshold: f64,
    /// 单一行业超过权益仓位该比例视为行业集中
    pub industry_concentration_threshold: f64,
    /// 报告的主要行业个数
    pub top_industries: usize,
    /// 对比时最大并发基金数
    pub max_concurrent_funds: usize,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 日志输出目标
    pub targets: Vec<LogTarget>,
    /// 是否启用详细日志
    pub verbose: bool,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogTarget {
    Console,
    File(String),
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules_version: "1.0.0".to_string(),
            ambiguous_stock_exclusions: vec![1, 2, 99, 100, 858, 999],
            ambiguous_stock_threshold: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings {
                name: "FofAnalytics".to_string(),
                risk_free_rate: 0.02,
                low_confidence_observations: 20,
            },
            classifier: ClassifierConfig::default(),
            providers: ProviderSettings {
                timeout_ms: 10_000,
                benchmark_code: Some("000300.SH".to_string()),
            },
            analysis: AnalysisSettings {
                style_history_snapshots: 4,
                style_drift_threshold: 0.7,
                industry_concentration_threshold: 0.30,
                top_industries: 3,
                max_concurrent_funds: num_cpus::get().max(1) * 2,
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                targets: vec![LogTarget::Console],
                verbose: false,
            },
        }
    }
}

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
}

impl ConfigManager {
    /// 从文件加载配置
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await
            .map_err(|e| AnalyticsError::config(&format!("Failed to read config file: {}", e)))?;

        let config: EngineConfig = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| AnalyticsError::config(&format!("Failed to parse config file: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| AnalyticsError::config(&format!("Failed to parse config file: {}", e)))?,
        };

        Ok(Self { config })
    }

    /// 创建默认配置
    pub fn new_default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// 保存配置到文件
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => serde_yaml::to_string(&self.config)
                .map_err(|e| AnalyticsError::config(&format!("Failed to serialize config: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(&self.config)
                .map_err(|e| AnalyticsError::config(&format!("Failed to serialize config: {}", e)))?,
        };

        tokio::fs::write(path, content).await
            .map_err(|e| AnalyticsError::config(&format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// 获取配置
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let config = &self.config;

        if config.engine.name.is_empty() {
            return Err(AnalyticsError::config("Engine name cannot be empty"));
        }

        if !config.engine.risk_free_rate.is_finite() || config.engine.risk_free_rate < 0.0 {
            return Err(AnalyticsError::config("Risk-free rate must be a non-negative number"));
        }

        semver::Version::parse(&config.classifier.rules_version).map_err(|e| {
            AnalyticsError::config(&format!(
                "Classifier rules version '{}' is not semver: {}",
                config.classifier.rules_version, e
            ))
        })?;

        if config.providers.timeout_ms == 0 {
            return Err(AnalyticsError::config("Provider timeout must be positive"));
        }

        let drift = config.analysis.style_drift_threshold;
        if !(drift > 0.0 && drift <= 1.0) {
            return Err(AnalyticsError::config("Style drift threshold must be in (0, 1]"));
        }

        let industry = config.analysis.industry_concentration_threshold;
        if !(industry > 0.0 && industry <= 1.0) {
            return Err(AnalyticsError::config("Industry concentration threshold must be in (0, 1]"));
        }

        if config.analysis.max_concurrent_funds == 0 {
            return Err(AnalyticsError::config("Max concurrent funds must be positive"));
        }

        tracing::info!("Configuration validation passed");
        Ok(())
    }
}

/// 生成默认配置文件
pub async fn generate_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let config_manager = ConfigManager::new_default();
    config_manager.save_to_file(path).await?;
    Ok(())
}
