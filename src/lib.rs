//! FofAnalytics - 基金组合量化分析引擎
//!
//! 把持仓与净值数据转化为风险、绩效和分散化指标，支持单基金分析与多基金对比
//!
//! # 模块分层
//!
//! - **数据访问层**: 持仓、净值、因子三类提供方接口与超时控制
//! - **计算层**: 代码分类、因子暴露聚合、风险指标、集中度分析，均为纯计算
//! - **服务层**: 单飞分析缓存、单基金分析流水线、多基金对比
//!
//! # 示例
//!
//! ```no_run
//! use fof_analytics::{AnalysisEngine, EngineConfig, Period};
//! use fof_analytics::data::MockMarket;
//! use std::sync::Arc;
//!
//! # async fn run() -> fof_analytics::Result<()> {
//! let config = EngineConfig::default();
//! let as_of = chrono::NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
//! let market = MockMarket::generate(&["110011", "161725"], Some("000300.SH"), as_of, 4).await?;
//! let data = market.data_manager(config.providers.timeout());
//! let engine = AnalysisEngine::new(config, data, Arc::new(Default::default()))?;
//!
//! let comparison = engine.compare_funds(&["110011", "161725"], Period::OneYear).await;
//! println!("{:?}", comparison.summary);
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod classifier;
pub mod factors;
pub mod metrics;
pub mod concentration;
pub mod data;
pub mod services;

// 重新导出核心类型
pub use types::*;
pub use error::*;
pub use services::*;
pub use classifier::InstrumentClassifier;
pub use concentration::ConcentrationAnalyzer;
pub use config::{ConfigManager, EngineConfig, LogTarget, LoggingConfig};
pub use factors::FactorAggregator;
pub use metrics::MetricsEngine;

/// 引擎信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ENGINE_NAME: &str = "FofAnalytics";

/// 按日志配置初始化 tracing，重复调用时保留已有的订阅者
pub fn initialize(logging: &LoggingConfig) -> Result<()> {
    let level = logging.level.as_tracing_level();
    let log_file = logging.targets.iter().find_map(|target| match target {
        LogTarget::File(path) => Some(path.clone()),
        LogTarget::Console => None,
    });

    let installed = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(logging.verbose)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(logging.verbose)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!("🚀 Initializing {} v{}", ENGINE_NAME, VERSION);
    } else {
        tracing::debug!("tracing subscriber already installed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_info() {
        assert_eq!(ENGINE_NAME, "FofAnalytics");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let logging = EngineConfig::default().logging;
        assert!(initialize(&logging).is_ok());
        assert!(initialize(&logging).is_ok());
    }
}
