//! 引擎服务层模块
//!
//! 单飞分析缓存、单基金分析流水线与多基金对比

pub mod analysis_cache;
pub mod analysis_engine;
pub mod fund_comparator;

// 重新导出核心服务
pub use analysis_cache::*;
pub use analysis_engine::*;
pub use fund_comparator::*;
