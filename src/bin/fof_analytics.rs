//! FofAnalytics 主程序
//!
//! 生成配置、证券代码分类，以及基于模拟数据的多基金对比演示

use anyhow::{bail, Context, Result};
use fof_analytics::{
    config::{generate_default_config_file, ConfigManager},
    data::MockMarket,
    AnalysisCache, AnalysisEngine, ComparisonResult, InstrumentClassifier, Period,
};
use std::env;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "fof_analytics_config.yaml";
const DEMO_FUNDS: [&str; 4] = ["110011", "161725", "005827", "519674"];

/// 程序入口点
#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            tracing::error!("❌ 程序运行失败: {:#}", e);
            eprintln!("错误: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => run_demo(None, Period::OneYear, false).await,
        Some("init") => generate_config_file(args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH)).await,
        Some("classify") => classify_codes(&args[1..]),
        Some("demo") => {
            let mut config_path = None;
            let mut period = Period::OneYear;
            let mut json = false;
            let mut rest = args[1..].iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--json" => json = true,
                    "--period" => {
                        let value = rest.next().context("--period 需要一个参数")?;
                        period = value.parse()?;
                    }
                    path => config_path = Some(path.to_string()),
                }
            }
            run_demo(config_path.as_deref(), period, json).await
        }
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("未知命令: {}", other)
        }
    }
}

async fn load_config(config_path: Option<&str>) -> Result<ConfigManager> {
    let config_manager = match config_path {
        Some(path) => {
            if !Path::new(path).exists() {
                bail!("配置文件不存在: {} (使用 'fof_analytics init' 生成默认配置)", path);
            }
            ConfigManager::load_from_file(path).await?
        }
        None => ConfigManager::new_default(),
    };
    fof_analytics::initialize(&config_manager.get_config().logging)?;
    config_manager.validate()?;
    Ok(config_manager)
}

/// 基于模拟数据对比一组基金
async fn run_demo(config_path: Option<&str>, period: Period, json: bool) -> Result<()> {
    let config_manager = load_config(config_path).await?;
    let config = config_manager.get_config().clone();
    tracing::info!("🚀 启动 {} 演示 [{}]", config.engine.name, period);

    let as_of = chrono::Local::now().date_naive();
    let market = MockMarket::generate(
        &DEMO_FUNDS,
        config.providers.benchmark_code.as_deref(),
        as_of,
        config.analysis.style_history_snapshots,
    )
    .await?;
    let data = market.data_manager(config.providers.timeout());
    let engine = AnalysisEngine::new(config, data, Arc::new(AnalysisCache::new()))?;

    let comparison = engine.compare_funds(&DEMO_FUNDS, period).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        display_comparison(&comparison);
    }

    let stats = engine.cache_stats();
    tracing::info!(
        "📊 缓存统计: 计算={}, 命中率={:.2}%",
        stats.computations,
        stats.hit_rate() * 100.0
    );
    Ok(())
}

/// 分类命令行给出的证券代码
fn classify_codes(args: &[String]) -> Result<()> {
    let strict = args.iter().any(|a| a == "--strict");
    let codes: Vec<&String> = args.iter().filter(|a| a.as_str() != "--strict").collect();
    if codes.is_empty() {
        bail!("classify 至少需要一个证券代码");
    }

    let config_manager = ConfigManager::new_default();
    fof_analytics::initialize(&config_manager.get_config().logging)?;
    let classifier = InstrumentClassifier::from_config(&config_manager.get_config().classifier)?;

    for code in codes {
        let instrument = if strict {
            classifier.classify_strict(code)?
        } else {
            classifier.classify(code)
        };
        println!(
            "{:<12} {:<14} {:?} / {:?}",
            code,
            instrument.canonical(),
            instrument.kind(),
            instrument.confidence()
        );
    }
    Ok(())
}

async fn generate_config_file(config_path: &str) -> Result<()> {
    fof_analytics::initialize(&ConfigManager::new_default().get_config().logging)?;
    tracing::info!("📝 生成默认配置文件: {}", config_path);

    generate_default_config_file(config_path).await?;

    tracing::info!("✅ 配置文件生成完成");
    tracing::info!("🔧 请编辑配置文件后运行: fof_analytics demo {}", config_path);
    Ok(())
}

fn display_comparison(comparison: &ComparisonResult) {
    println!("📈 基金对比 [{}]", comparison.period);
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "基金", "总收益", "波动率", "夏普", "最大回撤", "评分"
    );

    let mut ranked: Vec<_> = comparison.per_fund.values().collect();
    ranked.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
    for result in ranked {
        println!(
            "{:<10} {:>10} {:>10} {:>10} {:>10} {:>8.1}",
            result.fund_code,
            percent(result.returns.total_return),
            percent(result.risk.volatility),
            number(result.risk.sharpe_ratio),
            percent(result.risk.max_drawdown),
            result.overall_score
        );
    }

    let summary = &comparison.summary;
    println!();
    println!("🏆 收益最高: {}", summary.best_return.as_deref().unwrap_or("-"));
    println!("🛡️  风险最低: {}", summary.lowest_risk.as_deref().unwrap_or("-"));
    println!("⚖️  夏普最高: {}", summary.best_sharpe.as_deref().unwrap_or("-"));

    for failure in &comparison.failures {
        println!("❌ {}: {}", failure.fund_code, failure.error);
    }
}

fn percent(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v * 100.0)).unwrap_or_else(|| "-".to_string())
}

fn number(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_usage() {
    println!("FofAnalytics 基金组合量化分析引擎");
    println!();
    println!("用法:");
    println!("  fof_analytics                                   # 默认配置运行演示");
    println!("  fof_analytics init [config_file]                # 生成默认配置文件");
    println!("  fof_analytics classify [--strict] <code>...     # 证券代码分类");
    println!("  fof_analytics demo [config_file] [--period 1y] [--json]");
    println!();
    println!("示例:");
    println!("  fof_analytics init");
    println!("  fof_analytics classify 600519 000001 110011");
    println!("  fof_analytics demo {} --period 6m", DEFAULT_CONFIG_PATH);
    println!();
    println!("配置文件格式: YAML 或 TOML (按扩展名识别)");
}
