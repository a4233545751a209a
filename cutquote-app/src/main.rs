use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cutquote_app::{analyze_file, quote};
use cutquote_config::{AppConfig, ConfigError, entered_value};
use cutquote_engine::{Extraction, Metrics, PriceBreakdown, ShapeKind};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "cutquote", version, about = "根据 DXF 图纸估算切割报价")]
struct Cli {
    /// 指定配置文件，缺省时按 CUTQUOTE_CONFIG 与 ./config/default.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 提取几何并打印指标
    Inspect { file: PathBuf },
    /// 按材料与厚度计价
    Quote {
        file: PathBuf,
        #[arg(long)]
        material: String,
        /// 支持分数，例如 `1/8` 或 `1 1/4`
        #[arg(long)]
        thickness: String,
        /// 厚度单位，例如 `mm` 或 `in`
        #[arg(long)]
        unit: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteOutput<'a> {
    material: &'a str,
    thickness: f64,
    metrics: &'a Metrics,
    price: &'a PriceBreakdown,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.as_deref());
    init_logging(&config);
    info!("启动 cutquote");

    match &cli.command {
        Command::Inspect { file } => {
            let extraction = analyze_file(file)
                .with_context(|| format!("无法分析 DXF 文件 {}", file.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&extraction)?);
            } else {
                print_extraction(&extraction);
            }
        }
        Command::Quote {
            file,
            material,
            thickness,
            unit,
        } => {
            let table = config.pricing_table().context("价格表配置无效")?;
            let settings = config.settings();
            let extraction = analyze_file(file)
                .with_context(|| format!("无法分析 DXF 文件 {}", file.display()))?;
            let thickness = entered_value(thickness.as_str(), unit.as_deref());
            let breakdown = quote(&extraction, &table, &settings, material, &thickness)?;
            if cli.json {
                let output = QuoteOutput {
                    material,
                    thickness: thickness.canonical()?,
                    metrics: &extraction.metrics,
                    price: &breakdown,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_metrics(&extraction);
                print_breakdown(&breakdown);
            }
        }
    }
    Ok(())
}

fn load_configuration(override_path: Option<&Path>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::InvalidPricingRow { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

/// 日志写到 stderr，stdout 只保留结果。
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

fn print_metrics(extraction: &Extraction) {
    let m = &extraction.metrics;
    println!("实体数量: {}", m.entity_count);
    println!("宽度: {:.2} mm", m.width);
    println!("高度: {:.2} mm", m.height);
    println!("切割总长: {:.2} mm", m.total_length);
    println!("面积: {:.2} mm²", m.area);
}

fn print_extraction(extraction: &Extraction) {
    print_metrics(extraction);
    for shape in &extraction.entities {
        let kind = match &shape.kind {
            ShapeKind::Line => "line",
            ShapeKind::Circle { .. } => "circle",
            ShapeKind::Arc { .. } => "arc",
            ShapeKind::Polyline { .. } => "polyline",
            ShapeKind::Spline => "spline",
        };
        println!(
            "  - {kind} 图层={} 点数={} 长度={:.2} mm",
            shape.layer,
            shape.points.len(),
            shape.length
        );
    }
}

fn print_breakdown(breakdown: &PriceBreakdown) {
    let currency = &breakdown.currency;
    println!("面积成本: {:.2} {currency}", breakdown.area_cost);
    println!(
        "时间成本: {:.2} {currency} ({:.2} 分钟)",
        breakdown.time_cost, breakdown.details.cut_time_minutes
    );
    println!("小计: {:.2} {currency}", breakdown.subtotal);
    println!("加价: {:.2} {currency}", breakdown.markup_amount);
    println!("报价: {:.2} {currency}", breakdown.final_price);
    if breakdown.min_charge_applied {
        println!("已按最低收费计价");
    }
}
