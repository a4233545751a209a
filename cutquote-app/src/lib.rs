//! 上传解析与报价的组合入口，CLI 与后续服务层共用。

use std::path::Path;

use cutquote_core::catalog::{PricingTable, Settings};
use cutquote_core::units::{EnteredValue, UnitError};
use cutquote_config::ConfigError;
use cutquote_engine::{ExtractError, Extraction, PriceBreakdown, calculate_price, extract};
use cutquote_io::{DocumentLoader, DxfFacade, IoError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("厚度输入无效: {0}")]
    Unit(#[from] UnitError),
    #[error("价格表中没有材料 {material} 厚度 {thickness}mm 的条目")]
    UnknownPricingEntry { material: String, thickness: f64 },
}

/// 解析上传的 DXF 文本并提取几何与指标。
pub fn analyze_dxf(text: &str) -> Result<Extraction, QuoteError> {
    let document = DxfFacade::new().parse_str(text)?;
    Ok(extract(&document)?)
}

pub fn analyze_file(path: &Path) -> Result<Extraction, QuoteError> {
    let document = DxfFacade::new().load(path)?;
    let extraction = extract(&document)?;
    info!(
        path = %path.display(),
        entities = extraction.metrics.entity_count,
        "DXF 分析完成"
    );
    Ok(extraction)
}

/// 按材料与录入厚度查表后计价。
pub fn quote(
    extraction: &Extraction,
    table: &PricingTable,
    settings: &Settings,
    material: &str,
    thickness: &EnteredValue,
) -> Result<PriceBreakdown, QuoteError> {
    let thickness_mm = thickness.canonical()?;
    let entry = table
        .lookup(material, thickness_mm)
        .ok_or_else(|| QuoteError::UnknownPricingEntry {
            material: material.to_string(),
            thickness: thickness_mm,
        })?;
    Ok(calculate_price(
        Some(&extraction.metrics),
        Some(entry),
        Some(settings),
    ))
}
