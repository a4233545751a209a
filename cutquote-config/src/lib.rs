use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cutquote_core::catalog::{PricingEntry, PricingTable, Settings};
use cutquote_core::units::{DisplayUnit, EnteredValue, UnitError};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub pricing: Vec<PricingRow>,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `CUTQUOTE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("CUTQUOTE_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 当前全局设置的快照。
    pub fn settings(&self) -> Settings {
        self.settings.to_settings()
    }

    /// 把录入值换算为规范单位后构建价格表，重复键以后出现者为准。
    pub fn pricing_table(&self) -> Result<PricingTable, ConfigError> {
        let mut table = PricingTable::new();
        for row in &self.pricing {
            let entry = row
                .to_entry()
                .map_err(|source| ConfigError::InvalidPricingRow {
                    material: row.material.clone(),
                    source,
                })?;
            if table.insert(entry).is_some() {
                warn!(material = %row.material, thickness = %row.thickness.as_text(), "价格表存在重复条目，已覆盖");
            }
        }
        Ok(table)
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub markup: f64,
    #[serde(default)]
    pub min_charge: f64,
    #[serde(default = "SettingsConfig::default_currency")]
    pub currency: String,
}

impl SettingsConfig {
    fn default_currency() -> String {
        "USD".to_string()
    }

    pub fn to_settings(&self) -> Settings {
        Settings::new(self.markup, self.min_charge, self.currency.clone())
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            markup: 0.0,
            min_charge: 0.0,
            currency: Self::default_currency(),
        }
    }
}

/// 数值既可以写成 TOML 数字，也可以写成分数字符串（如 `"1 1/4"`）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnteredNumber {
    Number(f64),
    Text(String),
}

impl EnteredNumber {
    pub fn as_text(&self) -> String {
        match self {
            EnteredNumber::Number(value) => value.to_string(),
            EnteredNumber::Text(text) => text.clone(),
        }
    }
}

/// 价格表的一行，数值保持管理端录入时的显示单位。
#[derive(Debug, Clone, Deserialize)]
pub struct PricingRow {
    pub material: String,
    pub thickness: EnteredNumber,
    #[serde(default)]
    pub thickness_unit: Option<String>,
    pub cost_per_area: EnteredNumber,
    #[serde(default)]
    pub cost_per_area_unit: Option<String>,
    /// $/小时，无需单位换算。
    pub cost_per_time: f64,
    pub cut_speed: EnteredNumber,
    #[serde(default)]
    pub cut_speed_unit: Option<String>,
}

impl PricingRow {
    pub fn to_entry(&self) -> Result<PricingEntry, UnitError> {
        PricingEntry::from_entered(
            self.material.clone(),
            entered_value(self.thickness.as_text(), self.thickness_unit.as_deref()),
            entered_value(self.cost_per_area.as_text(), self.cost_per_area_unit.as_deref()),
            self.cost_per_time,
            entered_value(self.cut_speed.as_text(), self.cut_speed_unit.as_deref()),
        )
    }
}

/// 组合录入文本与单位标记，未识别的单位标记按规范单位处理。
pub fn entered_value(text: impl Into<String>, unit: Option<&str>) -> EnteredValue {
    let unit = unit.and_then(|tag| match tag.parse::<DisplayUnit>() {
        Ok(unit) => Some(unit),
        Err(err) => {
            warn!(unit = tag, error = %err, "未知单位标记，按规范单位处理");
            None
        }
    });
    EnteredValue::new(text, unit)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("价格表条目 {material} 无效: {source}")]
    InvalidPricingRow {
        material: String,
        #[source]
        source: UnitError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutquote_core::catalog::PricingField;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.settings(), Settings::default());
        assert!(cfg.pricing.is_empty());
        assert!(cfg.pricing_table().expect("空价格表").is_empty());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [settings]
            markup = 15
            min_charge = 25.0
            currency = "CAD"

            [[pricing]]
            material = "steel"
            thickness = "1/8"
            thickness_unit = "in"
            cost_per_area = 0.0645
            cost_per_area_unit = "$/in2"
            cost_per_time = 50.0
            cut_speed = "100"
            cut_speed_unit = "in/min"

            [[pricing]]
            material = "acrylic"
            thickness = 6
            cost_per_area = 0.00002
            cost_per_time = 30.0
            cut_speed = 1200
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.settings(), Settings::new(15.0, 25.0, "CAD"));

        let table = cfg.pricing_table().expect("价格表应有效");
        assert_eq!(table.len(), 2);

        let steel = table.lookup("steel", 3.175).expect("1/8 in 钢板");
        assert!((steel.cost_per_area - 0.0645 / 645.16).abs() < 1e-15);
        assert!((steel.cut_speed - 2540.0).abs() < 1e-9);
        let (thickness, unit) = steel.display_value(PricingField::Thickness);
        assert!((thickness - 0.125).abs() < 1e-12);
        assert_eq!(unit, Some(DisplayUnit::INCH));

        let acrylic = table.lookup("acrylic", 6.0).expect("6mm 亚克力");
        assert_eq!(acrylic.cut_speed, 1200.0);
        assert_eq!(acrylic.cost_per_area, 0.00002);
    }

    #[test]
    fn unknown_unit_tags_pass_values_through() {
        let row = PricingRow {
            material: "brass".to_string(),
            thickness: EnteredNumber::Text("2".to_string()),
            thickness_unit: Some("cubits".to_string()),
            cost_per_area: EnteredNumber::Number(0.001),
            cost_per_area_unit: None,
            cost_per_time: 10.0,
            cut_speed: EnteredNumber::Number(500.0),
            cut_speed_unit: None,
        };
        let entry = row.to_entry().expect("未知单位不应报错");
        assert_eq!(entry.thickness, 2.0);
        assert_eq!(entry.cut_speed, 500.0);
    }

    #[test]
    fn invalid_fraction_in_pricing_row_is_reported() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [[pricing]]
            material = "steel"
            thickness = "1/0"
            cost_per_area = 1
            cost_per_time = 1
            cut_speed = 1
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("TOML 本身合法");
        match cfg.pricing_table() {
            Err(ConfigError::InvalidPricingRow { material, source }) => {
                assert_eq!(material, "steel");
                assert_eq!(source, UnitError::ZeroDenominator("1/0".to_string()));
            }
            other => panic!("expected invalid row error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[settings\nmarkup = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
