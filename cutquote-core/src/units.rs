//! 数值与单位归一化：把用户输入的十进制、分数或带分数字符串解析为数值，
//! 并在显示单位与内部规范单位（mm、mm²、mm/min）之间换算。

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MILLIMETERS_PER_INCH: f64 = 25.4;
pub const SQUARE_MILLIMETERS_PER_SQUARE_INCH: f64 = 645.16;

static MIXED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(?:\s+|\s*-\s*)(\d+)/(\d+)$").expect("带分数正则表达式无效")
});
static SIMPLE_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)/(\d+)$").expect("分数正则表达式无效"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("输入为空")]
    Empty,
    #[error("无法解析的数值 \"{0}\"")]
    Malformed(String),
    #[error("分母为 0：\"{0}\"")]
    ZeroDenominator(String),
    #[error("未知的单位标记 \"{0}\"")]
    UnknownUnit(String),
}

/// 按优先级依次尝试：带分数（`1 1/4`、`1-1/4`）、简单分数（`1/8`）、十进制。
/// 含 `/` 但不符合分数语法的输入直接判为无效，不回退到十进制解析。
pub fn parse_fractional(text: &str) -> Result<f64, UnitError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(UnitError::Empty);
    }

    if let Some(caps) = MIXED_NUMBER.captures(trimmed) {
        let whole = parse_integer(&caps[1], trimmed)?;
        let fraction = divide(&caps[2], &caps[3], trimmed)?;
        return Ok(whole + fraction);
    }

    if let Some(caps) = SIMPLE_FRACTION.captures(trimmed) {
        return divide(&caps[1], &caps[2], trimmed);
    }

    if trimmed.contains('/') {
        return Err(UnitError::Malformed(trimmed.to_string()));
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(UnitError::Malformed(trimmed.to_string())),
    }
}

/// 与 [`parse_fractional`] 相同，但以 `NaN` 表示无效输入，供表单层直接使用。
pub fn parse_fractional_input(text: &str) -> f64 {
    parse_fractional(text).unwrap_or(f64::NAN)
}

fn parse_integer(digits: &str, source: &str) -> Result<f64, UnitError> {
    digits
        .parse::<u64>()
        .map(|value| value as f64)
        .map_err(|_| UnitError::Malformed(source.to_string()))
}

fn divide(numerator: &str, denominator: &str, source: &str) -> Result<f64, UnitError> {
    let num = parse_integer(numerator, source)?;
    let den = parse_integer(denominator, source)?;
    if den == 0.0 {
        return Err(UnitError::ZeroDenominator(source.to_string()));
    }
    Ok(num / den)
}

/// 物理量种类，决定换算系数的幂次与方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Length,
    Area,
    /// 单位面积成本，规范单位为 $/mm²，换算方向与面积相反。
    CostPerArea,
    /// 每分钟速度，规范单位为 mm/min。
    Speed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Millimeter,
    Centimeter,
    Meter,
    Inch,
    Foot,
}

impl LengthUnit {
    pub fn millimeters(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
            LengthUnit::Inch => MILLIMETERS_PER_INCH,
            LengthUnit::Foot => MILLIMETERS_PER_INCH * 12.0,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Meter => "m",
            LengthUnit::Inch => "in",
            LengthUnit::Foot => "ft",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "mm" => Some(LengthUnit::Millimeter),
            "cm" => Some(LengthUnit::Centimeter),
            "m" => Some(LengthUnit::Meter),
            "in" | "inch" | "inches" | "\"" => Some(LengthUnit::Inch),
            "ft" | "feet" | "foot" | "'" => Some(LengthUnit::Foot),
            _ => None,
        }
    }
}

/// 管理端录入时选择的显示单位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayUnit {
    pub quantity: Quantity,
    pub length: LengthUnit,
}

impl DisplayUnit {
    pub const MILLIMETER: Self = Self::new(Quantity::Length, LengthUnit::Millimeter);
    pub const INCH: Self = Self::new(Quantity::Length, LengthUnit::Inch);
    pub const SQUARE_MILLIMETER: Self = Self::new(Quantity::Area, LengthUnit::Millimeter);
    pub const SQUARE_INCH: Self = Self::new(Quantity::Area, LengthUnit::Inch);
    pub const COST_PER_SQUARE_MILLIMETER: Self =
        Self::new(Quantity::CostPerArea, LengthUnit::Millimeter);
    pub const COST_PER_SQUARE_INCH: Self = Self::new(Quantity::CostPerArea, LengthUnit::Inch);
    pub const MILLIMETERS_PER_MINUTE: Self = Self::new(Quantity::Speed, LengthUnit::Millimeter);
    pub const INCHES_PER_MINUTE: Self = Self::new(Quantity::Speed, LengthUnit::Inch);

    pub const fn new(quantity: Quantity, length: LengthUnit) -> Self {
        Self { quantity, length }
    }

    /// 显示单位到规范单位的乘数（单位面积成本为除数）。
    fn factor(self) -> f64 {
        let mm = self.length.millimeters();
        match self.quantity {
            Quantity::Length | Quantity::Speed => mm,
            Quantity::Area | Quantity::CostPerArea => mm * mm,
        }
    }

    pub fn to_canonical(self, value: f64) -> f64 {
        match self.quantity {
            Quantity::CostPerArea => value / self.factor(),
            _ => value * self.factor(),
        }
    }

    pub fn from_canonical(self, value: f64) -> f64 {
        match self.quantity {
            Quantity::CostPerArea => value * self.factor(),
            _ => value / self.factor(),
        }
    }
}

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.length.symbol();
        match self.quantity {
            Quantity::Length => write!(f, "{symbol}"),
            Quantity::Area => write!(f, "{symbol}2"),
            Quantity::CostPerArea => write!(f, "$/{symbol}2"),
            Quantity::Speed => write!(f, "{symbol}/min"),
        }
    }
}

impl FromStr for DisplayUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        let unknown = || UnitError::UnknownUnit(s.trim().to_string());

        if tag == "ipm" {
            return Ok(Self::INCHES_PER_MINUTE);
        }
        if let Some(symbol) = tag.strip_suffix("/min") {
            let length = LengthUnit::from_symbol(symbol.trim()).ok_or_else(unknown)?;
            return Ok(Self::new(Quantity::Speed, length));
        }
        if let Some(area) = tag.strip_prefix("$/") {
            let length = area_symbol(area.trim()).ok_or_else(unknown)?;
            return Ok(Self::new(Quantity::CostPerArea, length));
        }
        if let Some(length) = area_symbol(&tag) {
            return Ok(Self::new(Quantity::Area, length));
        }
        let length = LengthUnit::from_symbol(&tag).ok_or_else(unknown)?;
        Ok(Self::new(Quantity::Length, length))
    }
}

fn area_symbol(tag: &str) -> Option<LengthUnit> {
    let base = tag
        .strip_suffix("^2")
        .or_else(|| tag.strip_suffix('²'))
        .or_else(|| tag.strip_suffix('2'))?;
    LengthUnit::from_symbol(base)
}

impl TryFrom<String> for DisplayUnit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DisplayUnit> for String {
    fn from(value: DisplayUnit) -> Self {
        value.to_string()
    }
}

/// 按单位标记换算到规范单位；无法识别的标记视为已是规范单位，原样返回。
pub fn to_canonical(value: f64, unit: &str) -> f64 {
    match unit.parse::<DisplayUnit>() {
        Ok(unit) => unit.to_canonical(value),
        Err(_) => value,
    }
}

/// [`to_canonical`] 的逆运算。
pub fn from_canonical(value: f64, unit: &str) -> f64 {
    match unit.parse::<DisplayUnit>() {
        Ok(unit) => unit.from_canonical(value),
        Err(_) => value,
    }
}

/// 保留管理端录入的原始文本与单位，便于回显编辑。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnteredValue {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<DisplayUnit>,
}

impl EnteredValue {
    pub fn new(text: impl Into<String>, unit: Option<DisplayUnit>) -> Self {
        Self {
            text: text.into(),
            unit,
        }
    }

    /// 解析文本并换算为规范单位；未指定单位时数值原样返回。
    pub fn canonical(&self) -> Result<f64, UnitError> {
        let value = parse_fractional(&self.text)?;
        Ok(match self.unit {
            Some(unit) => unit.to_canonical(value),
            None => value,
        })
    }

    /// 把规范值换回录入时的显示单位。
    pub fn redisplay(&self, canonical: f64) -> f64 {
        match self.unit {
            Some(unit) => unit.from_canonical(canonical),
            None => canonical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn parses_fractions_and_mixed_numbers() {
        assert_eq!(parse_fractional_input("1/8"), 0.125);
        assert_eq!(parse_fractional_input("1 1/4"), 1.25);
        assert_eq!(parse_fractional_input("1-1/4"), 1.25);
        assert_eq!(parse_fractional_input("  3/16 "), 0.1875);
        assert_eq!(parse_fractional_input("2   1/2"), 2.5);
    }

    #[test]
    fn parses_plain_decimals() {
        assert_eq!(parse_fractional_input("0.125"), 0.125);
        assert_eq!(parse_fractional_input("10.5"), 10.5);
        assert_eq!(parse_fractional_input("-3"), -3.0);
    }

    #[test]
    fn rejects_invalid_input_as_nan() {
        assert!(parse_fractional_input("abc").is_nan());
        assert!(parse_fractional_input("1/0").is_nan());
        assert!(parse_fractional_input("1 1/0").is_nan());
        assert!(parse_fractional_input("").is_nan());
        assert!(parse_fractional_input("   ").is_nan());
        assert!(parse_fractional_input("1/2/3").is_nan());
        assert!(parse_fractional_input("1.5/2").is_nan());
        assert!(parse_fractional_input("inf").is_nan());
        assert!(parse_fractional_input("10.5abc").is_nan());
    }

    #[test]
    fn reports_specific_errors() {
        assert_eq!(parse_fractional(""), Err(UnitError::Empty));
        assert_eq!(
            parse_fractional("3/0"),
            Err(UnitError::ZeroDenominator("3/0".to_string()))
        );
        assert_eq!(
            parse_fractional("a/b"),
            Err(UnitError::Malformed("a/b".to_string()))
        );
    }

    #[test]
    fn inch_conversions_use_expected_factors() {
        assert!(close(to_canonical(1.0, "in"), 25.4));
        assert!(close(to_canonical(1.0, "in2"), 645.16));
        assert!(close(to_canonical(645.16, "$/in2"), 1.0));
        assert!(close(to_canonical(100.0, "in/min"), 2540.0));
        assert!(close(to_canonical(100.0, "ipm"), 2540.0));
        assert!(close(to_canonical(2.0, "in²"), 1290.32));
    }

    #[test]
    fn unknown_unit_passes_through() {
        assert_eq!(to_canonical(42.0, "furlong"), 42.0);
        assert_eq!(from_canonical(42.0, ""), 42.0);
        assert_eq!(to_canonical(7.5, "mm"), 7.5);
    }

    #[test]
    fn conversions_round_trip_for_every_unit() {
        let tags = [
            "mm", "cm", "m", "in", "ft", "mm2", "cm2", "m2", "in2", "ft2", "$/mm2", "$/cm2",
            "$/m2", "$/in2", "$/ft2", "mm/min", "cm/min", "m/min", "in/min", "ft/min",
        ];
        for tag in tags {
            for value in [0.0, 0.125, 1.0, 3.75, 1234.5] {
                let back = from_canonical(to_canonical(value, tag), tag);
                assert!(close(back, value), "{tag}: {value} -> {back}");
            }
        }
    }

    #[test]
    fn display_unit_tags_round_trip_through_strings() {
        for unit in [
            DisplayUnit::INCH,
            DisplayUnit::SQUARE_INCH,
            DisplayUnit::COST_PER_SQUARE_INCH,
            DisplayUnit::MILLIMETERS_PER_MINUTE,
        ] {
            let parsed: DisplayUnit = unit.to_string().parse().expect("标记应可解析");
            assert_eq!(parsed, unit);
        }
        assert!("parsec".parse::<DisplayUnit>().is_err());
    }

    #[test]
    fn entered_value_converts_and_redisplays() {
        let thickness = EnteredValue::new("1/8", Some(DisplayUnit::INCH));
        let canonical = thickness.canonical().expect("1/8 in 应可解析");
        assert!(close(canonical, 3.175));
        assert!(close(thickness.redisplay(canonical), 0.125));

        let raw = EnteredValue::new("12", None);
        assert_eq!(raw.canonical(), Ok(12.0));
        assert_eq!(raw.redisplay(12.0), 12.0);

        assert!(EnteredValue::new("x", None).canonical().is_err());
    }
}
