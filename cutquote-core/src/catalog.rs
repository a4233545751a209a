//! 价格表与全局报价设置。所有数值均以规范单位保存。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::units::{DisplayUnit, EnteredValue, UnitError};

/// 同一材料下厚度视为相同的容差（毫米）。
pub const THICKNESS_TOLERANCE_MM: f64 = 1e-6;

/// 全局报价设置的快照，每次计价时按值传入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 加价百分比，例如 15 表示 15%。
    pub markup: f64,
    pub min_charge: f64,
    /// ISO 4217 货币代码。
    pub currency: String,
}

impl Settings {
    pub fn new(markup: f64, min_charge: f64, currency: impl Into<String>) -> Self {
        Self {
            markup,
            min_charge,
            currency: currency.into(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            markup: 0.0,
            min_charge: 0.0,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingField {
    Thickness,
    CostPerArea,
    CutSpeed,
}

/// 录入时的原始文本与单位，仅用于回显。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnteredPricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<EnteredValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_area: Option<EnteredValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_speed: Option<EnteredValue>,
}

/// 价格表条目，以 (材料, 厚度) 为键。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    pub material_id: String,
    /// 毫米。
    pub thickness: f64,
    /// $/mm²。
    pub cost_per_area: f64,
    /// $/小时。
    pub cost_per_time: f64,
    /// mm/min。
    pub cut_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered: Option<EnteredPricing>,
}

impl PricingEntry {
    pub fn new(
        material_id: impl Into<String>,
        thickness: f64,
        cost_per_area: f64,
        cost_per_time: f64,
        cut_speed: f64,
    ) -> Self {
        Self {
            material_id: material_id.into(),
            thickness,
            cost_per_area,
            cost_per_time,
            cut_speed,
            entered: None,
        }
    }

    /// 从管理端录入的显示值构建条目，同时保留原始文本与单位。
    pub fn from_entered(
        material_id: impl Into<String>,
        thickness: EnteredValue,
        cost_per_area: EnteredValue,
        cost_per_time: f64,
        cut_speed: EnteredValue,
    ) -> Result<Self, UnitError> {
        Ok(Self {
            material_id: material_id.into(),
            thickness: thickness.canonical()?,
            cost_per_area: cost_per_area.canonical()?,
            cost_per_time,
            cut_speed: cut_speed.canonical()?,
            entered: Some(EnteredPricing {
                thickness: Some(thickness),
                cost_per_area: Some(cost_per_area),
                cut_speed: Some(cut_speed),
            }),
        })
    }

    /// 返回字段在录入单位下的数值；没有录入记录时返回规范值。
    pub fn display_value(&self, field: PricingField) -> (f64, Option<DisplayUnit>) {
        let (canonical, entered) = match field {
            PricingField::Thickness => (
                self.thickness,
                self.entered.as_ref().and_then(|e| e.thickness.as_ref()),
            ),
            PricingField::CostPerArea => (
                self.cost_per_area,
                self.entered.as_ref().and_then(|e| e.cost_per_area.as_ref()),
            ),
            PricingField::CutSpeed => (
                self.cut_speed,
                self.entered.as_ref().and_then(|e| e.cut_speed.as_ref()),
            ),
        };
        match entered {
            Some(value) => (value.redisplay(canonical), value.unit),
            None => (canonical, None),
        }
    }

    #[inline]
    pub fn matches(&self, material_id: &str, thickness: f64) -> bool {
        self.material_id == material_id
            && (self.thickness - thickness).abs() <= THICKNESS_TOLERANCE_MM
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    entries: Vec<PricingEntry>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同键条目直接覆盖（后写入者生效），返回被替换的旧条目。
    pub fn insert(&mut self, entry: PricingEntry) -> Option<PricingEntry> {
        let existing = self
            .entries
            .iter()
            .position(|existing| existing.matches(&entry.material_id, entry.thickness));
        match existing {
            Some(index) => Some(std::mem::replace(&mut self.entries[index], entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn lookup(&self, material_id: &str, thickness: f64) -> Option<&PricingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.matches(material_id, thickness))
    }

    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|entry| entry.material_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricingEntry> {
        self.entries.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<PricingEntry> for PricingTable {
    fn from_iter<I: IntoIterator<Item = PricingEntry>>(iter: I) -> Self {
        let mut table = PricingTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_material_and_thickness_within_tolerance() {
        let table: PricingTable = [
            PricingEntry::new("steel", 3.0, 0.0001, 50.0, 3000.0),
            PricingEntry::new("steel", 6.0, 0.0002, 60.0, 1500.0),
            PricingEntry::new("aluminum", 3.0, 0.00015, 55.0, 4000.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 3);
        let entry = table.lookup("steel", 6.0 + 1e-9).expect("应命中 6mm 钢板");
        assert_eq!(entry.cut_speed, 1500.0);
        assert!(table.lookup("steel", 4.0).is_none());
        assert!(table.lookup("copper", 3.0).is_none());

        let materials: Vec<_> = table.materials().collect();
        assert_eq!(materials, vec!["aluminum", "steel"]);
    }

    #[test]
    fn insert_replaces_entry_with_same_key() {
        let mut table = PricingTable::new();
        assert!(table.insert(PricingEntry::new("steel", 3.0, 1.0, 1.0, 1.0)).is_none());
        let replaced = table.insert(PricingEntry::new("steel", 3.0, 2.0, 2.0, 2.0));
        assert_eq!(replaced.map(|e| e.cost_per_area), Some(1.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("steel", 3.0).map(|e| e.cost_per_area), Some(2.0));
    }

    #[test]
    fn entered_values_are_stored_canonically_and_redisplayed() {
        let entry = PricingEntry::from_entered(
            "acrylic",
            EnteredValue::new("1/4", Some(DisplayUnit::INCH)),
            EnteredValue::new("0.0645", Some(DisplayUnit::COST_PER_SQUARE_INCH)),
            40.0,
            EnteredValue::new("100", Some(DisplayUnit::INCHES_PER_MINUTE)),
        )
        .expect("录入值应可解析");

        assert!((entry.thickness - 6.35).abs() < 1e-9);
        assert!((entry.cost_per_area - 0.0645 / 645.16).abs() < 1e-15);
        assert!((entry.cut_speed - 2540.0).abs() < 1e-9);

        let (thickness, unit) = entry.display_value(PricingField::Thickness);
        assert!((thickness - 0.25).abs() < 1e-12);
        assert_eq!(unit, Some(DisplayUnit::INCH));

        let (cost, _) = entry.display_value(PricingField::CostPerArea);
        assert!((cost - 0.0645).abs() < 1e-12);
    }

    #[test]
    fn entries_without_entered_values_display_canonical() {
        let entry = PricingEntry::new("steel", 3.0, 0.0001, 50.0, 3000.0);
        assert_eq!(entry.display_value(PricingField::CutSpeed), (3000.0, None));
    }

    #[test]
    fn invalid_entered_value_is_rejected() {
        let result = PricingEntry::from_entered(
            "steel",
            EnteredValue::new("1/0", Some(DisplayUnit::INCH)),
            EnteredValue::new("1", None),
            10.0,
            EnteredValue::new("1", None),
        );
        assert!(result.is_err());
    }

    #[test]
    fn default_settings_use_usd_without_markup() {
        let settings = Settings::default();
        assert_eq!(settings.currency, "USD");
        assert_eq!(settings.markup, 0.0);
        assert_eq!(settings.min_charge, 0.0);
    }
}
