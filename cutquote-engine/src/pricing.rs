//! 计价：面积成本 + 切割时间成本，再叠加加价与最低收费。

use cutquote_core::catalog::{PricingEntry, Settings};
use serde::Serialize;
use tracing::debug;

use crate::extract::Metrics;

/// 计价所用的输入明细，便于界面逐项展示。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDetails {
    pub area: f64,
    pub cut_length: f64,
    pub cut_time_minutes: f64,
    pub cut_speed: f64,
    pub cost_per_area: f64,
    pub cost_per_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub area_cost: f64,
    pub time_cost: f64,
    pub subtotal: f64,
    pub markup_amount: f64,
    pub with_markup: f64,
    pub final_price: f64,
    pub min_charge_applied: bool,
    pub currency: String,
    pub details: PriceDetails,
}

impl PriceBreakdown {
    /// 全零的“无报价”结果。
    pub fn empty(currency: impl Into<String>) -> Self {
        Self {
            area_cost: 0.0,
            time_cost: 0.0,
            subtotal: 0.0,
            markup_amount: 0.0,
            with_markup: 0.0,
            final_price: 0.0,
            min_charge_applied: false,
            currency: currency.into(),
            details: PriceDetails::default(),
        }
    }

    fn is_finite(&self) -> bool {
        let d = &self.details;
        [
            self.area_cost,
            self.time_cost,
            self.subtotal,
            self.markup_amount,
            self.with_markup,
            self.final_price,
            d.area,
            d.cut_length,
            d.cut_time_minutes,
            d.cut_speed,
            d.cost_per_area,
            d.cost_per_time,
        ]
        .iter()
        .all(|value| value.is_finite())
    }
}

/// 纯函数计价。任一输入缺失或含 NaN/无穷时返回全零结果，不返回错误。
pub fn calculate_price(
    metrics: Option<&Metrics>,
    entry: Option<&PricingEntry>,
    settings: Option<&Settings>,
) -> PriceBreakdown {
    let (metrics, entry, settings) = match (metrics, entry, settings) {
        (Some(metrics), Some(entry), Some(settings)) => (metrics, entry, settings),
        (_, _, settings) => {
            debug!("计价输入不完整，返回空报价");
            return PriceBreakdown::empty(currency_or_default(settings));
        }
    };

    if !(settings.markup.is_finite() && settings.min_charge.is_finite()) {
        debug!(
            markup = settings.markup,
            min_charge = settings.min_charge,
            "报价设置含非有限值，返回空报价"
        );
        return PriceBreakdown::empty(settings.currency.clone());
    }

    let area = if metrics.area.is_finite() {
        metrics.area
    } else {
        metrics.width * metrics.height
    };
    let area_cost = area * entry.cost_per_area;

    // 速度为 0 或无效时不计时间成本
    let cut_speed = if entry.cut_speed.is_finite() && entry.cut_speed > 0.0 {
        entry.cut_speed
    } else {
        0.0
    };
    let cut_time_minutes = if cut_speed > 0.0 {
        metrics.total_length / cut_speed
    } else {
        0.0
    };
    let time_cost = cut_time_minutes / 60.0 * entry.cost_per_time;

    let subtotal = area_cost + time_cost;
    let markup_amount = subtotal * (settings.markup / 100.0);
    let with_markup = subtotal + markup_amount;
    let min_charge_applied = with_markup < settings.min_charge;
    let final_price = if min_charge_applied {
        settings.min_charge
    } else {
        with_markup
    };

    let breakdown = PriceBreakdown {
        area_cost,
        time_cost,
        subtotal,
        markup_amount,
        with_markup,
        final_price,
        min_charge_applied,
        currency: settings.currency.clone(),
        details: PriceDetails {
            area,
            cut_length: metrics.total_length,
            cut_time_minutes,
            cut_speed,
            cost_per_area: entry.cost_per_area,
            cost_per_time: entry.cost_per_time,
        },
    };

    if breakdown.is_finite() {
        breakdown
    } else {
        debug!(material = %entry.material_id, "计价结果含非有限值，返回空报价");
        PriceBreakdown::empty(settings.currency.clone())
    }
}

fn currency_or_default(settings: Option<&Settings>) -> String {
    settings
        .map(|s| s.currency.clone())
        .unwrap_or_else(|| Settings::default().currency)
}
