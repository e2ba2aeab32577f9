//! # Delivery Destination Rules
//!
//! Maps a shipping destination to exactly one fixed fee and label.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. explicit zone selected in the UI  ──► that zone (if known)          │
//! │  2. district + address line keywords  ──► first matching zone           │
//! │     (zones are checked in table order, most specific first)             │
//! │  3. nothing matched                   ──► fallback zone                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Default Table
//! | zone      | fee | label              | keywords          |
//! |-----------|-----|--------------------|-------------------|
//! | `gazipur` | 120 | Gazipur            | gazipur, গাজীপুর   |
//! | `ashulia` | 120 | Ashulia            | ashulia, আশুলিয়া   |
//! | `inside`  |  80 | Inside Dhaka City  | dhaka, ঢাকা        |
//! | `outside` | 150 | Outside Dhaka City | (fallback)        |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

/// One zone of the delivery table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryZone {
    /// Stable key sent to the backend as `deliveryOverride.area`.
    pub key: String,
    pub label: String,
    pub fee: Money,
    /// Lowercase substrings that infer this zone from free text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl DeliveryZone {
    pub fn new(key: &str, label: &str, fee: i64, keywords: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            fee: Money::from_major(fee),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| text.contains(k.as_str()))
    }
}

/// What the customer told us about the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationInput {
    /// Zone key chosen from fixed options; wins over inference.
    pub zone: Option<String>,
    pub district: String,
    pub address_line: String,
}

impl DestinationInput {
    pub fn explicit(zone: impl Into<String>) -> Self {
        Self {
            zone: Some(zone.into()),
            ..Self::default()
        }
    }

    pub fn inferred(district: impl Into<String>, address_line: impl Into<String>) -> Self {
        Self {
            zone: None,
            district: district.into(),
            address_line: address_line.into(),
        }
    }
}

/// The resolved fee, in the shape the order payload carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryQuote {
    pub area: String,
    #[serde(with = "crate::money::as_number")]
    #[ts(type = "number")]
    pub fee: Money,
    pub label: String,
}

/// The delivery table with its fallback zone.
///
/// Deserializing goes through [`DeliveryRules::new`], so a table whose
/// fallback key names no zone is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeliveryRules")]
pub struct DeliveryRules {
    zones: Vec<DeliveryZone>,
    fallback: String,
}

#[derive(Deserialize)]
struct RawDeliveryRules {
    zones: Vec<DeliveryZone>,
    fallback: String,
}

impl TryFrom<RawDeliveryRules> for DeliveryRules {
    type Error = CoreError;

    fn try_from(raw: RawDeliveryRules) -> Result<Self, Self::Error> {
        DeliveryRules::new(raw.zones, raw.fallback)
    }
}

impl Default for DeliveryRules {
    fn default() -> Self {
        Self {
            zones: vec![
                DeliveryZone::new("gazipur", "Gazipur", 120, &["gazipur", "গাজীপুর"]),
                DeliveryZone::new("ashulia", "Ashulia", 120, &["ashulia", "আশুলিয়া"]),
                DeliveryZone::new("inside", "Inside Dhaka City", 80, &["dhaka", "ঢাকা"]),
                DeliveryZone::new("outside", "Outside Dhaka City", 150, &[]),
            ],
            fallback: "outside".to_string(),
        }
    }
}

impl DeliveryRules {
    /// Builds a table. The fallback key must name one of the zones.
    pub fn new(zones: Vec<DeliveryZone>, fallback: impl Into<String>) -> Result<Self, CoreError> {
        let fallback = fallback.into();
        if !zones.iter().any(|z| z.key == fallback) {
            return Err(CoreError::UnknownDeliveryZone(fallback));
        }
        Ok(Self { zones, fallback })
    }

    pub fn zones(&self) -> &[DeliveryZone] {
        &self.zones
    }

    pub fn zone(&self, key: &str) -> Option<&DeliveryZone> {
        let key = key.trim();
        self.zones.iter().find(|z| z.key.eq_ignore_ascii_case(key))
    }

    pub fn fallback(&self) -> &DeliveryZone {
        // `new` and `Default` both guarantee the fallback exists.
        self.zone(&self.fallback)
            .or_else(|| self.zones.last())
            .unwrap_or(&FALLBACK_ZONE)
    }

    /// Picks exactly one zone for the destination.
    pub fn resolve(&self, input: &DestinationInput) -> &DeliveryZone {
        if let Some(zone) = input.zone.as_deref().and_then(|key| self.zone(key)) {
            return zone;
        }

        let text = format!("{} {}", input.district, input.address_line).to_lowercase();
        if !text.trim().is_empty() {
            if let Some(zone) = self.zones.iter().find(|z| z.matches(&text)) {
                return zone;
            }
        }

        self.fallback()
    }

    /// `resolve` shaped as the payload's delivery override.
    pub fn quote(&self, input: &DestinationInput) -> DeliveryQuote {
        let zone = self.resolve(input);
        DeliveryQuote {
            area: zone.key.clone(),
            fee: zone.fee,
            label: zone.label.clone(),
        }
    }
}

static FALLBACK_ZONE: std::sync::LazyLock<DeliveryZone> =
    std::sync::LazyLock::new(|| DeliveryZone::new("outside", "Outside Dhaka City", 150, &[]));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_checks_fallback() {
        let ok: DeliveryRules = serde_json::from_value(serde_json::json!({
            "zones": [{"key": "city", "label": "City", "fee": "60"}],
            "fallback": "city"
        }))
        .unwrap();
        assert_eq!(ok.fallback().key, "city");

        let err = serde_json::from_value::<DeliveryRules>(serde_json::json!({
            "zones": [{"key": "city", "label": "City", "fee": "60"}],
            "fallback": "moon"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("moon"));
    }

    #[test]
    fn test_serialized_rules_read_back() {
        let rules = DeliveryRules::default();
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(serde_json::from_value::<DeliveryRules>(json).unwrap(), rules);
    }

    #[test]
    fn test_explicit_zone_wins() {
        let rules = DeliveryRules::default();
        let input = DestinationInput {
            zone: Some("gazipur".into()),
            district: "Dhaka".into(),
            address_line: "Dhanmondi".into(),
        };
        assert_eq!(rules.resolve(&input).key, "gazipur");
        assert_eq!(rules.resolve(&input).fee, Money::from_major(120));
    }

    #[test]
    fn test_unknown_explicit_zone_falls_through_to_inference() {
        let rules = DeliveryRules::default();
        let input = DestinationInput {
            zone: Some("mars".into()),
            district: "Dhaka".into(),
            address_line: String::new(),
        };
        assert_eq!(rules.resolve(&input).key, "inside");
    }

    #[test]
    fn test_inference_is_case_insensitive() {
        let rules = DeliveryRules::default();
        let quote = rules.quote(&DestinationInput::inferred("DHAKA", "Road 5"));
        assert_eq!(quote.area, "inside");
        assert_eq!(quote.fee, Money::from_major(80));
        assert_eq!(quote.label, "Inside Dhaka City");
    }

    #[test]
    fn test_specific_zone_before_dhaka() {
        let rules = DeliveryRules::default();
        let zone = rules.resolve(&DestinationInput::inferred("Dhaka", "Ashulia, Savar"));
        assert_eq!(zone.key, "ashulia");
    }

    #[test]
    fn test_bangla_keyword() {
        let rules = DeliveryRules::default();
        let zone = rules.resolve(&DestinationInput::inferred("গাজীপুর", ""));
        assert_eq!(zone.key, "gazipur");
    }

    #[test]
    fn test_no_match_uses_fallback() {
        let rules = DeliveryRules::default();
        assert_eq!(rules.resolve(&DestinationInput::inferred("Sylhet", "")).key, "outside");
        assert_eq!(rules.resolve(&DestinationInput::default()).fee, Money::from_major(150));
    }

    #[test]
    fn test_new_rejects_unknown_fallback() {
        let zones = vec![DeliveryZone::new("inside", "Inside", 80, &["dhaka"])];
        assert!(DeliveryRules::new(zones.clone(), "nowhere").is_err());
        assert!(DeliveryRules::new(zones, "inside").is_ok());
    }
}
