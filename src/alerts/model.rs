//! Alert domain types and their wire representations.
//!
//! The three enums keep explicit bidirectional string tables so the wire
//! form (which uses the legacy display strings, spaces included) stays
//! decoupled from the Rust variant names. Unknown strings are a defined
//! parse error, surfaced as `InvalidInput`.

use chrono::NaiveDateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::alerts::error::AlertError;
use crate::geo::GeoPoint;

macro_rules! string_table_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                $ty::parse(&raw).map_err(|e| D::Error::custom(e.to_string()))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    SuspiciousActivity,
    Crime,
    Hazard,
    Emergency,
    Other,
    Weather,
    Traffic,
    Environmental,
    PublicSafety,
    Health,
    Transportation,
    Fire,
    NaturalDisaster,
}

impl AlertType {
    const TABLE: &'static [(AlertType, &'static str)] = &[
        (AlertType::SuspiciousActivity, "SUSPICIOUS ACTIVITY"),
        (AlertType::Crime, "CRIME"),
        (AlertType::Hazard, "HAZARD"),
        (AlertType::Emergency, "EMERGENCY"),
        (AlertType::Other, "OTHER"),
        (AlertType::Weather, "WEATHER"),
        (AlertType::Traffic, "TRAFFIC"),
        (AlertType::Environmental, "ENVIRONMENTAL"),
        (AlertType::PublicSafety, "PUBLIC SAFETY"),
        (AlertType::Health, "HEALTH"),
        (AlertType::Transportation, "TRANSPORTATION"),
        (AlertType::Fire, "FIRE"),
        (AlertType::NaturalDisaster, "NATURAL DISASTER"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(variant, _)| variant == self)
            .map(|(_, name)| *name)
            .unwrap_or("OTHER")
    }

    pub fn parse(raw: &str) -> Result<Self, AlertError> {
        Self::TABLE
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(raw))
            .map(|(variant, _)| *variant)
            .ok_or_else(|| AlertError::InvalidInput(format!("unknown alert type: {raw}")))
    }
}

string_table_serde!(AlertType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    const TABLE: &'static [(Severity, &'static str)] = &[
        (Severity::Low, "LOW"),
        (Severity::Medium, "MEDIUM"),
        (Severity::High, "HIGH"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(variant, _)| variant == self)
            .map(|(_, name)| *name)
            .unwrap_or("LOW")
    }

    pub fn parse(raw: &str) -> Result<Self, AlertError> {
        Self::TABLE
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(raw))
            .map(|(variant, _)| *variant)
            .ok_or_else(|| AlertError::InvalidInput(format!("unknown severity: {raw}")))
    }
}

string_table_serde!(Severity);

/// Status of a posted alert. Any status is reachable from any other; there
/// is no transition state machine beyond the enum domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertStatus {
    Active,
    Resolved,
    FalseAlarm,
}

impl AlertStatus {
    const TABLE: &'static [(AlertStatus, &'static str)] = &[
        (AlertStatus::Active, "ACTIVE"),
        (AlertStatus::Resolved, "RESOLVED"),
        (AlertStatus::FalseAlarm, "FALSE_ALARM"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(variant, _)| variant == self)
            .map(|(_, name)| *name)
            .unwrap_or("ACTIVE")
    }

    pub fn parse(raw: &str) -> Result<Self, AlertError> {
        Self::TABLE
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(raw))
            .map(|(variant, _)| *variant)
            .ok_or_else(|| AlertError::InvalidInput(format!("unknown alert status: {raw}")))
    }
}

string_table_serde!(AlertStatus);

/// A persisted geotagged incident report.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    #[serde(flatten)]
    pub location: GeoPoint,
    pub owner_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Client-supplied alert fields for create and full-update calls. Status is
/// deliberately absent: creation forces ACTIVE and full updates never touch
/// status.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
}
