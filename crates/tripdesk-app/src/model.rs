// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

/// Label shown for a trip that has no updates yet.
pub const NO_STATUS_LABEL: &str = "sin estado";

/// Sentinel used by the project and status dropdowns.
pub const ALL_FILTER: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub system_trip_id: String,
    pub external_trip_id: Option<String>,
    pub delivery_date: Date,
    pub driver_name: String,
    pub origin: String,
    pub destination: String,
    pub project: String,
    pub plate_number: String,
    pub property_type: String,
    pub work_shift: String,
    pub created_at: OffsetDateTime,
}

/// A trip as parsed from an upload, before the backend assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrip {
    pub system_trip_id: String,
    pub external_trip_id: Option<String>,
    pub delivery_date: Date,
    pub driver_name: String,
    pub origin: String,
    pub destination: String,
    pub project: String,
    pub plate_number: String,
    pub property_type: String,
    pub work_shift: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub id: TripUpdateId,
    pub trip_id: TripId,
    pub category: String,
    pub notes: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTripUpdate {
    pub trip_id: TripId,
    pub category: String,
    pub notes: String,
}

impl NewTripUpdate {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.trip_id.get() <= 0 {
            anyhow::bail!("update trip is required -- choose a trip and retry");
        }
        if self.category.trim().is_empty() {
            anyhow::bail!("update category is required -- enter a category and retry");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    SystemTripId,
    DeliveryDate,
    PlateNumber,
    DriverName,
    Project,
    Status,
    LastUpdate,
}

impl SortField {
    pub const ALL: [Self; 7] = [
        Self::SystemTripId,
        Self::DeliveryDate,
        Self::PlateNumber,
        Self::DriverName,
        Self::Project,
        Self::Status,
        Self::LastUpdate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SystemTripId => "trip",
            Self::DeliveryDate => "delivery_date",
            Self::PlateNumber => "plate",
            Self::DriverName => "driver",
            Self::Project => "project",
            Self::Status => "status",
            Self::LastUpdate => "last_update",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "trip" => Some(Self::SystemTripId),
            "delivery_date" => Some(Self::DeliveryDate),
            "plate" => Some(Self::PlateNumber),
            "driver" => Some(Self::DriverName),
            "project" => Some(Self::Project),
            "status" => Some(Self::Status),
            "last_update" => Some(Self::LastUpdate),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SystemTripId => "trip id",
            Self::DeliveryDate => "delivery date",
            Self::PlateNumber => "plate",
            Self::DriverName => "driver",
            Self::Project => "project",
            Self::Status => "status",
            Self::LastUpdate => "last update",
        }
    }
}

/// Dropdown filter: either the `"all"` sentinel or one exact value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueFilter {
    #[default]
    All,
    Only(String),
}

impl ValueFilter {
    pub fn parse(value: &str) -> Self {
        if value == ALL_FILTER {
            Self::All
        } else {
            Self::Only(value.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_FILTER,
            Self::Only(value) => value,
        }
    }

    /// Exact comparison; `None` never matches a concrete value.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => value == Some(expected.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NewTripUpdate, SortDirection, SortField, ValueFilter};
    use crate::TripId;

    #[test]
    fn sort_field_parse_round_trips_every_variant() {
        for field in SortField::ALL {
            assert_eq!(SortField::parse(field.as_str()), Some(field));
        }
        assert_eq!(SortField::parse("nope"), None);
    }

    #[test]
    fn direction_flips() {
        assert_eq!(SortDirection::Asc.flipped(), SortDirection::Desc);
        assert_eq!(SortDirection::Desc.flipped(), SortDirection::Asc);
    }

    #[test]
    fn all_sentinel_parses_to_all() {
        assert_eq!(ValueFilter::parse("all"), ValueFilter::All);
        assert_eq!(
            ValueFilter::parse("ProjX"),
            ValueFilter::Only("ProjX".to_owned())
        );
        assert_eq!(ValueFilter::parse("ProjX").as_str(), "ProjX");
    }

    #[test]
    fn concrete_filter_never_matches_missing_value() {
        let filter = ValueFilter::Only("en ruta".to_owned());
        assert!(!filter.matches(None));
        assert!(filter.matches(Some("en ruta")));
        assert!(!filter.matches(Some("En ruta")));
        assert!(ValueFilter::All.matches(None));
    }

    #[test]
    fn update_validation_requires_category() {
        let update = NewTripUpdate {
            trip_id: TripId::new(1),
            category: "  ".to_owned(),
            notes: String::new(),
        };
        assert!(update.validate().is_err());
    }
}
