// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Filter and sort stages that turn the loaded trips into the rows on screen.
//! Nothing here mutates the collection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::{ALL_FILTER, SortDirection, SortField, Trip, TripId, TripUpdate, ValueFilter};

/// Updates per trip, kept in server order (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TripUpdates {
    by_trip: BTreeMap<TripId, Vec<TripUpdate>>,
}

impl TripUpdates {
    pub const fn new() -> Self {
        Self {
            by_trip: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, trip_id: TripId, updates: Vec<TripUpdate>) {
        self.by_trip.insert(trip_id, updates);
    }

    pub fn for_trip(&self, trip_id: TripId) -> &[TripUpdate] {
        self.by_trip
            .get(&trip_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn latest(&self, trip_id: TripId) -> Option<&TripUpdate> {
        self.for_trip(trip_id).first()
    }

    /// Category of the most recent update, if any.
    pub fn status_of(&self, trip_id: TripId) -> Option<&str> {
        self.latest(trip_id).map(|update| update.category.as_str())
    }

    pub fn remove(&mut self, trip_id: TripId) {
        self.by_trip.remove(&trip_id);
    }

    pub fn len(&self) -> usize {
        self.by_trip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trip.is_empty()
    }
}

impl FromIterator<(TripId, Vec<TripUpdate>)> for TripUpdates {
    fn from_iter<I: IntoIterator<Item = (TripId, Vec<TripUpdate>)>>(iter: I) -> Self {
        Self {
            by_trip: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewFilter {
    pub search: String,
    pub project: ValueFilter,
    pub status: ValueFilter,
}

impl ViewFilter {
    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || self.project != ValueFilter::All || self.status != ValueFilter::All
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::DeliveryDate,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    /// Same field flips direction; a new field starts ascending.
    pub fn toggle(&mut self, field: SortField) {
        if self.field == field {
            self.direction = self.direction.flipped();
        } else {
            self.field = field;
            self.direction = SortDirection::Asc;
        }
    }
}

pub fn matches_search(trip: &Trip, term: &str) -> bool {
    let needle = term.to_lowercase();
    [
        trip.system_trip_id.as_str(),
        trip.external_trip_id.as_deref().unwrap_or(""),
        trip.driver_name.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

pub fn matches_project(trip: &Trip, filter: &ValueFilter) -> bool {
    filter.matches(Some(trip.project.as_str()))
}

pub fn matches_status(trip: &Trip, filter: &ValueFilter, updates: &TripUpdates) -> bool {
    filter.matches(updates.status_of(trip.id))
}

pub fn filter_trips<'a>(
    trips: &'a [Trip],
    filter: &ViewFilter,
    updates: &TripUpdates,
) -> Vec<&'a Trip> {
    trips
        .iter()
        .filter(|trip| matches_search(trip, &filter.search))
        .filter(|trip| matches_project(trip, &filter.project))
        .filter(|trip| matches_status(trip, &filter.status, updates))
        .collect()
}

/// Ascending comparison on one field. Trips without a status or update
/// order before those with one.
pub fn compare_trips(left: &Trip, right: &Trip, field: SortField, updates: &TripUpdates) -> Ordering {
    match field {
        SortField::SystemTripId => left.system_trip_id.cmp(&right.system_trip_id),
        SortField::DeliveryDate => left.delivery_date.cmp(&right.delivery_date),
        SortField::PlateNumber => left.plate_number.cmp(&right.plate_number),
        SortField::DriverName => left.driver_name.cmp(&right.driver_name),
        SortField::Project => left.project.cmp(&right.project),
        SortField::Status => updates.status_of(left.id).cmp(&updates.status_of(right.id)),
        SortField::LastUpdate => {
            let left_at = updates.latest(left.id).map(|update| update.created_at);
            let right_at = updates.latest(right.id).map(|update| update.created_at);
            left_at.cmp(&right_at)
        }
    }
}

/// Stable: ties keep their incoming relative order in both directions.
pub fn sort_trips(trips: &mut [&Trip], sort: SortSpec, updates: &TripUpdates) {
    trips.sort_by(|left, right| {
        let order = compare_trips(left, right, sort.field, updates);
        match sort.direction {
            SortDirection::Asc => order,
            SortDirection::Desc => order.reverse(),
        }
    });
}

pub fn project_view<'a>(
    trips: &'a [Trip],
    filter: &ViewFilter,
    sort: SortSpec,
    updates: &TripUpdates,
) -> Vec<&'a Trip> {
    let mut rows = filter_trips(trips, filter, updates);
    sort_trips(&mut rows, sort, updates);
    rows
}

/// Project dropdown options over every loaded trip, `"all"` first.
pub fn unique_projects(trips: &[Trip]) -> Vec<String> {
    let projects: BTreeSet<&str> = trips.iter().map(|trip| trip.project.as_str()).collect();
    with_all_sentinel(projects)
}

/// Status dropdown options from each trip's current status, `"all"` first.
pub fn unique_statuses(updates: &TripUpdates) -> Vec<String> {
    let statuses: BTreeSet<&str> = updates
        .by_trip
        .values()
        .filter_map(|list| list.first())
        .map(|update| update.category.as_str())
        .collect();
    with_all_sentinel(statuses)
}

fn with_all_sentinel(values: BTreeSet<&str>) -> Vec<String> {
    let mut options = Vec::with_capacity(values.len() + 1);
    options.push(ALL_FILTER.to_owned());
    options.extend(
        values
            .into_iter()
            .filter(|value| *value != ALL_FILTER)
            .map(str::to_owned),
    );
    options
}
