// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::collections::BTreeSet;

use crate::{NewTrip, NewTripUpdate, Principal, TripId, TripUpdateId, TripUpdates};
use crate::{Trip, TripUpdate};

/// Persistence and query backend behind the dashboard.
///
/// Every call other than [`TripGateway::authenticate`] assumes a successful
/// sign-in; implementations reject them otherwise.
pub trait TripGateway {
    fn authenticate(&mut self) -> Result<Principal>;

    /// All trips, newest delivery date first.
    fn list_trips(&mut self) -> Result<Vec<Trip>>;

    /// Updates for one trip, newest first.
    fn list_updates(&mut self, trip_id: TripId) -> Result<Vec<TripUpdate>>;

    /// Updates for every listed trip. Returns only after every fetch has
    /// settled; any failure fails the whole batch.
    fn list_updates_for(&mut self, trip_ids: &[TripId]) -> Result<TripUpdates> {
        let mut updates = TripUpdates::new();
        for trip_id in trip_ids {
            updates.insert(*trip_id, self.list_updates(*trip_id)?);
        }
        Ok(updates)
    }

    /// Persists the batch and returns the assigned ids in input order.
    fn insert_trips(&mut self, trips: &[NewTrip]) -> Result<Vec<TripId>>;

    fn delete_trips(&mut self, trip_ids: &BTreeSet<TripId>) -> Result<()>;

    fn insert_update(&mut self, update: &NewTripUpdate) -> Result<TripUpdateId>;
}
