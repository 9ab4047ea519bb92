// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use std::io::Read;

use tracing::{info, warn};

use crate::{
    BoardCommand, BoardEvent, HeaderPolicy, NewTripUpdate, TripBoard, TripGateway,
    TripId, read_trip_csv,
};

/// Drives a [`TripBoard`] against a backend. Gateway failures never escape:
/// they are logged and surfaced as notices on the board.
pub struct Session<G> {
    gateway: G,
    board: TripBoard,
}

impl<G: TripGateway> Session<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            board: TripBoard::default(),
        }
    }

    pub fn board(&self) -> &TripBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut TripBoard {
        &mut self.board
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }

    pub fn dispatch(&mut self, command: BoardCommand) -> Vec<BoardEvent> {
        self.board.dispatch(command)
    }

    /// Signs in, then loads trips and their updates.
    pub fn start(&mut self) -> Vec<BoardEvent> {
        self.board.begin_auth();
        let result = self.gateway.authenticate().map_err(|error| {
            warn!(error = %format!("{error:#}"), "sign-in failed");
            format!("{error:#}")
        });
        if let Ok(principal) = &result {
            info!(email = %principal.email, "signed in");
        }
        let authenticated = result.is_ok();
        let mut events = self.board.auth_resolved(result);
        if authenticated {
            events.extend(self.refresh());
        }
        events
    }

    pub fn refresh(&mut self) -> Vec<BoardEvent> {
        if !self.board.is_authenticated() {
            return vec![BoardEvent::Blocked];
        }

        self.board.begin_trip_load();
        let trips = self.gateway.list_trips().map_err(|error| {
            warn!(error = %format!("{error:#}"), "listing trips failed");
            format!("{error:#}")
        });
        let reloaded = trips.is_ok();
        let mut events = self.board.trips_loaded(trips);
        if !reloaded {
            return events;
        }

        let trip_ids: Vec<TripId> = self.board.trips().iter().map(|trip| trip.id).collect();
        self.board.begin_update_load();
        let updates = self.gateway.list_updates_for(&trip_ids).map_err(|error| {
            warn!(error = %format!("{error:#}"), "listing updates failed");
            format!("{error:#}")
        });
        events.extend(self.board.updates_loaded(updates));
        events
    }

    /// Parses an upload and sends its valid rows as one batch. Nothing is
    /// sent when parsing fails or no row is valid.
    pub fn upload<R: Read>(&mut self, reader: R, policy: HeaderPolicy) -> Vec<BoardEvent> {
        if !self.board.is_interactive() {
            return vec![BoardEvent::Blocked];
        }

        let report = match read_trip_csv(reader, policy) {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, "rejected trip upload");
                return self.board.upload_failed(&error.to_string());
            }
        };
        for skipped in &report.skipped {
            warn!(line = skipped.line, reason = ?skipped.reason, "skipped upload row");
        }

        match self.gateway.insert_trips(&report.trips) {
            Ok(ids) => {
                info!(count = ids.len(), "uploaded trips");
                let mut events = self.board.upload_finished(ids.len());
                events.extend(self.refresh());
                events
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "trip insert failed");
                self.board.upload_failed(&format!("{error:#}"))
            }
        }
    }

    /// Deletes the given trips and drops them locally on success.
    pub fn delete(&mut self, trip_ids: &BTreeSet<TripId>) -> Vec<BoardEvent> {
        if !self.board.is_interactive() {
            return vec![BoardEvent::Blocked];
        }
        if trip_ids.is_empty() {
            return Vec::new();
        }

        match self.gateway.delete_trips(trip_ids) {
            Ok(()) => {
                info!(count = trip_ids.len(), "deleted trips");
                self.board.trips_deleted(trip_ids)
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "trip delete failed");
                self.board.delete_failed(&format!("{error:#}"))
            }
        }
    }

    pub fn delete_selected(&mut self) -> Vec<BoardEvent> {
        let selected = self.board.selection().selected().clone();
        self.delete(&selected)
    }

    /// Records a status update and reloads that trip's history.
    pub fn post_update(&mut self, update: &NewTripUpdate) -> Vec<BoardEvent> {
        if !self.board.is_interactive() {
            return vec![BoardEvent::Blocked];
        }

        let result = update
            .validate()
            .and_then(|()| self.gateway.insert_update(update))
            .and_then(|_| self.gateway.list_updates(update.trip_id));
        match result {
            Ok(updates) => {
                info!(trip_id = %update.trip_id, category = %update.category, "posted update");
                self.board.trip_updates_refreshed(update.trip_id, updates)
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "posting update failed");
                self.board.update_failed(&format!("{error:#}"))
            }
        }
    }
}
