// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Hosted backend client: password sign-in plus PostgREST-style row
//! endpoints for trips and their updates.

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;
use time::Date;
use time::macros::format_description;
use tracing::{debug, info};
use tripdesk_app::validation::{format_date, parse_datetime};
use tripdesk_app::{
    NewTrip, NewTripUpdate, Principal, Trip, TripGateway, TripId, TripUpdate, TripUpdateId,
    TripUpdates,
};
use url::Url;

const MAX_PARALLEL_FETCHES: usize = 8;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
struct AuthSession {
    access_token: String,
    principal: Principal,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    api_key: String,
    credentials: Credentials,
    http: HttpClient,
    session: Option<AuthSession>,
}

impl Client {
    pub fn new(
        base_url: &str,
        api_key: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        if api_key.trim().is_empty() {
            bail!("backend.api_key must not be empty");
        }
        if credentials.email.trim().is_empty() {
            bail!("backend.email must not be empty");
        }
        let base_url = Url::parse(&format!("{trimmed}/"))
            .with_context(|| format!("parse backend.base_url {base_url:?}"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            credentials,
            http,
            session: None,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|session| &session.principal)
    }

    pub fn sign_in(&mut self) -> Result<Principal> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&SignInRequest {
                email: &self.credentials.email,
                password: &self.credentials.password,
            })
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        let response = ensure_success(response)?;

        let parsed: SignInResponse = response.json().context("decode sign-in response")?;
        let principal = Principal {
            user_id: parsed.user.id,
            email: parsed.user.email.unwrap_or_else(|| self.credentials.email.clone()),
        };
        info!(email = %principal.email, "signed in to backend");
        self.session = Some(AuthSession {
            access_token: parsed.access_token,
            principal: principal.clone(),
        });
        Ok(principal)
    }

    pub fn list_trips(&self) -> Result<Vec<Trip>> {
        let mut url = self.endpoint("rest/v1/trips")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "delivery_date.desc,id.desc");

        let response = self.send(self.http.get(url))?;
        let rows: Vec<TripRow> = response.json().context("decode trips")?;
        debug!(count = rows.len(), "fetched trips");
        rows.into_iter().map(TripRow::into_trip).collect()
    }

    pub fn list_updates(&self, trip_id: TripId) -> Result<Vec<TripUpdate>> {
        let mut url = self.endpoint("rest/v1/trip_updates")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("trip_id", &format!("eq.{trip_id}"))
            .append_pair("order", "created_at.desc,id.desc");

        let response = self.send(self.http.get(url))?;
        let rows: Vec<TripUpdateRow> = response
            .json()
            .with_context(|| format!("decode updates for trip {trip_id}"))?;
        rows.into_iter().map(TripUpdateRow::into_update).collect()
    }

    /// Fetches updates for every trip concurrently. All requests settle
    /// before the first failure, if any, is returned.
    pub fn fetch_updates_for(&self, trip_ids: &[TripId]) -> Result<TripUpdates> {
        self.require_session()?;

        let mut results = Vec::with_capacity(trip_ids.len());
        for chunk in trip_ids.chunks(MAX_PARALLEL_FETCHES) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|trip_id| {
                        let trip_id = *trip_id;
                        scope.spawn(move || (trip_id, self.list_updates(trip_id)))
                    })
                    .collect();
                for handle in handles {
                    results.push(
                        handle
                            .join()
                            .map_err(|_| anyhow!("update fetch thread panicked")),
                    );
                }
            });
        }

        let mut updates = TripUpdates::new();
        for joined in results {
            let (trip_id, fetched) = joined?;
            updates.insert(trip_id, fetched?);
        }
        Ok(updates)
    }

    pub fn insert_trips(&self, trips: &[NewTrip]) -> Result<Vec<TripId>> {
        if trips.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<NewTripRow<'_>> = trips.iter().map(NewTripRow::from_trip).collect();
        let url = self.endpoint("rest/v1/trips")?;
        let response = self.send(
            self.http
                .post(url)
                .header("Prefer", "return=representation")
                .json(&rows),
        )?;

        let inserted: Vec<IdRow> = response.json().context("decode inserted trips")?;
        if inserted.len() != trips.len() {
            bail!(
                "backend returned {} rows for {} inserted trips -- reload and check for duplicates",
                inserted.len(),
                trips.len()
            );
        }
        Ok(inserted.into_iter().map(|row| TripId::new(row.id)).collect())
    }

    pub fn delete_trips(&self, trip_ids: &BTreeSet<TripId>) -> Result<()> {
        if trip_ids.is_empty() {
            return Ok(());
        }

        let ids = trip_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.endpoint("rest/v1/trips")?;
        url.query_pairs_mut().append_pair("id", &format!("in.({ids})"));

        self.send(self.http.delete(url))?;
        Ok(())
    }

    pub fn insert_update(&self, update: &NewTripUpdate) -> Result<TripUpdateId> {
        update.validate()?;

        let url = self.endpoint("rest/v1/trip_updates")?;
        let response = self.send(
            self.http
                .post(url)
                .header("Prefer", "return=representation")
                .json(&[NewTripUpdateRow {
                    trip_id: update.trip_id.get(),
                    category: update.category.trim(),
                    notes: &update.notes,
                }]),
        )?;

        let inserted: Vec<IdRow> = response.json().context("decode inserted update")?;
        inserted
            .first()
            .map(|row| TripUpdateId::new(row.id))
            .ok_or_else(|| anyhow!("backend returned no row for the new update"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("build URL for {path}"))
    }

    fn require_session(&self) -> Result<&AuthSession> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("not authenticated -- sign in before loading data"))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let session = self.require_session()?;
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        ensure_success(response)
    }
}

impl TripGateway for Client {
    fn authenticate(&mut self) -> Result<Principal> {
        self.sign_in()
    }

    fn list_trips(&mut self) -> Result<Vec<Trip>> {
        Client::list_trips(self)
    }

    fn list_updates(&mut self, trip_id: TripId) -> Result<Vec<TripUpdate>> {
        Client::list_updates(self, trip_id)
    }

    fn list_updates_for(&mut self, trip_ids: &[TripId]) -> Result<TripUpdates> {
        self.fetch_updates_for(trip_ids)
    }

    fn insert_trips(&mut self, trips: &[NewTrip]) -> Result<Vec<TripId>> {
        Client::insert_trips(self, trips)
    }

    fn delete_trips(&mut self, trip_ids: &BTreeSet<TripId>) -> Result<()> {
        Client::delete_trips(self, trip_ids)
    }

    fn insert_update(&mut self, update: &NewTripUpdate) -> Result<TripUpdateId> {
        Client::insert_update(self, update)
    }
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(clean_error_response(status, &body))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check backend.base_url and your network ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.best_message()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

fn parse_row_date(raw: &str) -> Result<Date> {
    Date::parse(raw, &format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid delivery_date {raw:?} from backend"))
}

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    access_token: String,
    user: SignInUser,
}

#[derive(Debug, Deserialize)]
struct SignInUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TripRow {
    id: i64,
    system_trip_id: String,
    external_trip_id: Option<String>,
    delivery_date: String,
    driver_name: String,
    origin: Option<String>,
    destination: String,
    project: String,
    plate_number: String,
    property_type: String,
    work_shift: String,
    created_at: String,
}

impl TripRow {
    fn into_trip(self) -> Result<Trip> {
        Ok(Trip {
            id: TripId::new(self.id),
            delivery_date: parse_row_date(&self.delivery_date)?,
            created_at: parse_datetime(&self.created_at)
                .with_context(|| format!("invalid created_at for trip {}", self.id))?,
            system_trip_id: self.system_trip_id,
            external_trip_id: self.external_trip_id.filter(|value| !value.is_empty()),
            driver_name: self.driver_name,
            origin: self.origin.unwrap_or_default(),
            destination: self.destination,
            project: self.project,
            plate_number: self.plate_number,
            property_type: self.property_type,
            work_shift: self.work_shift,
        })
    }
}

#[derive(Debug, Serialize)]
struct NewTripRow<'a> {
    system_trip_id: &'a str,
    external_trip_id: Option<&'a str>,
    delivery_date: String,
    driver_name: &'a str,
    origin: &'a str,
    destination: &'a str,
    project: &'a str,
    plate_number: &'a str,
    property_type: &'a str,
    work_shift: &'a str,
}

impl<'a> NewTripRow<'a> {
    fn from_trip(trip: &'a NewTrip) -> Self {
        Self {
            system_trip_id: &trip.system_trip_id,
            external_trip_id: trip.external_trip_id.as_deref(),
            delivery_date: format_date(trip.delivery_date),
            driver_name: &trip.driver_name,
            origin: &trip.origin,
            destination: &trip.destination,
            project: &trip.project,
            plate_number: &trip.plate_number,
            property_type: &trip.property_type,
            work_shift: &trip.work_shift,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TripUpdateRow {
    id: i64,
    trip_id: i64,
    category: String,
    notes: Option<String>,
    created_at: String,
}

impl TripUpdateRow {
    fn into_update(self) -> Result<TripUpdate> {
        Ok(TripUpdate {
            id: TripUpdateId::new(self.id),
            trip_id: TripId::new(self.trip_id),
            created_at: parse_datetime(&self.created_at)
                .with_context(|| format!("invalid created_at for update {}", self.id))?,
            category: self.category,
            notes: self.notes.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct NewTripUpdateRow<'a> {
    trip_id: i64,
    category: &'a str,
    notes: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

impl ErrorEnvelope {
    fn best_message(self) -> Option<String> {
        [self.error_description, self.message, self.msg, self.error]
            .into_iter()
            .flatten()
            .find(|message| !message.is_empty())
    }
}
