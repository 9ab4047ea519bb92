// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};
use tripdesk_app::validation::{format_date, parse_datetime};
use tripdesk_app::{
    NewTrip, NewTripUpdate, Principal, Trip, TripGateway, TripId, TripUpdate, TripUpdateId,
};

pub const APP_NAME: &str = "tripdesk";

const LOCAL_USER: &str = "local";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "trips",
        &[
            "id",
            "system_trip_id",
            "external_trip_id",
            "delivery_date",
            "driver_name",
            "origin",
            "destination",
            "project",
            "plate_number",
            "property_type",
            "work_shift",
            "created_at",
        ],
    ),
    (
        "trip_updates",
        &["id", "trip_id", "category", "notes", "created_at"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_trips_delivery_date",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_trips_delivery_date ON trips (delivery_date);",
    },
    RequiredIndex {
        name: "idx_trips_project",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_trips_project ON trips (project);",
    },
    RequiredIndex {
        name: "idx_trip_updates_trip_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_trip_updates_trip_id ON trip_updates (trip_id, created_at);",
    },
];

const TRIP_COLUMNS: &str = "
    id, system_trip_id, external_trip_id, delivery_date, driver_name,
    origin, destination, project, plate_number, property_type,
    work_shift, created_at
";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created trip schema");
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    /// Inserts the whole batch in one transaction and returns the new ids in
    /// input order. Nothing is written if any row fails.
    pub fn insert_trips(&self, trips: &[NewTrip]) -> Result<Vec<TripId>> {
        let now = now_timestamp()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin trip insert")?;

        let mut ids = Vec::with_capacity(trips.len());
        {
            let mut stmt = tx
                .prepare(
                    "
                    INSERT INTO trips (
                      system_trip_id, external_trip_id, delivery_date, driver_name,
                      origin, destination, project, plate_number, property_type,
                      work_shift, created_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .context("prepare trip insert")?;
            for trip in trips {
                stmt.execute(params![
                    trip.system_trip_id,
                    trip.external_trip_id,
                    format_date(trip.delivery_date),
                    trip.driver_name,
                    trip.origin,
                    trip.destination,
                    trip.project,
                    trip.plate_number,
                    trip.property_type,
                    trip.work_shift,
                    now,
                ])
                .with_context(|| format!("insert trip {}", trip.system_trip_id))?;
                ids.push(TripId::new(tx.last_insert_rowid()));
            }
        }

        tx.commit().context("commit trip insert")?;
        info!(count = ids.len(), "inserted trips");
        Ok(ids)
    }

    /// Deletes trips and, through the foreign key, their updates. Returns how
    /// many trips were removed; unknown ids are ignored.
    pub fn delete_trips(&self, trip_ids: &BTreeSet<TripId>) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin trip delete")?;

        let mut removed = 0;
        {
            let mut stmt = tx
                .prepare("DELETE FROM trips WHERE id = ?")
                .context("prepare trip delete")?;
            for trip_id in trip_ids {
                removed += stmt
                    .execute(params![trip_id.get()])
                    .with_context(|| format!("delete trip {trip_id}"))?;
            }
        }

        tx.commit().context("commit trip delete")?;
        info!(requested = trip_ids.len(), removed, "deleted trips");
        Ok(removed)
    }

    /// All trips, latest delivery date first.
    pub fn list_trips(&self) -> Result<Vec<Trip>> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips ORDER BY delivery_date DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare trips query")?;
        let rows = stmt.query_map([], trip_from_row).context("query trips")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect trips")
    }

    pub fn get_trip(&self, trip_id: TripId) -> Result<Option<Trip>> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?");
        self.conn
            .query_row(&sql, params![trip_id.get()], trip_from_row)
            .optional()
            .with_context(|| format!("load trip {trip_id}"))
    }

    pub fn trip_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0))
            .context("count trips")?;
        usize::try_from(count).context("trip count out of range")
    }

    /// Updates for one trip, newest first.
    pub fn list_updates(&self, trip_id: TripId) -> Result<Vec<TripUpdate>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, trip_id, category, notes, created_at
                FROM trip_updates
                WHERE trip_id = ?
                ORDER BY created_at DESC, id DESC
                ",
            )
            .context("prepare trip updates query")?;
        let rows = stmt
            .query_map(params![trip_id.get()], |row| {
                let created_at_raw: String = row.get(4)?;
                Ok(TripUpdate {
                    id: TripUpdateId::new(row.get(0)?),
                    trip_id: TripId::new(row.get(1)?),
                    category: row.get(2)?,
                    notes: row.get(3)?,
                    created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
                })
            })
            .with_context(|| format!("query updates for trip {trip_id}"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect updates for trip {trip_id}"))
    }

    pub fn insert_update(&self, update: &NewTripUpdate) -> Result<TripUpdateId> {
        update.validate()?;
        if self.get_trip(update.trip_id)?.is_none() {
            bail!(
                "trip {} not found -- choose an existing trip and retry",
                update.trip_id
            );
        }

        let now = now_timestamp()?;
        self.conn
            .execute(
                "
                INSERT INTO trip_updates (trip_id, category, notes, created_at)
                VALUES (?, ?, ?, ?)
                ",
                params![
                    update.trip_id.get(),
                    update.category.trim(),
                    update.notes,
                    now
                ],
            )
            .with_context(|| format!("insert update for trip {}", update.trip_id))?;

        let update_id = TripUpdateId::new(self.conn.last_insert_rowid());
        debug!(trip_id = %update.trip_id, update_id = %update_id, "inserted trip update");
        Ok(update_id)
    }
}

impl TripGateway for Store {
    fn authenticate(&mut self) -> Result<Principal> {
        Ok(Principal {
            user_id: LOCAL_USER.to_owned(),
            email: format!("{LOCAL_USER}@{APP_NAME}"),
        })
    }

    fn list_trips(&mut self) -> Result<Vec<Trip>> {
        Store::list_trips(self)
    }

    fn list_updates(&mut self, trip_id: TripId) -> Result<Vec<TripUpdate>> {
        Store::list_updates(self, trip_id)
    }

    fn insert_trips(&mut self, trips: &[NewTrip]) -> Result<Vec<TripId>> {
        Store::insert_trips(self, trips)
    }

    fn delete_trips(&mut self, trip_ids: &BTreeSet<TripId>) -> Result<()> {
        Store::delete_trips(self, trip_ids).map(|_| ())
    }

    fn insert_update(&mut self, update: &NewTripUpdate) -> Result<TripUpdateId> {
        Store::insert_update(self, update)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("TRIPDESK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set TRIPDESK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("tripdesk.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn trip_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trip> {
    let delivery_date_raw: String = row.get(3)?;
    let created_at_raw: String = row.get(11)?;

    Ok(Trip {
        id: TripId::new(row.get(0)?),
        system_trip_id: row.get(1)?,
        external_trip_id: row.get(2)?,
        delivery_date: parse_date(&delivery_date_raw).map_err(to_sql_error)?,
        driver_name: row.get(4)?,
        origin: row.get(5)?,
        destination: row.get(6)?,
        project: row.get(7)?,
        plate_number: row.get(8)?,
        property_type: row.get(9)?,
        work_shift: row.get(10)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a tripdesk database or point storage.db_path elsewhere"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

// Fixed-width so text ordering matches time ordering.
fn now_timestamp() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format current timestamp")
}

fn parse_date(raw: &str) -> Result<time::Date> {
    if let Ok(value) = time::Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }
    Ok(parse_datetime(raw)?.date())
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::{Store, now_timestamp, parse_date};
    use anyhow::Result;
    use time::macros::date;
    use tripdesk_app::validation::parse_datetime;

    #[test]
    fn stored_timestamps_parse_back() -> Result<()> {
        let raw = now_timestamp()?;
        assert_eq!(raw.len(), "2024-01-01T00:00:00.000000Z".len());
        parse_datetime(&raw)?;
        Ok(())
    }

    #[test]
    fn dates_tolerate_full_timestamps() -> Result<()> {
        assert_eq!(parse_date("2024-03-09")?, date!(2024 - 03 - 09));
        assert_eq!(parse_date("2024-03-09T10:00:00Z")?, date!(2024 - 03 - 09));
        assert!(parse_date("09/03/2024").is_err());
        Ok(())
    }

    #[test]
    fn bootstrap_is_idempotent() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.bootstrap()?;
        assert_eq!(store.trip_count()?, 0);
        Ok(())
    }

    #[test]
    fn foreign_keys_are_enforced() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let enabled: i64 = store
            .raw_connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        assert_eq!(enabled, 1);
        Ok(())
    }
}
