// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info};
use tripdesk_app::validation::{format_date, format_datetime, format_elapsed};
use tripdesk_app::{
    BoardCommand, HeaderPolicy, NewTrip, NewTripUpdate, NoticeLevel, Principal, Session,
    SortDirection, SortField, SortSpec, Trip, TripBoard, TripGateway, TripId, TripUpdate,
    TripUpdateId, TripUpdates, ValueFilter, ensure_csv_path,
};
use tripdesk_db::Store;
use tripdesk_remote::{Client, Credentials};
use tripdesk_testkit::TripFaker;

use crate::config::{BackendKind, Config};

const DEMO_SEED: u64 = 2026;
const DEMO_TRIPS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListArgs {
    pub search: Option<String>,
    pub project: Option<String>,
    pub status: Option<String>,
    pub sort: Option<SortField>,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(ListArgs),
    Import(PathBuf),
    Show(TripId),
    Delete { trip_ids: Vec<TripId>, assume_yes: bool },
    Update { trip_id: TripId, category: String, notes: String },
}

impl Default for Command {
    fn default() -> Self {
        Self::List(ListArgs::default())
    }
}

/// Backend chosen by `[backend].kind`.
pub enum Gateway {
    Local(Store),
    Remote(Client),
}

impl TripGateway for Gateway {
    fn authenticate(&mut self) -> Result<Principal> {
        match self {
            Self::Local(store) => store.authenticate(),
            Self::Remote(client) => client.authenticate(),
        }
    }

    fn list_trips(&mut self) -> Result<Vec<Trip>> {
        match self {
            Self::Local(store) => TripGateway::list_trips(store),
            Self::Remote(client) => TripGateway::list_trips(client),
        }
    }

    fn list_updates(&mut self, trip_id: TripId) -> Result<Vec<TripUpdate>> {
        match self {
            Self::Local(store) => TripGateway::list_updates(store, trip_id),
            Self::Remote(client) => TripGateway::list_updates(client, trip_id),
        }
    }

    fn list_updates_for(&mut self, trip_ids: &[TripId]) -> Result<TripUpdates> {
        match self {
            Self::Local(store) => store.list_updates_for(trip_ids),
            Self::Remote(client) => client.list_updates_for(trip_ids),
        }
    }

    fn insert_trips(&mut self, trips: &[NewTrip]) -> Result<Vec<TripId>> {
        match self {
            Self::Local(store) => TripGateway::insert_trips(store, trips),
            Self::Remote(client) => TripGateway::insert_trips(client, trips),
        }
    }

    fn delete_trips(&mut self, trip_ids: &BTreeSet<TripId>) -> Result<()> {
        match self {
            Self::Local(store) => TripGateway::delete_trips(store, trip_ids),
            Self::Remote(client) => TripGateway::delete_trips(client, trip_ids),
        }
    }

    fn insert_update(&mut self, update: &NewTripUpdate) -> Result<TripUpdateId> {
        match self {
            Self::Local(store) => TripGateway::insert_update(store, update),
            Self::Remote(client) => TripGateway::insert_update(client, update),
        }
    }
}

/// Opens the configured backend. `--demo` always uses a seeded in-memory store.
pub fn open_gateway(config: &Config, db_path: &Path, demo: bool) -> Result<Gateway> {
    if demo || config.backend_kind() == BackendKind::Local {
        let store = Store::open(db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or TRIPDESK_DB_PATH",
                db_path.display()
            )
        })?;
        store.bootstrap()?;
        if demo {
            let seeded = seed_demo_data(&store)?;
            debug!(trips = seeded, "seeded demo data");
        }
        return Ok(Gateway::Local(store));
    }

    let remote = config.remote_settings()?;
    let password = env::var(&remote.password_env).with_context(|| {
        format!(
            "read backend password from ${} -- export it or point backend.password_env at the right variable",
            remote.password_env
        )
    })?;
    let client = Client::new(
        &remote.base_url,
        &remote.api_key,
        Credentials {
            email: remote.email,
            password,
        },
        remote.timeout,
    )?;
    Ok(Gateway::Remote(client))
}

pub fn seed_demo_data(store: &Store) -> Result<usize> {
    let mut faker = TripFaker::new(DEMO_SEED);
    let trip_ids = store.insert_trips(&faker.trips(DEMO_TRIPS))?;
    for trip_id in &trip_ids {
        // a third of the trips stay without updates
        if faker.int_n(3) == 0 {
            continue;
        }
        for _ in 0..=faker.int_n(2) {
            store.insert_update(&faker.update_for(*trip_id))?;
        }
    }
    Ok(trip_ids.len())
}

/// Signs in and loads the board, failing on any load error.
pub fn start<G: TripGateway>(session: &mut Session<G>) -> Result<()> {
    session.start();
    drain_notices(session.board_mut(), &mut std::io::sink())?;
    info!(trips = session.board().trips().len(), "board loaded");
    Ok(())
}

pub fn execute<G, R, W>(
    session: &mut Session<G>,
    command: &Command,
    policy: HeaderPolicy,
    input: &mut R,
    out: &mut W,
) -> Result<()>
where
    G: TripGateway,
    R: BufRead,
    W: Write,
{
    start(session)?;
    let now = OffsetDateTime::now_utc();

    match command {
        Command::List(args) => {
            apply_list_args(session, args)?;
            render_table(session.board(), now, out)?;
        }
        Command::Import(path) => {
            ensure_csv_path(path)?;
            let file =
                File::open(path).with_context(|| format!("open upload {}", path.display()))?;
            session.upload(BufReader::new(file), policy);
        }
        Command::Show(trip_id) => {
            require_trip(session.board(), *trip_id)?;
            session.dispatch(BoardCommand::ToggleExpanded(*trip_id));
            render_trip(session.board(), *trip_id, now, out)?;
        }
        Command::Delete {
            trip_ids,
            assume_yes,
        } => {
            for trip_id in trip_ids {
                require_trip(session.board(), *trip_id)?;
            }
            let targets: BTreeSet<TripId> = trip_ids.iter().copied().collect();
            if !assume_yes && !confirm_delete(targets.len(), input, out)? {
                writeln!(out, "aborted; nothing deleted")?;
                return Ok(());
            }
            select_for_delete(session, &targets);
            session.delete_selected();
        }
        Command::Update {
            trip_id,
            category,
            notes,
        } => {
            require_trip(session.board(), *trip_id)?;
            session.post_update(&NewTripUpdate {
                trip_id: *trip_id,
                category: category.clone(),
                notes: notes.clone(),
            });
            if !session.board().is_expanded(*trip_id) {
                session.dispatch(BoardCommand::ToggleExpanded(*trip_id));
            }
            render_trip(session.board(), *trip_id, now, out)?;
        }
    }

    drain_notices(session.board_mut(), out)
}

fn apply_list_args<G: TripGateway>(session: &mut Session<G>, args: &ListArgs) -> Result<()> {
    if let Some(search) = &args.search {
        session.dispatch(BoardCommand::SetSearch(search.clone()));
    }
    if let Some(project) = &args.project {
        session.dispatch(BoardCommand::SetProjectFilter(ValueFilter::parse(project)));
    }
    if let Some(status) = &args.status {
        session.dispatch(BoardCommand::SetStatusFilter(ValueFilter::parse(status)));
    }

    let field = args.sort.unwrap_or(SortSpec::default().field);
    let direction = if args.descending || args.sort.is_none() {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    let wanted = SortSpec { field, direction };
    // a header click either switches field (ascending) or flips direction
    for _ in 0..2 {
        if session.board().sort() == wanted {
            break;
        }
        session.dispatch(BoardCommand::SortBy(field));
    }
    if session.board().sort() != wanted {
        bail!(
            "could not sort by {} {}",
            field.label(),
            direction.as_str()
        );
    }
    Ok(())
}

/// Checks exactly the given rows, the way a user would tick them one by one.
fn select_for_delete<G: TripGateway>(session: &mut Session<G>, targets: &BTreeSet<TripId>) {
    session.dispatch(BoardCommand::SetSearch(String::new()));
    session.dispatch(BoardCommand::SetProjectFilter(ValueFilter::All));
    session.dispatch(BoardCommand::SetStatusFilter(ValueFilter::All));
    session.dispatch(BoardCommand::ClearVisible);

    let visible = session.board().visible_ids();
    for (index, trip_id) in visible.iter().enumerate() {
        if targets.contains(trip_id) {
            session.dispatch(BoardCommand::ToggleRow {
                index,
                range: false,
            });
        }
    }
}

fn require_trip(board: &TripBoard, trip_id: TripId) -> Result<()> {
    if !board.contains(trip_id) {
        bail!("trip {trip_id} not found -- run `tripdesk list` to see trip ids");
    }
    Ok(())
}

fn confirm_delete<R: BufRead, W: Write>(count: usize, input: &mut R, out: &mut W) -> Result<bool> {
    let noun = if count == 1 { "trip" } else { "trips" };
    write!(out, "delete {count} {noun}? [y/N] ")?;
    out.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("read delete confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Prints success notices; fails with the error notices if there were any.
fn drain_notices<W: Write>(board: &mut TripBoard, out: &mut W) -> Result<()> {
    let mut errors = Vec::new();
    for notice in board.take_notices() {
        match notice.level {
            NoticeLevel::Success => writeln!(out, "{}", notice.message)?,
            NoticeLevel::Error => errors.push(notice.message),
        }
    }
    if !errors.is_empty() {
        bail!("{}", errors.join("; "));
    }
    Ok(())
}

const HEADERS: [&str; 8] = [
    "ID", "TRIP", "DELIVERY", "PLATE", "DRIVER", "PROJECT", "STATUS", "UPDATED",
];

pub fn render_table<W: Write>(board: &TripBoard, now: OffsetDateTime, out: &mut W) -> Result<()> {
    let visible = board.visible_trips();
    let rows: Vec<[String; 8]> = visible
        .iter()
        .map(|trip| {
            let updated = board
                .updates()
                .latest(trip.id)
                .map_or_else(|| "-".to_owned(), |update| format_elapsed(now, update.created_at));
            [
                trip.id.to_string(),
                trip.system_trip_id.clone(),
                format_date(trip.delivery_date),
                trip.plate_number.clone(),
                trip.driver_name.clone(),
                trip.project.clone(),
                board.status_label(trip.id).to_owned(),
                updated,
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_row(out, &HEADERS, &widths)?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }

    let sort = board.sort();
    let total = board.trips().len();
    if rows.is_empty() {
        writeln!(out, "no trips match the current filters")?;
    }
    let filter = board.filter();
    if filter.is_active() {
        writeln!(
            out,
            "filters: search {:?}, project {}, status {}",
            filter.search,
            filter.project.as_str(),
            filter.status.as_str()
        )?;
    }
    writeln!(
        out,
        "{} of {} trips, sorted by {} {}",
        rows.len(),
        total,
        sort.field.label(),
        sort.direction.as_str()
    )?;
    Ok(())
}

fn write_row<W: Write, S: AsRef<str>>(out: &mut W, cells: &[S], widths: &[usize]) -> Result<()> {
    let mut line = String::new();
    for (index, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        let cell = cell.as_ref();
        line.push_str(cell);
        let pad = width.saturating_sub(cell.chars().count());
        line.extend(std::iter::repeat_n(' ', pad));
    }
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

pub fn render_trip<W: Write>(
    board: &TripBoard,
    trip_id: TripId,
    now: OffsetDateTime,
    out: &mut W,
) -> Result<()> {
    let Some(trip) = board.trip(trip_id) else {
        bail!("trip {trip_id} not found -- run `tripdesk list` to see trip ids");
    };

    let fields = [
        ("trip", trip.system_trip_id.clone()),
        (
            "external id",
            trip.external_trip_id.clone().unwrap_or_else(|| "-".to_owned()),
        ),
        ("delivery", format_date(trip.delivery_date)),
        ("driver", trip.driver_name.clone()),
        ("plate", trip.plate_number.clone()),
        (
            "origin",
            if trip.origin.is_empty() {
                "-".to_owned()
            } else {
                trip.origin.clone()
            },
        ),
        ("destination", trip.destination.clone()),
        ("project", trip.project.clone()),
        ("property", trip.property_type.clone()),
        ("shift", trip.work_shift.clone()),
        ("status", board.status_label(trip_id).to_owned()),
    ];
    writeln!(out, "trip {trip_id}")?;
    for (label, value) in fields {
        writeln!(out, "  {label:<12} {value}")?;
    }

    if !board.is_expanded(trip_id) {
        return Ok(());
    }
    let updates = board.updates().for_trip(trip_id);
    if updates.is_empty() {
        writeln!(out, "  no updates yet")?;
        return Ok(());
    }
    writeln!(out, "  updates:")?;
    for update in updates {
        let notes = if update.notes.is_empty() {
            String::new()
        } else {
            format!(" -- {}", update.notes)
        };
        writeln!(
            out,
            "    {} ({}) {}{}",
            format_datetime(update.created_at),
            format_elapsed(now, update.created_at),
            update.category,
            notes
        )?;
    }
    Ok(())
}
