// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::path::PathBuf;
use time::{Date, Duration, Month};
use tripdesk_app::validation::format_date;
use tripdesk_app::{Column, NewTrip, NewTripUpdate, TripId};

const REFERENCE_YEAR: i32 = 2024;

const PROJECTS: [&str; 6] = [
    "Retail Norte",
    "Retail Sur",
    "Farma Centro",
    "Consumo Masivo",
    "Electro Express",
    "Ferreteria Andina",
];

const UPDATE_CATEGORIES: [&str; 6] = [
    "en almacen",
    "en ruta",
    "entregado",
    "retrasado",
    "rechazado",
    "incidencia",
];

const FIRST_NAMES: [&str; 14] = [
    "Juan", "Ana", "Luis", "Rosa", "Carlos", "Maria", "Jorge", "Lucia", "Pedro", "Elena", "Diego",
    "Sofia", "Miguel", "Carmen",
];
const LAST_NAMES: [&str; 14] = [
    "Perez", "Quispe", "Flores", "Gomez", "Torres", "Rojas", "Vargas", "Castillo", "Mendoza",
    "Ramos", "Huaman", "Chavez", "Salazar", "Rivera",
];

const CITIES: [&str; 12] = [
    "Lima",
    "Arequipa",
    "Trujillo",
    "Chiclayo",
    "Piura",
    "Cusco",
    "Huancayo",
    "Ica",
    "Tacna",
    "Puno",
    "Cajamarca",
    "Callao",
];

const PROPERTY_TYPES: [&str; 2] = ["Propio", "Tercero"];
const WORK_SHIFTS: [&str; 3] = ["Dia", "Noche", "Madrugada"];

const NOTE_WORDS: [&str; 16] = [
    "cliente",
    "ausente",
    "carga",
    "completa",
    "parcial",
    "trafico",
    "lento",
    "reprogramado",
    "firma",
    "recibida",
    "guia",
    "pendiente",
    "almacen",
    "cerrado",
    "ruta",
    "alterna",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for realistic trip batches and status updates.
#[derive(Debug, Clone)]
pub struct TripFaker {
    rng: DeterministicRng,
    sequence: u32,
}

impl TripFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            sequence: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn trip(&mut self) -> NewTrip {
        self.sequence += 1;
        let origin = if self.rng.bool() {
            self.pick(&CITIES).to_owned()
        } else {
            String::new()
        };
        let external_trip_id = if self.rng.bool() {
            Some(format!("EXT-{:05}", self.rng.int_n(100_000)))
        } else {
            None
        };

        NewTrip {
            system_trip_id: format!("VJ-{REFERENCE_YEAR}-{:04}", self.sequence),
            external_trip_id,
            delivery_date: self.delivery_date(),
            driver_name: self.driver_name(),
            origin,
            destination: self.pick(&CITIES).to_owned(),
            project: self.pick(&PROJECTS).to_owned(),
            plate_number: self.plate_number(),
            property_type: self.pick(&PROPERTY_TYPES).to_owned(),
            work_shift: self.pick(&WORK_SHIFTS).to_owned(),
        }
    }

    pub fn trips(&mut self, count: usize) -> Vec<NewTrip> {
        (0..count).map(|_| self.trip()).collect()
    }

    pub fn update_for(&mut self, trip_id: TripId) -> NewTripUpdate {
        let notes = if self.rng.bool() {
            self.sentence(2, 5)
        } else {
            String::new()
        };
        NewTripUpdate {
            trip_id,
            category: self.pick(&UPDATE_CATEGORIES).to_owned(),
            notes,
        }
    }

    pub fn driver_name(&mut self) -> String {
        format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
    }

    pub fn plate_number(&mut self) -> String {
        let letters: String = (0..3)
            .map(|_| char::from(b'A' + self.rng.int_n(26) as u8))
            .collect();
        format!("{letters}-{:03}", self.rng.int_n(1000))
    }

    /// A date within the reference year's first quarter.
    pub fn delivery_date(&mut self) -> Date {
        let start = reference_date();
        start + Duration::days(self.rng.int_n(90) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn sentence(&mut self, min_words: usize, max_words: usize) -> String {
        let count = min_words + self.rng.int_n(max_words.saturating_sub(min_words) + 1);
        let parts: Vec<&str> = (0..count).map(|_| self.pick(&NOTE_WORDS)).collect();
        parts.join(" ")
    }
}

/// The full header in schema order, optional columns included.
pub fn trip_csv_header() -> Vec<&'static str> {
    Column::ALL.iter().map(|column| column.header()).collect()
}

/// Renders trips as an upload file with the full header.
pub fn trips_to_csv(trips: &[NewTrip]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(trip_csv_header())
        .context("write csv header")?;
    for trip in trips {
        let delivery_date = format_date(trip.delivery_date);
        writer
            .write_record([
                trip.system_trip_id.as_str(),
                trip.external_trip_id.as_deref().unwrap_or(""),
                delivery_date.as_str(),
                trip.driver_name.as_str(),
                trip.origin.as_str(),
                trip.destination.as_str(),
                trip.project.as_str(),
                trip.plate_number.as_str(),
                trip.property_type.as_str(),
                trip.work_shift.as_str(),
            ])
            .with_context(|| format!("write csv row for {}", trip.system_trip_id))?;
    }
    let bytes = writer.into_inner().context("flush csv writer")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("tripdesk.db");
    Ok((dir, db_path))
}

pub fn projects() -> &'static [&'static str] {
    &PROJECTS
}

pub fn update_categories() -> &'static [&'static str] {
    &UPDATE_CATEGORIES
}

fn reference_date() -> Date {
    Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1).expect("valid calendar date")
}
