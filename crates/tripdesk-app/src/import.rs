// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! CSV upload parsing.
//!
//! The header is validated once against the fixed trip schema; each data row
//! is then read by column position. Rows whose field count differs from the
//! header never reach [`parse_row`].

use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::NewTrip;
use crate::validation::parse_required_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    SystemTripId,
    ExternalTripId,
    DeliveryDate,
    DriverName,
    Origin,
    Destination,
    Project,
    PlateNumber,
    PropertyType,
    WorkShift,
}

const COLUMN_COUNT: usize = Column::ALL.len();

impl Column {
    pub const ALL: [Self; 10] = [
        Self::SystemTripId,
        Self::ExternalTripId,
        Self::DeliveryDate,
        Self::DriverName,
        Self::Origin,
        Self::Destination,
        Self::Project,
        Self::PlateNumber,
        Self::PropertyType,
        Self::WorkShift,
    ];

    pub const fn header(self) -> &'static str {
        match self {
            Self::SystemTripId => "ID_Viaje",
            Self::ExternalTripId => "ID_EXTERNO",
            Self::DeliveryDate => "FECHA DE ENTREGA",
            Self::DriverName => "NOMBRE CONDUCTOR",
            Self::Origin => "ORIGEN",
            Self::Destination => "DESTINO",
            Self::Project => "PROYECTO",
            Self::PlateNumber => "PLACA",
            Self::PropertyType => "PROPIEDAD",
            Self::WorkShift => "JORNADA",
        }
    }

    pub const fn is_required(self) -> bool {
        !matches!(self, Self::ExternalTripId | Self::Origin)
    }

    pub fn from_header(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.header() == name)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Unknown columns fail the upload.
    #[default]
    Strict,
    /// Unknown columns are ignored.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("row has {found} fields but the header has {expected}")]
    ColumnCount { expected: usize, found: usize },
    #[error("required field `{column}` is empty")]
    MissingField { column: &'static str },
    #[error("`{column}` value {value:?} is not a date (use YYYY-MM-DD or DD/MM/YYYY)")]
    InvalidDate { column: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file has no header row -- put the column names on the first line and retry")]
    MissingHeader,
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("unknown columns: {}; remove them or set import.allow_extra_columns", .0.join(", "))]
    UnknownColumns(Vec<String>),
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("no valid trips found in file ({skipped} rows skipped)")]
    NoValidTrips { skipped: usize },
    #[error("only .csv files are accepted, got {0:?}")]
    UnsupportedFile(String),
    #[error("read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Header validated against the trip schema, mapping each column to its
/// position in the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripHeader {
    width: usize,
    positions: [Option<usize>; COLUMN_COUNT],
}

impl TripHeader {
    pub fn parse<S: AsRef<str>>(names: &[S], policy: HeaderPolicy) -> Result<Self, ImportError> {
        let mut positions = [None; COLUMN_COUNT];
        let mut unknown = Vec::new();

        for (position, raw) in names.iter().enumerate() {
            let name = raw.as_ref().trim_start_matches('\u{feff}').trim();
            match Column::from_header(name) {
                Some(column) => {
                    if positions[column.index()].is_some() {
                        return Err(ImportError::DuplicateColumn(name.to_owned()));
                    }
                    positions[column.index()] = Some(position);
                }
                None => unknown.push(name.to_owned()),
            }
        }

        let missing: Vec<String> = Column::ALL
            .into_iter()
            .filter(|column| column.is_required() && positions[column.index()].is_none())
            .map(|column| column.header().to_owned())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        if policy == HeaderPolicy::Strict && !unknown.is_empty() {
            return Err(ImportError::UnknownColumns(unknown));
        }

        Ok(Self {
            width: names.len(),
            positions,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.index()]
    }

    fn field<'a>(&self, row: &[&'a str], column: Column) -> &'a str {
        self.position(column)
            .and_then(|position| row.get(position).copied())
            .map_or("", str::trim)
    }

    fn required(&self, row: &[&str], column: Column) -> Result<String, ValidationError> {
        let value = self.field(row, column);
        if value.is_empty() {
            return Err(ValidationError::MissingField {
                column: column.header(),
            });
        }
        Ok(value.to_owned())
    }
}

/// Builds one trip from a data row of the same width as the header.
pub fn parse_row(header: &TripHeader, row: &[&str]) -> Result<NewTrip, ValidationError> {
    if row.len() != header.width() {
        return Err(ValidationError::ColumnCount {
            expected: header.width(),
            found: row.len(),
        });
    }

    let system_trip_id = header.required(row, Column::SystemTripId)?;
    let raw_date = header.required(row, Column::DeliveryDate)?;
    let delivery_date =
        parse_required_date(&raw_date).ok_or_else(|| ValidationError::InvalidDate {
            column: Column::DeliveryDate.header(),
            value: raw_date.clone(),
        })?;
    let external_trip_id = Some(header.field(row, Column::ExternalTripId))
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    Ok(NewTrip {
        system_trip_id,
        external_trip_id,
        delivery_date,
        driver_name: header.required(row, Column::DriverName)?,
        origin: header.field(row, Column::Origin).to_owned(),
        destination: header.required(row, Column::Destination)?,
        project: header.required(row, Column::Project)?,
        plate_number: header.required(row, Column::PlateNumber)?,
        property_type: header.required(row, Column::PropertyType)?,
        work_shift: header.required(row, Column::WorkShift)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ColumnCount { expected: usize, found: usize },
    Invalid(ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub trips: Vec<NewTrip>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportReport {
    pub fn valid_count(&self) -> usize {
        self.trips.len()
    }
}

/// Reads a whole upload. Fails when no row produced a valid trip.
pub fn read_trip_csv<R: Read>(reader: R, policy: HeaderPolicy) -> Result<ImportReport, ImportError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv_reader.records();

    let header_record = match records.next() {
        Some(record) => record?,
        None => return Err(ImportError::MissingHeader),
    };
    let names: Vec<&str> = header_record.iter().collect();
    let header = TripHeader::parse(&names, policy)?;

    let mut report = ImportReport::default();
    for record in records {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        if record.len() != header.width() {
            debug!(line, found = record.len(), "skipping row with mismatched field count");
            report.skipped.push(SkippedRow {
                line,
                reason: SkipReason::ColumnCount {
                    expected: header.width(),
                    found: record.len(),
                },
            });
            continue;
        }

        let fields: Vec<&str> = record.iter().collect();
        match parse_row(&header, &fields) {
            Ok(trip) => report.trips.push(trip),
            Err(error) => {
                debug!(line, %error, "skipping invalid row");
                report.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::Invalid(error),
                });
            }
        }
    }

    if report.trips.is_empty() {
        return Err(ImportError::NoValidTrips {
            skipped: report.skipped.len(),
        });
    }

    info!(
        valid = report.trips.len(),
        skipped = report.skipped.len(),
        "parsed trip upload"
    );
    Ok(report)
}

pub fn ensure_csv_path(path: &Path) -> Result<(), ImportError> {
    let is_csv = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ImportError::UnsupportedFile(path.display().to_string()));
    }
    Ok(())
}
