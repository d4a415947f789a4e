//! CSV registration file parsing.

use super::{
    errors::{ImportError, ImportResult},
    models::{RegistrationRow, RowError},
    normalize::header_key,
};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    FirstName,
    LastName,
    Pid,
    Did,
    Nickname,
    Email,
    Phone,
    BirthDate,
    City,
    State,
    Country,
    UsbcId,
    Average,
    Team,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        Some(match header_key(header).as_str() {
            "firstname" | "first" | "fname" | "givenname" => Column::FirstName,
            "lastname" | "last" | "lname" | "surname" | "familyname" => Column::LastName,
            "pid" | "participantid" | "bowlerid" => Column::Pid,
            "did" | "doublesid" | "doublesnumber" => Column::Did,
            "nickname" | "nick" | "preferredname" => Column::Nickname,
            "email" | "emailaddress" | "mail" => Column::Email,
            "phone" | "phonenumber" | "telephone" | "mobile" => Column::Phone,
            "birthdate" | "dateofbirth" | "dob" | "birthday" => Column::BirthDate,
            "city" | "town" => Column::City,
            "state" | "province" | "region" => Column::State,
            "country" => Column::Country,
            "usbcid" | "usbc" | "usbcnumber" | "membershipid" => Column::UsbcId,
            "average" | "avg" | "enteringaverage" => Column::Average,
            "team" | "teamname" => Column::Team,
            _ => return None,
        })
    }
}

/// Header positions, first occurrence wins
struct Layout(HashMap<Column, usize>);

impl Layout {
    fn new(headers: &StringRecord) -> Self {
        let mut columns = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                columns.entry(column).or_insert(index);
            }
        }
        Self(columns)
    }

    fn has(&self, column: Column) -> bool {
        self.0.contains_key(&column)
    }

    /// Trimmed cell, `None` when the column is absent or the cell blank
    fn cell<'r>(&self, record: &'r StringRecord, column: Column) -> Option<&'r str> {
        self.0
            .get(&column)
            .and_then(|&index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Parse a registration CSV
///
/// Header names are matched loosely (case, spaces and underscores are
/// ignored). A missing first or last name column rejects the whole file;
/// bad rows are skipped and reported.
pub fn parse_registrations(data: &[u8]) -> ImportResult<(Vec<RegistrationRow>, Vec<RowError>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let layout = Layout::new(reader.headers()?);
    if !layout.has(Column::FirstName) {
        return Err(ImportError::MissingColumn("first name"));
    }
    if !layout.has(Column::LastName) {
        return Err(ImportError::MissingColumn("last name"));
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                errors.push(RowError::new(line, e.to_string()));
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        match parse_row(&layout, &record, line) {
            Ok(row) => rows.push(row),
            Err(message) => errors.push(RowError::new(line, message)),
        }
    }

    Ok((rows, errors))
}

fn parse_row(layout: &Layout, record: &StringRecord, line: u64) -> Result<RegistrationRow, String> {
    let text = |column| layout.cell(record, column).map(str::to_string);

    let first_name = text(Column::FirstName).ok_or("First name is empty")?;
    let last_name = text(Column::LastName).ok_or("Last name is empty")?;

    let average = parse_number::<i32>(layout.cell(record, Column::Average), "average")?;
    if let Some(avg) = average {
        if !(0..=300).contains(&avg) {
            return Err(format!("Average {avg} must be between 0 and 300"));
        }
    }

    Ok(RegistrationRow {
        line,
        first_name,
        last_name,
        pid: parse_number(layout.cell(record, Column::Pid), "PID")?,
        did: parse_number(layout.cell(record, Column::Did), "DID")?,
        nickname: text(Column::Nickname),
        email: text(Column::Email),
        phone: text(Column::Phone),
        birth_date: layout
            .cell(record, Column::BirthDate)
            .map(parse_date)
            .transpose()?,
        city: text(Column::City),
        state: text(Column::State),
        country: text(Column::Country),
        usbc_id: text(Column::UsbcId),
        average,
        team: text(Column::Team),
    })
}

pub(super) fn parse_number<T: std::str::FromStr>(
    value: Option<&str>,
    label: &str,
) -> Result<Option<T>, String> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| format!("Invalid {label}: {v:?}"))
        })
        .transpose()
}

/// `YYYY-MM-DD` or US-style `MM/DD/YYYY`
pub(super) fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .map_err(|_| format!("Invalid birth date: {value:?}"))
}
