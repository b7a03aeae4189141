// ============================
// backend-lib/src/records.rs
// ============================
//! Registrations and contact requests.
//!
//! Records are schemaless JSON objects. A record is identified by its `id`,
//! or by its `timestamp` when it has no id; ids are compared by their
//! string form so that `"17"` and `17` name the same record.
use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use dingfeng_common::{
    ExportQuery, Page, Record, RegistrationStats, SearchQuery, StatusBreakdown, TrendPoint,
};
use rand::Rng;
use serde_json::Value;

use crate::error::AppError;
use crate::storage::{self, Collection, Storage};
use crate::validation;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const MAX_TREND_DAYS: u32 = 366;

const STATUS_PENDING: &str = "pending";
const UNSELECTED: &str = "Unselected";
const EMPTY_MESSAGE: &str = "No message";
const CONTACT_TYPE: &str = "contact";

/// The two record collections exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Registration,
    Contact,
}

impl RecordKind {
    pub fn collection(self) -> Collection {
        match self {
            RecordKind::Registration => Collection::Registrations,
            RecordKind::Contact => Collection::Contacts,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Registration => "registration",
            RecordKind::Contact => "contact",
        }
    }
}

/// CRUD and reporting over the record collections
#[derive(Clone)]
pub struct RecordStore<S> {
    storage: S,
}

impl<S: Storage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    async fn read(&self, kind: RecordKind) -> Result<Vec<Record>, AppError> {
        storage::load(&self.storage, kind.collection()).await
    }

    async fn write(&self, kind: RecordKind, records: &[Record]) -> Result<(), AppError> {
        storage::save(&self.storage, kind.collection(), records).await
    }

    /// Store a public form submission after sanitizing and validating it.
    /// Returns the id assigned to the record.
    pub async fn submit(&self, kind: RecordKind, form: Record, ip: &str) -> Result<u64, AppError> {
        let form = validation::sanitize_record(form);
        let errors = match kind {
            RecordKind::Registration => validation::validate_registration(&form),
            RecordKind::Contact => validation::validate_contact(&form),
        };
        if !errors.is_empty() {
            tracing::warn!(kind = kind.label(), ip, ?errors, "submission rejected");
            return Err(AppError::Validation(errors));
        }

        let _guard = self.storage.lock(kind.collection()).await;
        let mut records = self.read(kind).await?;

        let now = Utc::now();
        let id = next_id(&records, now);

        let mut record = form;
        record.insert("id".into(), Value::from(id));
        record.insert("submitTime".into(), Value::from(iso(now)));
        record.insert("ip".into(), Value::from(ip));

        let name = record.get("name").and_then(serde_json::Value::as_str).unwrap_or_default();
        tracing::info!(kind = kind.label(), id, ip, name, "new submission");
        records.push(record);
        self.write(kind, &records).await?;
        Ok(id)
    }

    /// Every record, newest first. Contacts are normalized to the fields
    /// the admin pages display.
    pub async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, AppError> {
        let mut records = self.read(kind).await?;
        if kind == RecordKind::Contact {
            let now = Utc::now();
            records = records.iter().map(|r| normalize_contact(r, now)).collect();
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    pub async fn get(&self, kind: RecordKind, id: &str) -> Result<Record, AppError> {
        self.read(kind)
            .await?
            .into_iter()
            .find(|r| matches_id(r, id))
            .ok_or_else(|| not_found(kind))
    }

    /// Create a record on behalf of an admin
    pub async fn create(&self, kind: RecordKind, body: Record) -> Result<Record, AppError> {
        let mut record = Record::new();
        record.insert("id".into(), Value::from(generate_id()));
        record.extend(body);
        record.insert("timestamp".into(), Value::from(iso(Utc::now())));
        record.insert("status".into(), Value::from(STATUS_PENDING));

        let _guard = self.storage.lock(kind.collection()).await;
        let mut records = self.read(kind).await?;
        records.push(record.clone());
        self.write(kind, &records).await?;

        tracing::info!(kind = kind.label(), id = %display_key(&record), "record created");
        Ok(record)
    }

    /// Shallow-merge `body` into a record
    pub async fn update(&self, kind: RecordKind, id: &str, body: Record) -> Result<Record, AppError> {
        let _guard = self.storage.lock(kind.collection()).await;
        let mut records = self.read(kind).await?;
        let record = records
            .iter_mut()
            .find(|r| matches_id(r, id))
            .ok_or_else(|| not_found(kind))?;

        record.extend(body);
        record.insert("updatedAt".into(), Value::from(iso(Utc::now())));
        let updated = record.clone();

        self.write(kind, &records).await?;
        tracing::info!(kind = kind.label(), id, "record updated");
        Ok(updated)
    }

    /// Remove a record, returning it
    pub async fn delete(&self, kind: RecordKind, id: &str) -> Result<Record, AppError> {
        let _guard = self.storage.lock(kind.collection()).await;
        let mut records = self.read(kind).await?;
        let idx = records
            .iter()
            .position(|r| matches_id(r, id))
            .ok_or_else(|| not_found(kind))?;

        let deleted = records.remove(idx);
        self.write(kind, &records).await?;
        tracing::info!(kind = kind.label(), id, "record deleted");
        Ok(deleted)
    }

    /// Remove every record whose key is in `ids`. Returns how many went.
    pub async fn batch_delete(&self, kind: RecordKind, ids: &[Value]) -> Result<usize, AppError> {
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "Please provide the ids of the records to delete".to_string(),
            ));
        }
        let wanted: HashSet<String> = ids.iter().filter_map(key_string).collect();

        let _guard = self.storage.lock(kind.collection()).await;
        let mut records = self.read(kind).await?;
        let before = records.len();
        records.retain(|r| record_key(r).map_or(true, |key| !wanted.contains(&key)));
        let deleted = before - records.len();

        self.write(kind, &records).await?;
        tracing::info!(kind = kind.label(), deleted, "records batch deleted");
        Ok(deleted)
    }

    /// Filter and page registrations
    pub async fn search(&self, query: &SearchQuery) -> Result<Page<Record>, AppError> {
        let records = self.read(RecordKind::Registration).await?;
        let needle = query
            .q
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let matched: Vec<Record> = records
            .into_iter()
            .filter(|r| needle.as_deref().map_or(true, |q| matches_text(r, q)))
            .filter(|r| matches_status(r, query.status.as_deref()))
            .filter(|r| matches_course(r, query.course.as_deref()))
            .collect();

        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let offset = query.offset.unwrap_or(0);
        let total = matched.len();
        let data = matched.into_iter().skip(offset).take(limit).collect();

        Ok(Page {
            data,
            total,
            limit,
            offset,
        })
    }

    /// Distinct non-empty courses in first-seen order
    pub async fn courses(&self) -> Result<Vec<String>, AppError> {
        let mut seen = HashSet::new();
        Ok(self
            .read(RecordKind::Registration)
            .await?
            .iter()
            .filter_map(|r| label_of(r.get("course")))
            .filter(|course| seen.insert(course.clone()))
            .collect())
    }

    pub async fn stats(&self) -> Result<RegistrationStats, AppError> {
        self.stats_at(Utc::now()).await
    }

    /// Dashboard counters relative to `now`
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<RegistrationStats, AppError> {
        let records = self.read(RecordKind::Registration).await?;

        let today = start_of_day(now.date_naive());
        let week = today - Duration::days(7);
        let month = start_of_day(now.date_naive().with_day(1).unwrap_or(now.date_naive()));

        let mut stats = RegistrationStats {
            total: records.len(),
            ..Default::default()
        };
        for record in &records {
            if let Some(time) = record_time(record) {
                stats.today += usize::from(time >= today);
                stats.this_week += usize::from(time >= week);
                stats.this_month += usize::from(time >= month);
            }

            match record.get("status").and_then(Value::as_str) {
                None | Some("") | Some(STATUS_PENDING) => stats.by_status.pending += 1,
                Some("completed") => stats.by_status.completed += 1,
                Some("cancelled") => stats.by_status.cancelled += 1,
                Some(_) => {},
            }

            let course = label_of(record.get("projects"))
                .or_else(|| label_of(record.get("course")))
                .unwrap_or_else(|| UNSELECTED.to_string());
            *stats.by_course.entry(course).or_default() += 1;

            let country = label_of(record.get("target_country"))
                .or_else(|| label_of(record.get("projects")))
                .unwrap_or_else(|| UNSELECTED.to_string());
            *stats.by_country.entry(country).or_default() += 1;
        }
        stats.pending = stats.by_status.pending;
        stats.completed = stats.by_status.completed;

        Ok(stats)
    }

    pub async fn trends(&self, days: u32) -> Result<Vec<TrendPoint>, AppError> {
        self.trends_at(days, Utc::now()).await
    }

    /// Daily submission counts for the `days` days ending at `now`,
    /// oldest first
    pub async fn trends_at(&self, days: u32, now: DateTime<Utc>) -> Result<Vec<TrendPoint>, AppError> {
        let days = days.clamp(1, MAX_TREND_DAYS);
        let records = self.read(RecordKind::Registration).await?;
        let dates: Vec<NaiveDate> = records
            .iter()
            .filter_map(record_time)
            .map(|t| t.date_naive())
            .collect();

        let today = now.date_naive();
        Ok((0..days)
            .rev()
            .map(|back| {
                let date = today - Duration::days(i64::from(back));
                TrendPoint {
                    date: date.format("%Y-%m-%d").to_string(),
                    count: dates.iter().filter(|d| **d == date).count(),
                    label: format!("{}月{}日", date.month(), date.day()),
                }
            })
            .collect())
    }

    /// Registrations matching the export filters
    pub async fn export(&self, query: &ExportQuery) -> Result<Vec<Record>, AppError> {
        let from = parse_day(query.date_from.as_deref())?.map(start_of_day);
        let to = parse_day(query.date_to.as_deref())?
            .map(|day| start_of_day(day) + Duration::days(1) - Duration::seconds(1));

        let records = self.read(RecordKind::Registration).await?;
        Ok(records
            .into_iter()
            .filter(|r| matches_status(r, query.status.as_deref()))
            .filter(|r| matches_course(r, query.course.as_deref()))
            .filter(|r| match (from, to) {
                (None, None) => true,
                _ => record_time(r).is_some_and(|t| {
                    from.map_or(true, |f| t >= f) && to.map_or(true, |end| t <= end)
                }),
            })
            .collect())
    }

    /// Bulk-load records. Returns `(imported, total)`.
    pub async fn import(
        &self,
        kind: RecordKind,
        data: &Value,
        replace: bool,
    ) -> Result<(usize, usize), AppError> {
        let Value::Array(items) = data else {
            return Err(AppError::InvalidInput("Data must be an array".to_string()));
        };

        let now = iso(Utc::now());
        let mut imported = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(record) = item else {
                return Err(AppError::InvalidInput(
                    "Every imported item must be an object".to_string(),
                ));
            };
            imported.push(prepare_import(kind, record.clone(), &now));
        }
        let count = imported.len();

        let _guard = self.storage.lock(kind.collection()).await;
        let records = if replace {
            imported
        } else {
            let mut existing = self.read(kind).await?;
            existing.extend(imported);
            existing
        };
        self.write(kind, &records).await?;

        tracing::info!(kind = kind.label(), imported = count, total = records.len(), replace, "records imported");
        Ok((count, records.len()))
    }
}

fn not_found(kind: RecordKind) -> AppError {
    AppError::NotFound(format!("No {} with that id", kind.label()))
}

fn iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Millisecond id for a new submission, bumped past existing ids so two
/// submissions in the same millisecond stay distinct. Ids that leave no room
/// above them are skipped over instead of overflowing.
fn next_id(records: &[Record], now: DateTime<Utc>) -> u64 {
    let taken: HashSet<u64> = records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_u64))
        .collect();
    let mut id = now.timestamp_millis().max(0) as u64;
    if let Some(bumped) = taken.iter().max().and_then(|newest| newest.checked_add(1)) {
        id = id.max(bumped);
    }
    while taken.contains(&id) {
        id = id.saturating_add(1);
        if id == u64::MAX {
            id = 0;
        }
    }
    id
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::InvalidInput(format!("Invalid date: {raw}"))),
    }
}

/// Whether a JSON value counts as present (non-empty, non-zero, non-null)
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| is_truthy(v))
}

/// String form of an id-like value
fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The record's identity: `id`, falling back to `timestamp`
fn record_key(record: &Record) -> Option<String> {
    present(record.get("id"))
        .or_else(|| present(record.get("timestamp")))
        .and_then(key_string)
}

fn display_key(record: &Record) -> String {
    record_key(record).unwrap_or_default()
}

fn matches_id(record: &Record, id: &str) -> bool {
    record_key(record).is_some_and(|key| key == id)
}

/// A display label for a grouping field
fn label_of(value: Option<&Value>) -> Option<String> {
    match present(value)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Submission time: `submitTime`, falling back to `timestamp`
fn record_time(record: &Record) -> Option<DateTime<Utc>> {
    present(record.get("submitTime"))
        .or_else(|| present(record.get("timestamp")))
        .and_then(parse_time)
}

fn sort_newest_first(records: &mut [Record]) {
    records.sort_by_key(|r| std::cmp::Reverse(record_time(r)));
}

fn str_contains_ci(record: &Record, field: &str, needle: &str) -> bool {
    record
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| s.to_lowercase().contains(needle))
}

fn matches_text(record: &Record, needle: &str) -> bool {
    ["name", "email", "course", "remarks"]
        .iter()
        .any(|field| str_contains_ci(record, field, needle))
        || record
            .get("phone")
            .and_then(Value::as_str)
            .is_some_and(|phone| phone.contains(needle))
}

/// `None` and `"all"` disable the filter; a missing status counts as pending
fn matches_status(record: &Record, status: Option<&str>) -> bool {
    match status.filter(|s| !s.is_empty() && *s != "all") {
        None => true,
        Some(wanted) => {
            let actual = record
                .get("status")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(STATUS_PENDING);
            actual == wanted
        },
    }
}

fn matches_course(record: &Record, course: Option<&str>) -> bool {
    match course.filter(|c| !c.is_empty() && *c != "all") {
        None => true,
        Some(wanted) => record.get("course").and_then(Value::as_str) == Some(wanted),
    }
}

fn normalize_contact(contact: &Record, now: DateTime<Utc>) -> Record {
    let text = |field: &str| present(contact.get(field)).cloned();

    let mut out = Record::new();
    out.insert("id".into(), contact.get("id").cloned().unwrap_or(Value::Null));
    out.insert("name".into(), text("name").unwrap_or_else(|| Value::from("")));
    out.insert("phone".into(), text("phone").unwrap_or_else(|| Value::from("")));
    out.insert(
        "message".into(),
        text("message")
            .or_else(|| text("subject"))
            .unwrap_or_else(|| Value::from(EMPTY_MESSAGE)),
    );
    out.insert(
        "type".into(),
        text("type").unwrap_or_else(|| Value::from(CONTACT_TYPE)),
    );

    let submit_time = match (text("submitTime"), present(contact.get("timestamp"))) {
        (Some(time), _) => time,
        (None, Some(ts)) => parse_time(ts)
            .map(|t| Value::from(iso(t)))
            .unwrap_or_else(|| ts.clone()),
        (None, None) => Value::from(iso(now)),
    };
    out.insert("submitTime".into(), submit_time);
    out
}

fn prepare_import(kind: RecordKind, mut record: Record, now: &str) -> Record {
    let has = |r: &Record, field: &str| present(r.get(field)).is_some();

    if !has(&record, "id") && !has(&record, "timestamp") {
        record.insert("id".into(), Value::from(generate_id()));
    }
    if !has(&record, "timestamp") && !has(&record, "submitTime") {
        record.insert("timestamp".into(), Value::from(now));
    }
    if kind == RecordKind::Contact {
        if !has(&record, "submitTime") {
            let submitted = present(record.get("timestamp"))
                .cloned()
                .unwrap_or_else(|| Value::from(now));
            record.insert("submitTime".into(), submitted);
        }
        if !has(&record, "type") {
            record.insert("type".into(), Value::from(CONTACT_TYPE));
        }
    }
    record
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Id for admin-created and imported records: base36 millis followed by
/// random base36 digits
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: u64 = rand::rng().random();
    format!("{}{}", to_base36(millis), to_base36(suffix))
}
