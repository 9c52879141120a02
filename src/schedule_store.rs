use std::fs;
use std::path::Path as FsPath;

use actix_multipart::Multipart;
use actix_web::{
    get, post,
    web::{Data, Query},
    HttpResponse, Responder,
};
use futures_util::TryStreamExt;
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;

use crate::auth::Claims;
use crate::models::{AppState, UserRole};
use crate::upload;

/// Validates an uploaded schedule document and normalizes it to the
/// `{"schedules": [...]}` shape stored on disk. A bare array is auto-wrapped.
/// Records themselves are schemaless and pass through untouched.
pub fn normalize_upload(bytes: &[u8]) -> Result<Value, String> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| format!("The uploaded file is not valid JSON: {err}"))?;
    match value {
        Value::Array(entries) => Ok(json!({ "schedules": entries })),
        Value::Object(map) if matches!(map.get("schedules"), Some(Value::Array(_))) => {
            Ok(Value::Object(map))
        }
        _ => Err("The uploaded file must contain a top level `schedules` array.".to_string()),
    }
}

pub fn record_count(document: &Value) -> usize {
    document
        .get("schedules")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn document_records(document: &Value) -> Option<&Vec<Value>> {
    match document {
        Value::Array(entries) => Some(entries),
        Value::Object(map) => map.get("schedules").and_then(Value::as_array),
        _ => None,
    }
}

fn json_files(dir: &FsPath) -> Vec<std::path::PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Failed to read schedule file directory {dir:?}: {err}");
            return Vec::new();
        }
    };
    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Reads every schedule file in full and merges their record arrays. Files
/// that fail to read or parse are logged and skipped.
pub fn load_entries(dir: &FsPath) -> Vec<Value> {
    let mut merged = Vec::new();
    for path in json_files(dir) {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!("Skipping unreadable schedule file {path:?}: {err}");
                continue;
            }
        };
        let document: Value = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(err) => {
                warn!("Skipping unparseable schedule file {path:?}: {err}");
                continue;
            }
        };
        match document_records(&document) {
            Some(records) => merged.extend(records.iter().cloned()),
            None => warn!("Skipping schedule file {path:?} without a schedules array"),
        }
    }
    merged
}

/// File names with per-file record counts, in name order.
pub fn load_file_summaries(dir: &FsPath) -> Vec<(String, usize)> {
    let mut summaries = Vec::new();
    for path in json_files(dir) {
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let count = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .as_ref()
            .and_then(document_records)
            .map(Vec::len)
            .unwrap_or(0);
        summaries.push((name, count));
    }
    summaries
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ScheduleFilter {
    pub room: Option<String>,
    pub day: Option<String>,
    pub instructor: Option<String>,
}

fn field_as_string(record: &Value, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

/// Case-insensitive equality against the record fields. A record lacking a
/// queried field never matches.
pub fn matches_filter(record: &Value, filter: &ScheduleFilter) -> bool {
    if let Some(room) = &filter.room {
        let by_name = field_as_string(record, "room_name")
            .map(|value| value.eq_ignore_ascii_case(room))
            .unwrap_or(false);
        let by_id = field_as_string(record, "room_id")
            .map(|value| value.eq_ignore_ascii_case(room))
            .unwrap_or(false);
        if !by_name && !by_id {
            return false;
        }
    }
    if let Some(day) = &filter.day {
        match field_as_string(record, "day") {
            Some(value) if value.eq_ignore_ascii_case(day) => {}
            _ => return false,
        }
    }
    if let Some(instructor) = &filter.instructor {
        match field_as_string(record, "instructor") {
            Some(value) if value.eq_ignore_ascii_case(instructor) => {}
            _ => return false,
        }
    }
    true
}

pub fn store_stats(dir: &FsPath) -> Value {
    let files = load_file_summaries(dir);
    let entries = load_entries(dir);

    let mut by_day = std::collections::BTreeMap::<String, u64>::new();
    let mut by_floor = std::collections::BTreeMap::<String, u64>::new();
    for record in &entries {
        if let Some(day) = field_as_string(record, "day") {
            *by_day.entry(day).or_insert(0) += 1;
        }
        if let Some(floor) = field_as_string(record, "floor") {
            *by_floor.entry(floor).or_insert(0) += 1;
        }
    }

    json!({
        "files": files.len(),
        "schedules": entries.len(),
        "by_day": by_day,
        "by_floor": by_floor,
    })
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 201, description = "The schedule file was stored"),
        (status = 400, description = "The upload is not a usable schedule file"),
        (status = 403, description = "The caller is not an administrator")
    )
)]
#[post("/json/upload")]
pub async fn upload_schedule_file(
    data: Data<AppState>,
    claims: Claims,
    mut payload: Multipart,
) -> impl Responder {
    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden().json(
            json!({ "success": false, "error": "Only administrators may upload schedule files." }),
        );
    }

    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return HttpResponse::BadRequest()
                    .json(json!({ "success": false, "error": err.to_string() }))
            }
        };
        if field.content_disposition().get_filename().is_none() {
            continue;
        }
        return match upload::save_schedule_file(&mut field, &data.schedule_file_dir()).await {
            Ok((file, schedules)) => HttpResponse::Created()
                .json(json!({ "success": true, "file": file, "schedules": schedules })),
            Err(err) => {
                HttpResponse::BadRequest().json(json!({ "success": false, "error": err }))
            }
        };
    }

    HttpResponse::BadRequest()
        .json(json!({ "success": false, "error": "No schedule file was attached." }))
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "Every record from every uploaded schedule file")
    )
)]
#[get("/json")]
pub async fn get_json_schedules(data: Data<AppState>, _claims: Claims) -> impl Responder {
    HttpResponse::Ok().json(load_entries(&data.schedule_file_dir()))
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "Uploaded schedule file names with record counts")
    )
)]
#[get("/json/files")]
pub async fn get_json_files(data: Data<AppState>, _claims: Claims) -> impl Responder {
    let summaries: Vec<Value> = load_file_summaries(&data.schedule_file_dir())
        .into_iter()
        .map(|(file, schedules)| json!({ "file": file, "schedules": schedules }))
        .collect();
    HttpResponse::Ok().json(summaries)
}

#[utoipa::path(
    context_path = "/schedules",
    params(ScheduleFilter),
    responses(
        (status = 200, description = "Records matching the query parameters")
    )
)]
#[get("/json/filter")]
pub async fn filter_json_schedules(
    data: Data<AppState>,
    _claims: Claims,
    filter: Query<ScheduleFilter>,
) -> impl Responder {
    let matched: Vec<Value> = load_entries(&data.schedule_file_dir())
        .into_iter()
        .filter(|record| matches_filter(record, &filter))
        .collect();
    HttpResponse::Ok().json(matched)
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "Counts over the merged schedule records")
    )
)]
#[get("/json/stats")]
pub async fn get_json_stats(data: Data<AppState>, _claims: Claims) -> impl Responder {
    HttpResponse::Ok().json(store_stats(&data.schedule_file_dir()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_store(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn record(room: &str, day: &str, instructor: &str) -> Value {
        json!({
            "room_id": room,
            "room_name": room,
            "day": day,
            "start_time": "09:00",
            "end_time": "10:30",
            "subject": "Data Structures",
            "section": "BSCS-2A",
            "instructor": instructor,
            "instructor_email": "teach@campus.edu",
            "floor": "2"
        })
    }

    #[test]
    fn bare_array_is_wrapped() {
        let normalized = normalize_upload(br#"[{"day": "Monday"}]"#).unwrap();
        assert!(normalized.get("schedules").unwrap().is_array());
        assert_eq!(record_count(&normalized), 1);
    }

    #[test]
    fn wrapped_document_passes_through() {
        let normalized = normalize_upload(br#"{"schedules": [], "term": "1st"}"#).unwrap();
        assert_eq!(record_count(&normalized), 0);
        assert_eq!(normalized.get("term").unwrap(), "1st");
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(normalize_upload(b"not json").is_err());
        assert!(normalize_upload(br#"{"rooms": []}"#).is_err());
        assert!(normalize_upload(br#""just a string""#).is_err());
    }

    #[test]
    fn load_merges_files_and_skips_broken_ones() {
        let dir = temp_store("schedule-store-load");
        fs::write(
            dir.join("a.json"),
            serde_json::to_vec(&json!({ "schedules": [record("A-204", "Monday", "R. Santos")] }))
                .unwrap(),
        )
        .unwrap();
        fs::write(
            dir.join("b.json"),
            serde_json::to_vec(&json!([record("B-101", "Tuesday", "L. Cruz")])).unwrap(),
        )
        .unwrap();
        fs::write(dir.join("broken.json"), b"{oops").unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let entries = load_entries(&dir);
        assert_eq!(entries.len(), 2);

        let summaries = load_file_summaries(&dir);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0], ("a.json".to_string(), 1));
        assert_eq!(summaries[2], ("broken.json".to_string(), 0));
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let entry = record("A-204", "Monday", "R. Santos");
        let filter = ScheduleFilter {
            room: Some("a-204".to_string()),
            day: Some("MONDAY".to_string()),
            instructor: None,
        };
        assert!(matches_filter(&entry, &filter));

        let mismatch = ScheduleFilter {
            day: Some("Tuesday".to_string()),
            ..ScheduleFilter::default()
        };
        assert!(!matches_filter(&entry, &mismatch));
    }

    #[test]
    fn filter_requires_queried_fields() {
        let entry = json!({ "subject": "Ethics" });
        let filter = ScheduleFilter {
            day: Some("Monday".to_string()),
            ..ScheduleFilter::default()
        };
        assert!(!matches_filter(&entry, &filter));
        assert!(matches_filter(&entry, &ScheduleFilter::default()));
    }

    #[test]
    fn filter_matches_numeric_room_ids() {
        let entry = json!({ "room_id": 204, "day": "Monday" });
        let filter = ScheduleFilter {
            room: Some("204".to_string()),
            ..ScheduleFilter::default()
        };
        assert!(matches_filter(&entry, &filter));
    }

    #[test]
    fn stats_count_by_day_and_floor() {
        let dir = temp_store("schedule-store-stats");
        fs::write(
            dir.join("term.json"),
            serde_json::to_vec(&json!({ "schedules": [
                record("A-204", "Monday", "R. Santos"),
                record("A-205", "Monday", "L. Cruz"),
                record("B-101", "Tuesday", "L. Cruz"),
            ]}))
            .unwrap(),
        )
        .unwrap();

        let stats = store_stats(&dir);
        assert_eq!(stats["files"], 1);
        assert_eq!(stats["schedules"], 3);
        assert_eq!(stats["by_day"]["Monday"], 2);
        assert_eq!(stats["by_day"]["Tuesday"], 1);
        assert_eq!(stats["by_floor"]["2"], 3);
    }
}
