use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::{MySql, Pool, Type};
use time::{Date, Time};
use utoipa::ToSchema;

use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub database: Pool<MySql>,
    pub jwt_secret: String,
    pub mailer: Option<Mailer>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn image_dir(&self) -> PathBuf {
        self.upload_dir.join("images")
    }

    pub fn schedule_file_dir(&self) -> PathBuf {
        self.upload_dir.join("schedules")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Checker,
    Instructor,
    Dpd,
    Rlic,
}

// `password` is stored and compared as plaintext and must never leave the
// server in a response body.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub user_id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub user_role: UserRole,
    pub department_id: Option<i32>,
    pub profile_image_path: Option<String>,
}

// `date_monitored` and `time_monitored` are assigned by the database at
// insert time, `checker_id` comes from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MonitoringForm {
    pub form_id: i32,
    #[schema(value_type = String)]
    pub date_monitored: Date,
    #[schema(value_type = String)]
    pub time_monitored: Time,
    pub room_number: String,
    pub instructor_name: String,
    pub instructor_presence: bool,
    pub remarks: Option<String>,
    pub photo: Option<String>,
    pub checker_id: i32,
}

// The three approval flags are independent nullable columns. Sign-off order
// (head, then room loading, then checker) is a convention of the client
// screens, not a server-side state machine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RoomChangeForm {
    pub id: i32,
    pub full_name: String,
    pub email: String,
    pub from_room: String,
    pub to_room: String,
    pub from_day: String,
    pub to_day: String,
    pub from_time: String,
    pub to_time: String,
    pub schedule_number: String,
    pub reason_of_change: String,
    pub approved_by: Option<String>,
    pub is_approved_head: Option<bool>,
    pub is_approved_room_loading: Option<bool>,
    pub is_noted_by_checker: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Schedule {
    pub id: i32,
    pub room_id: String,
    pub room_name: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub section: String,
    pub instructor: String,
    pub instructor_email: String,
    pub floor: Option<String>,
    pub is_active: bool,
}
