use actix_web::{
    delete, get, post, put, web,
    web::{Data, Json, Path},
    HttpResponse, Responder, Scope,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{query, query_as};
use utoipa::ToSchema;

use crate::auth::Claims;
use crate::models::{AppState, Schedule, UserRole};
use crate::schedule_store;

// The JSON-file store shares the /schedules scope; its routes are registered
// ahead of the `{id}` catch-all.
pub fn scope() -> Scope {
    web::scope("/schedules")
        .service(schedule_store::upload_schedule_file)
        .service(schedule_store::get_json_files)
        .service(schedule_store::filter_json_schedules)
        .service(schedule_store::get_json_stats)
        .service(schedule_store::get_json_schedules)
        .service(get_all_schedules)
        .service(get_room_schedules)
        .service(add_schedule)
        .service(update_schedule)
        .service(delete_schedule)
        .service(get_schedule)
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ScheduleSubmission {
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
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "Lists all active schedules", body = Vec<Schedule>),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/")]
pub async fn get_all_schedules(data: Data<AppState>, _claims: Claims) -> impl Responder {
    match query_as::<_, Schedule>(
        "SELECT * FROM schedules WHERE is_active = 1 ORDER BY day, start_time",
    )
    .fetch_all(&data.database)
    .await
    {
        Ok(schedules) => HttpResponse::Ok().json(schedules),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "The requested schedule", body = Schedule),
        (status = 404, description = "The schedule was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/{id}")]
pub async fn get_schedule(data: Data<AppState>, _claims: Claims, path: Path<i32>) -> impl Responder {
    let id = path.into_inner();

    match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(schedule)) => HttpResponse::Ok().json(schedule),
        Ok(None) => HttpResponse::NotFound()
            .json(json!({ "success": false, "error": format!("Schedule {id} was not found.") })),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "Active schedules for the requested room", body = Vec<Schedule>),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/room/{room_id}")]
pub async fn get_room_schedules(
    data: Data<AppState>,
    _claims: Claims,
    path: Path<String>,
) -> impl Responder {
    let room_id = path.into_inner();

    match query_as::<_, Schedule>(
        "SELECT * FROM schedules WHERE room_id = ? AND is_active = 1 ORDER BY day, start_time",
    )
    .bind(&room_id)
    .fetch_all(&data.database)
    .await
    {
        Ok(schedules) => HttpResponse::Ok().json(schedules),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/schedules",
    request_body = ScheduleSubmission,
    responses(
        (status = 201, description = "The schedule was created", body = Schedule),
        (status = 403, description = "The caller is not an administrator"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/add")]
pub async fn add_schedule(
    data: Data<AppState>,
    claims: Claims,
    Json(submission): Json<ScheduleSubmission>,
) -> impl Responder {
    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "error": "Only administrators may add schedules." }));
    }

    let inserted = match query(
        "INSERT INTO schedules
             (room_id, room_name, day, start_time, end_time, subject, section,
              instructor, instructor_email, floor, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&submission.room_id)
    .bind(&submission.room_name)
    .bind(&submission.day)
    .bind(&submission.start_time)
    .bind(&submission.end_time)
    .bind(&submission.subject)
    .bind(&submission.section)
    .bind(&submission.instructor)
    .bind(&submission.instructor_email)
    .bind(&submission.floor)
    .execute(&data.database)
    .await
    {
        Ok(inserted) => inserted,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(inserted.last_insert_id() as i32)
        .fetch_one(&data.database)
        .await
    {
        Ok(schedule) => HttpResponse::Created().json(schedule),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/schedules",
    request_body = ScheduleSubmission,
    responses(
        (status = 200, description = "The updated schedule", body = Schedule),
        (status = 403, description = "The caller is not an administrator"),
        (status = 404, description = "The schedule was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/update/{id}")]
pub async fn update_schedule(
    data: Data<AppState>,
    claims: Claims,
    path: Path<i32>,
    Json(update): Json<ScheduleSubmission>,
) -> impl Responder {
    let id = path.into_inner();

    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "error": "Only administrators may edit schedules." }));
    }

    let existing = match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(existing) => existing,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };
    if existing.is_none() {
        return HttpResponse::NotFound()
            .json(json!({ "success": false, "error": format!("Schedule {id} was not found.") }));
    }

    if let Err(err) = query(
        "UPDATE schedules
         SET room_id = ?, room_name = ?, day = ?, start_time = ?, end_time = ?,
             subject = ?, section = ?, instructor = ?, instructor_email = ?, floor = ?
         WHERE id = ?",
    )
    .bind(&update.room_id)
    .bind(&update.room_name)
    .bind(&update.day)
    .bind(&update.start_time)
    .bind(&update.end_time)
    .bind(&update.subject)
    .bind(&update.section)
    .bind(&update.instructor)
    .bind(&update.instructor_email)
    .bind(&update.floor)
    .bind(id)
    .execute(&data.database)
    .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(id)
        .fetch_one(&data.database)
        .await
    {
        Ok(schedule) => HttpResponse::Ok().json(schedule),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

/// Deleting a schedule only clears its `is_active` flag.
#[utoipa::path(
    context_path = "/schedules",
    responses(
        (status = 200, description = "The deactivated schedule", body = Schedule),
        (status = 403, description = "The caller is not an administrator"),
        (status = 404, description = "The schedule was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[delete("/delete/{id}")]
pub async fn delete_schedule(
    data: Data<AppState>,
    claims: Claims,
    path: Path<i32>,
) -> impl Responder {
    let id = path.into_inner();

    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden().json(
            json!({ "success": false, "error": "Only administrators may delete schedules." }),
        );
    }

    let existing = match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(existing) => existing,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };
    if existing.is_none() {
        return HttpResponse::NotFound()
            .json(json!({ "success": false, "error": format!("Schedule {id} was not found.") }));
    }

    if let Err(err) = query("UPDATE schedules SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(&data.database)
        .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    match query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = ?")
        .bind(id)
        .fetch_one(&data.database)
        .await
    {
        Ok(schedule) => HttpResponse::Ok().json(schedule),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}
