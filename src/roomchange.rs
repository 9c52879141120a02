use actix_web::{
    delete, get, post, put, web,
    web::{Data, Json, Path},
    HttpResponse, Responder, Scope,
};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{query, query_as};
use utoipa::ToSchema;

use crate::auth::Claims;
use crate::models::{AppState, RoomChangeForm};

pub fn scope() -> Scope {
    web::scope("/roomchange")
        .service(add_request)
        .service(get_all_requests)
        .service(update_request)
        .service(delete_request)
        .service(get_request)
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RoomChangeSubmission {
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
}

/// Full-row update. `dpd_emails` and `rlic_email` are notification triggers
/// only and are never persisted.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RoomChangeUpdate {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpd_emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rlic_email: Option<String>,
}

#[utoipa::path(
    context_path = "/roomchange",
    request_body = RoomChangeSubmission,
    responses(
        (status = 201, description = "The room change request was created", body = RoomChangeForm),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/add")]
pub async fn add_request(
    data: Data<AppState>,
    _claims: Claims,
    Json(submission): Json<RoomChangeSubmission>,
) -> impl Responder {
    let inserted = match query(
        "INSERT INTO room_change_form
             (full_name, email, from_room, to_room, from_day, to_day,
              from_time, to_time, schedule_number, reason_of_change)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&submission.full_name)
    .bind(&submission.email)
    .bind(&submission.from_room)
    .bind(&submission.to_room)
    .bind(&submission.from_day)
    .bind(&submission.to_day)
    .bind(&submission.from_time)
    .bind(&submission.to_time)
    .bind(&submission.schedule_number)
    .bind(&submission.reason_of_change)
    .execute(&data.database)
    .await
    {
        Ok(inserted) => inserted,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form WHERE id = ?")
        .bind(inserted.last_insert_id() as i32)
        .fetch_one(&data.database)
        .await
    {
        Ok(request) => HttpResponse::Created().json(request),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/roomchange",
    responses(
        (status = 200, description = "Lists all room change requests", body = Vec<RoomChangeForm>),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/all")]
pub async fn get_all_requests(data: Data<AppState>, _claims: Claims) -> impl Responder {
    match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form ORDER BY id DESC")
        .fetch_all(&data.database)
        .await
    {
        Ok(requests) => HttpResponse::Ok().json(requests),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[utoipa::path(
    context_path = "/roomchange",
    responses(
        (status = 200, description = "The requested room change request", body = RoomChangeForm),
        (status = 404, description = "The request was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/{id}")]
pub async fn get_request(data: Data<AppState>, _claims: Claims, path: Path<i32>) -> impl Responder {
    let id = path.into_inner();

    match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form WHERE id = ?")
        .bind(id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(request)) => HttpResponse::Ok().json(request),
        Ok(None) => HttpResponse::NotFound().json(
            json!({ "success": false, "error": format!("Room change request {id} was not found.") }),
        ),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

/// One generic update serves every role in the sign-off chain. The row is
/// replaced wholesale (last write wins); which approval flag the payload
/// flips is up to the caller, and the presence of `dpd_emails` or
/// `rlic_email` decides which notification goes out.
#[utoipa::path(
    context_path = "/roomchange",
    request_body = RoomChangeUpdate,
    responses(
        (status = 200, description = "The updated room change request", body = RoomChangeForm),
        (status = 404, description = "The request was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/update/{id}")]
pub async fn update_request(
    data: Data<AppState>,
    _claims: Claims,
    path: Path<i32>,
    Json(update): Json<RoomChangeUpdate>,
) -> impl Responder {
    let id = path.into_inner();

    let existing = match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form WHERE id = ?")
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
        return HttpResponse::NotFound().json(
            json!({ "success": false, "error": format!("Room change request {id} was not found.") }),
        );
    }

    if let Err(err) = query(
        "UPDATE room_change_form
         SET full_name = ?, email = ?, from_room = ?, to_room = ?, from_day = ?,
             to_day = ?, from_time = ?, to_time = ?, schedule_number = ?,
             reason_of_change = ?, approved_by = ?, is_approved_head = ?,
             is_approved_room_loading = ?, is_noted_by_checker = ?
         WHERE id = ?",
    )
    .bind(&update.full_name)
    .bind(&update.email)
    .bind(&update.from_room)
    .bind(&update.to_room)
    .bind(&update.from_day)
    .bind(&update.to_day)
    .bind(&update.from_time)
    .bind(&update.to_time)
    .bind(&update.schedule_number)
    .bind(&update.reason_of_change)
    .bind(&update.approved_by)
    .bind(update.is_approved_head)
    .bind(update.is_approved_room_loading)
    .bind(update.is_noted_by_checker)
    .bind(id)
    .execute(&data.database)
    .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    let request = match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form WHERE id = ?")
        .bind(id)
        .fetch_one(&data.database)
        .await
    {
        Ok(request) => request,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    if let Some(mailer) = data.mailer.clone() {
        if let Some(dpd_emails) = update.dpd_emails.clone() {
            let notified = request.clone();
            let dpd_mailer = mailer.clone();
            actix_web::rt::spawn(async move {
                if let Err(err) = dpd_mailer
                    .send_dpd_approval_notices(&dpd_emails, &notified)
                    .await
                {
                    error!("Failed to send DPD notices for request {}: {err}", notified.id);
                }
            });
        }
        if let Some(rlic_email) = update.rlic_email.clone() {
            let notified = request.clone();
            actix_web::rt::spawn(async move {
                if let Err(err) = mailer.send_rlic_approval_notice(&rlic_email, &notified).await {
                    error!("Failed to send RLIC notice for request {}: {err}", notified.id);
                }
            });
        }
    }

    HttpResponse::Ok().json(request)
}

#[utoipa::path(
    context_path = "/roomchange",
    responses(
        (status = 200, description = "The deleted room change request", body = RoomChangeForm),
        (status = 404, description = "The request was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[delete("/delete/{id}")]
pub async fn delete_request(
    data: Data<AppState>,
    _claims: Claims,
    path: Path<i32>,
) -> impl Responder {
    let id = path.into_inner();

    let request = match query_as::<_, RoomChangeForm>("SELECT * FROM room_change_form WHERE id = ?")
        .bind(id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(request)) => request,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": format!("Room change request {id} was not found.")
            }))
        }
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query("DELETE FROM room_change_form WHERE id = ?")
        .bind(id)
        .execute(&data.database)
        .await
    {
        Ok(_) => HttpResponse::Ok().json(request),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_payload_triggers_are_optional() {
        let body = json!({
            "full_name": "L. Cruz",
            "email": "lcruz@campus.edu",
            "from_room": "A-204",
            "to_room": "B-101",
            "from_day": "Monday",
            "to_day": "Tuesday",
            "from_time": "09:00-10:30",
            "to_time": "13:00-14:30",
            "schedule_number": "SCH-31",
            "reason_of_change": "Projector broken",
            "approved_by": null,
            "is_approved_head": true,
            "is_approved_room_loading": null,
            "is_noted_by_checker": null
        });
        let update: RoomChangeUpdate = serde_json::from_value(body).unwrap();
        assert!(update.dpd_emails.is_none());
        assert!(update.rlic_email.is_none());
        assert_eq!(update.is_approved_head, Some(true));
    }

    #[test]
    fn update_payload_carries_notification_triggers() {
        let body = json!({
            "full_name": "L. Cruz",
            "email": "lcruz@campus.edu",
            "from_room": "A-204",
            "to_room": "B-101",
            "from_day": "Monday",
            "to_day": "Tuesday",
            "from_time": "09:00-10:30",
            "to_time": "13:00-14:30",
            "schedule_number": "SCH-31",
            "reason_of_change": "Projector broken",
            "approved_by": "Dr. Reyes",
            "is_approved_head": true,
            "is_approved_room_loading": null,
            "is_noted_by_checker": null,
            "dpd_emails": ["dpd@campus.edu", "chair@campus.edu"],
            "rlic_email": "rlic@campus.edu"
        });
        let update: RoomChangeUpdate = serde_json::from_value(body).unwrap();
        assert_eq!(update.dpd_emails.as_ref().unwrap().len(), 2);
        assert_eq!(update.rlic_email.as_deref(), Some("rlic@campus.edu"));
    }
}
