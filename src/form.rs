use actix_multipart::Multipart;
use actix_web::{
    delete, get, post, put, web,
    web::{Data, Json, Path},
    HttpResponse, Responder, Scope,
};
use futures_util::TryStreamExt;
use log::error;
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as};

use crate::auth::Claims;
use crate::models::{AppState, MonitoringForm};
use crate::upload;

pub fn scope() -> Scope {
    web::scope("/form")
        .service(add_form)
        .service(get_all_forms)
        .service(update_form)
        .service(delete_form)
        .service(get_form)
}

#[derive(Deserialize)]
pub struct FormUpdate {
    room_number: String,
    instructor_name: String,
    instructor_presence: bool,
    remarks: Option<String>,
}

fn parse_presence(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Multipart submission: text fields `room_number`, `instructor_name`,
/// `instructor_presence` (0/1), optional `remarks`, optional image field
/// `photo`. The monitored date and time come from the database clock and the
/// checker from the bearer token, never from the client.
#[post("/add")]
pub async fn add_form(data: Data<AppState>, claims: Claims, mut payload: Multipart) -> impl Responder {
    let mut room_number = None;
    let mut instructor_name = None;
    let mut instructor_presence = None;
    let mut remarks = None;
    let mut photo = None;

    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return HttpResponse::BadRequest()
                    .json(json!({ "success": false, "error": err.to_string() }))
            }
        };

        let name = field.name().to_string();
        match name.as_str() {
            "photo" => {
                photo = match upload::save_image(&mut field, &data.image_dir()).await {
                    Ok(path) => Some(path),
                    Err(err) => {
                        return HttpResponse::BadRequest()
                            .json(json!({ "success": false, "error": err }))
                    }
                };
            }
            "room_number" | "instructor_name" | "instructor_presence" | "remarks" => {
                let text = match upload::read_text_field(&mut field).await {
                    Ok(text) => text,
                    Err(err) => {
                        return HttpResponse::BadRequest()
                            .json(json!({ "success": false, "error": err.to_string() }))
                    }
                };
                match name.as_str() {
                    "room_number" => room_number = Some(text),
                    "instructor_name" => instructor_name = Some(text),
                    "instructor_presence" => match parse_presence(&text) {
                        Some(presence) => instructor_presence = Some(presence),
                        None => {
                            return HttpResponse::BadRequest().json(json!({
                                "success": false,
                                "error": "instructor_presence must be 0 or 1."
                            }))
                        }
                    },
                    _ => remarks = Some(text),
                }
            }
            _ => continue,
        }
    }

    let (room_number, instructor_name, instructor_presence) =
        match (room_number, instructor_name, instructor_presence) {
            (Some(room), Some(instructor), Some(presence)) => (room, instructor, presence),
            _ => {
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": "room_number, instructor_name and instructor_presence are required."
                }))
            }
        };

    let inserted = match query(
        "INSERT INTO monitoring_form
             (date_monitored, time_monitored, room_number, instructor_name,
              instructor_presence, remarks, photo, checker_id)
         VALUES (CURRENT_DATE, CURRENT_TIME, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&room_number)
    .bind(&instructor_name)
    .bind(instructor_presence)
    .bind(&remarks)
    .bind(&photo)
    .bind(claims.id)
    .execute(&data.database)
    .await
    {
        Ok(inserted) => inserted,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    let form = match query_as::<_, MonitoringForm>("SELECT * FROM monitoring_form WHERE form_id = ?")
        .bind(inserted.last_insert_id() as i32)
        .fetch_one(&data.database)
        .await
    {
        Ok(form) => form,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    // The notice is fire-and-forget: a failed send is logged and never rolls
    // back the insert.
    if !form.instructor_presence {
        if let Some(mailer) = data.mailer.clone() {
            let absent_form = form.clone();
            actix_web::rt::spawn(async move {
                if let Err(err) = mailer.send_absence_notice(&absent_form).await {
                    error!(
                        "Failed to send absence notice for form {}: {err}",
                        absent_form.form_id
                    );
                }
            });
        }
    }

    HttpResponse::Created().json(form)
}

#[get("/all")]
pub async fn get_all_forms(data: Data<AppState>, _claims: Claims) -> impl Responder {
    match query_as::<_, MonitoringForm>(
        "SELECT * FROM monitoring_form ORDER BY date_monitored DESC, time_monitored DESC",
    )
    .fetch_all(&data.database)
    .await
    {
        Ok(forms) => HttpResponse::Ok().json(forms),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[get("/{form_id}")]
pub async fn get_form(data: Data<AppState>, _claims: Claims, path: Path<i32>) -> impl Responder {
    let form_id = path.into_inner();

    match query_as::<_, MonitoringForm>("SELECT * FROM monitoring_form WHERE form_id = ?")
        .bind(form_id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(form)) => HttpResponse::Ok().json(form),
        Ok(None) => HttpResponse::NotFound()
            .json(json!({ "success": false, "error": format!("Form {form_id} was not found.") })),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[put("/update/{form_id}")]
pub async fn update_form(
    data: Data<AppState>,
    _claims: Claims,
    path: Path<i32>,
    Json(update): Json<FormUpdate>,
) -> impl Responder {
    let form_id = path.into_inner();

    let existing = match query_as::<_, MonitoringForm>(
        "SELECT * FROM monitoring_form WHERE form_id = ?",
    )
    .bind(form_id)
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
            .json(json!({ "success": false, "error": format!("Form {form_id} was not found.") }));
    }

    if let Err(err) = query(
        "UPDATE monitoring_form
         SET room_number = ?, instructor_name = ?, instructor_presence = ?, remarks = ?
         WHERE form_id = ?",
    )
    .bind(&update.room_number)
    .bind(&update.instructor_name)
    .bind(update.instructor_presence)
    .bind(&update.remarks)
    .bind(form_id)
    .execute(&data.database)
    .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    match query_as::<_, MonitoringForm>("SELECT * FROM monitoring_form WHERE form_id = ?")
        .bind(form_id)
        .fetch_one(&data.database)
        .await
    {
        Ok(form) => HttpResponse::Ok().json(form),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[delete("/delete/{form_id}")]
pub async fn delete_form(data: Data<AppState>, _claims: Claims, path: Path<i32>) -> impl Responder {
    let form_id = path.into_inner();

    let form = match query_as::<_, MonitoringForm>("SELECT * FROM monitoring_form WHERE form_id = ?")
        .bind(form_id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(form)) => form,
        Ok(None) => {
            return HttpResponse::NotFound().json(
                json!({ "success": false, "error": format!("Form {form_id} was not found.") }),
            )
        }
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query("DELETE FROM monitoring_form WHERE form_id = ?")
        .bind(form_id)
        .execute(&data.database)
        .await
    {
        Ok(_) => HttpResponse::Ok().json(form),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_accepts_wire_booleans() {
        assert_eq!(parse_presence("1"), Some(true));
        assert_eq!(parse_presence("0"), Some(false));
        assert_eq!(parse_presence("true"), Some(true));
        assert_eq!(parse_presence("false"), Some(false));
        assert_eq!(parse_presence("present"), None);
        assert_eq!(parse_presence(""), None);
    }
}
