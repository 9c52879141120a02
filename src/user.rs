use actix_multipart::Multipart;
use actix_web::{
    delete, get, post, put, web,
    web::{Data, Json, Path},
    HttpResponse, Responder, Scope,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as};

use crate::auth::{create_token, Claims};
use crate::models::{AppState, User, UserRole};
use crate::upload;

pub fn scope() -> Scope {
    web::scope("/user")
        .service(register)
        .service(login)
        .service(get_all_users)
        .service(get_me)
        .service(update_profile)
        .service(update_password)
        .service(upload_profile_image)
        .service(delete_user)
        .service(get_user)
}

#[derive(Deserialize)]
pub struct RegisterSubmission {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    user_role: UserRole,
    department_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct LoginSubmission {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    email: String,
    first_name: String,
    last_name: String,
    department_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct PasswordUpdate {
    current_password: String,
    new_password: String,
}

#[post("/register")]
pub async fn register(
    data: Data<AppState>,
    Json(submission): Json<RegisterSubmission>,
) -> impl Responder {
    if submission.email.is_empty() || submission.password.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Email and password must not be empty." }));
    }

    let existing = match query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&submission.email)
        .fetch_optional(&data.database)
        .await
    {
        Ok(existing) => existing,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };
    if existing.is_some() {
        return HttpResponse::BadRequest().json(
            json!({ "success": false, "error": "A user with this email is already registered." }),
        );
    }

    let inserted = match query(
        "INSERT INTO users (email, password, first_name, last_name, user_role, department_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&submission.email)
    .bind(&submission.password)
    .bind(&submission.first_name)
    .bind(&submission.last_name)
    .bind(submission.user_role)
    .bind(submission.department_id)
    .execute(&data.database)
    .await
    {
        Ok(inserted) => inserted,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(inserted.last_insert_id() as i32)
        .fetch_one(&data.database)
        .await
    {
        Ok(user) => HttpResponse::Created().json(user),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[post("/login")]
pub async fn login(data: Data<AppState>, Json(login): Json<LoginSubmission>) -> impl Responder {
    let user = match query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&login.email)
        .fetch_optional(&data.database)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    // Passwords are stored and compared in the clear.
    let user = match user {
        Some(user) if user.password == login.password => user,
        _ => {
            return HttpResponse::Unauthorized()
                .json(json!({ "success": false, "error": "Invalid email or password." }))
        }
    };

    match create_token(&user, &data.jwt_secret) {
        Ok(token) => {
            HttpResponse::Ok().json(json!({ "success": true, "token": token, "user": user }))
        }
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[get("/")]
pub async fn get_all_users(data: Data<AppState>, claims: Claims) -> impl Responder {
    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "error": "Only administrators may list users." }));
    }

    match query_as::<_, User>("SELECT * FROM users")
        .fetch_all(&data.database)
        .await
    {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[get("/me")]
pub async fn get_me(data: Data<AppState>, claims: Claims) -> impl Responder {
    match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(claims.id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound()
            .json(json!({ "success": false, "error": "This account no longer exists." })),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[get("/{user_id}")]
pub async fn get_user(data: Data<AppState>, _claims: Claims, path: Path<i32>) -> impl Responder {
    let user_id = path.into_inner();

    match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound()
            .json(json!({ "success": false, "error": format!("User {user_id} was not found.") })),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[put("/update")]
pub async fn update_profile(
    data: Data<AppState>,
    claims: Claims,
    Json(update): Json<ProfileUpdate>,
) -> impl Responder {
    if update.email.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Email must not be empty." }));
    }

    if let Err(err) = query(
        "UPDATE users SET email = ?, first_name = ?, last_name = ?, department_id = ?
         WHERE user_id = ?",
    )
    .bind(&update.email)
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(update.department_id)
    .bind(claims.id)
    .execute(&data.database)
    .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(claims.id)
        .fetch_one(&data.database)
        .await
    {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[put("/password")]
pub async fn update_password(
    data: Data<AppState>,
    claims: Claims,
    Json(update): Json<PasswordUpdate>,
) -> impl Responder {
    if update.new_password.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "The new password must not be empty." }));
    }

    let user = match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(claims.id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(json!({ "success": false, "error": "This account no longer exists." }))
        }
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    if user.password != update.current_password {
        return HttpResponse::Unauthorized()
            .json(json!({ "success": false, "error": "The current password does not match." }));
    }

    match query("UPDATE users SET password = ? WHERE user_id = ?")
        .bind(&update.new_password)
        .bind(claims.id)
        .execute(&data.database)
        .await
    {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[post("/profile-image")]
pub async fn upload_profile_image(
    data: Data<AppState>,
    claims: Claims,
    mut payload: Multipart,
) -> impl Responder {
    let mut stored_path = None;

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
        stored_path = match upload::save_image(&mut field, &data.image_dir()).await {
            Ok(path) => Some(path),
            Err(err) => {
                return HttpResponse::BadRequest()
                    .json(json!({ "success": false, "error": err }))
            }
        };
        break;
    }

    let stored_path = match stored_path {
        Some(path) => path,
        None => {
            return HttpResponse::BadRequest()
                .json(json!({ "success": false, "error": "No image was attached." }))
        }
    };

    if let Err(err) = query("UPDATE users SET profile_image_path = ? WHERE user_id = ?")
        .bind(&stored_path)
        .bind(claims.id)
        .execute(&data.database)
        .await
    {
        return HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() }));
    }

    match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(claims.id)
        .fetch_one(&data.database)
        .await
    {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[delete("/delete/{user_id}")]
pub async fn delete_user(data: Data<AppState>, claims: Claims, path: Path<i32>) -> impl Responder {
    let user_id = path.into_inner();

    if claims.role != UserRole::Admin {
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "error": "Only administrators may delete users." }));
    }
    if claims.id == user_id {
        return HttpResponse::Forbidden().json(
            json!({ "success": false, "error": "Administrators cannot delete their own account." }),
        );
    }

    let user = match query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&data.database)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(
                json!({ "success": false, "error": format!("User {user_id} was not found.") }),
            )
        }
        Err(err) => {
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "error": err.to_string() }))
        }
    };

    match query("DELETE FROM users WHERE user_id = ?")
        .bind(user_id)
        .execute(&data.database)
        .await
    {
        Ok(_) => HttpResponse::Ok().json(user),
        Err(err) => HttpResponse::InternalServerError()
            .json(json!({ "success": false, "error": err.to_string() })),
    }
}
