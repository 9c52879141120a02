mod auth;
mod form;
mod mailer;
mod models;
mod roomchange;
mod schedule;
mod schedule_store;
mod upload;
mod user;

use std::path::PathBuf;
use std::{env, fs, io};

use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::Logger;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info, warn, LevelFilter};
use serde_json::json;
use sqlx::mysql::MySqlPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::mailer::Mailer;
use crate::models::AppState;

fn initalize_syslog() {
    let log_level: LevelFilter = match env::var("LOG_LEVEL") {
        Err(_) => log::LevelFilter::Warn,
        Ok(value) => match value.to_uppercase().as_str() {
            "ERROR" => log::LevelFilter::Error,
            "WARNING" => log::LevelFilter::Warn,
            "INFO" => log::LevelFilter::Info,
            "DEBUG" => log::LevelFilter::Debug,
            "TRACE" => log::LevelFilter::Trace,
            "OFF" => log::LevelFilter::Off,
            _ => log::LevelFilter::Warn,
        },
    };
    let log_result = syslog::init(syslog::Facility::LOG_SYSLOG, log_level, None);
    if log_result.is_err() {
        eprintln!("WARNING! Failed to initialize logging system! Server logs will be unavaliable!");
    }
}

fn required_env(name: &str) -> String {
    match env::var(name) {
        Ok(value) => value,
        Err(err) => {
            let message = format!("ERROR: Unable to read the {name} enviroment variable: {err}");
            error!("{message}");
            eprintln!("{message}");
            panic!("{err}");
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        roomchange::add_request,
        roomchange::get_all_requests,
        roomchange::get_request,
        roomchange::update_request,
        roomchange::delete_request,
        schedule::get_all_schedules,
        schedule::get_schedule,
        schedule::get_room_schedules,
        schedule::add_schedule,
        schedule::update_schedule,
        schedule::delete_schedule,
        schedule_store::upload_schedule_file,
        schedule_store::get_json_schedules,
        schedule_store::get_json_files,
        schedule_store::filter_json_schedules,
        schedule_store::get_json_stats,
    ),
    components(schemas(
        models::RoomChangeForm,
        models::Schedule,
        roomchange::RoomChangeSubmission,
        roomchange::RoomChangeUpdate,
        schedule::ScheduleSubmission,
    ))
)]
struct ApiDoc;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "success": true, "status": "ok" }))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .json(json!({ "success": false, "error": "The requested resource was not found." }))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    initalize_syslog();

    let database_url = required_env("DATABASE_URL");
    let jwt_secret = required_env("JWT_SECRET");
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let upload_dir = PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));

    let pool = match MySqlPool::connect_lazy(database_url.as_str()) {
        Ok(pool) => {
            info!("Connected to the database");
            pool
        }
        Err(err) => {
            let message = format!("ERROR: Failed to connect to the database: {err}");
            error!("{message}");
            eprintln!("{message}");
            panic!("{err}");
        }
    };

    fs::create_dir_all(upload_dir.join("images"))?;
    fs::create_dir_all(upload_dir.join("schedules"))?;

    let mailer = Mailer::from_env();
    if mailer.is_none() {
        warn!("SMTP is not configured, notification emails are disabled");
    }

    let state = web::Data::new(AppState {
        database: pool,
        jwt_secret,
        mailer,
        upload_dir: upload_dir.clone(),
    });
    let openapi = ApiDoc::openapi();

    info!("Starting classroom-api on port {port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .service(health)
            .service(user::scope())
            .service(form::scope())
            .service(roomchange::scope())
            .service(schedule::scope())
            .service(Files::new("/uploads", upload_dir.clone()))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
            .default_service(web::route().to(not_found))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
