use std::fmt;
use std::future::{ready, Ready};

use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{dev::Payload, FromRequest, HttpRequest, HttpResponse, ResponseError};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};

use crate::models::{AppState, User, UserRole};

pub const TOKEN_LIFETIME: Duration = Duration::hours(24);

/// Bearer token payload. Extracting `Claims` in a handler is what makes the
/// route require authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
}

#[derive(Debug)]
pub struct AuthError(pub String);

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(json!({ "success": false, "error": self.0 }))
    }
}

pub fn create_token(user: &User, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        id: user.user_id,
        email: user.email.clone(),
        role: user.user_role,
        exp: (OffsetDateTime::now_utc() + TOKEN_LIFETIME).unix_timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

impl FromRequest for Claims {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req))
    }
}

fn claims_from_request(req: &HttpRequest) -> Result<Claims, AuthError> {
    let header = match req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        Some(header) => header,
        None => return Err(AuthError("Missing Authorization header.".to_string())),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(token) => token,
        None => {
            return Err(AuthError(
                "Authorization header is not a bearer token.".to_string(),
            ))
        }
    };

    let secret = match req.app_data::<Data<AppState>>() {
        Some(data) => data.jwt_secret.clone(),
        None => return Err(AuthError("Authentication is not configured.".to_string())),
    };

    verify_token(token, &secret).map_err(|err| AuthError(format!("Invalid token: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            user_id: 7,
            email: "checker@campus.edu".to_string(),
            password: "hunter2".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Reyes".to_string(),
            user_role: UserRole::Checker,
            department_id: Some(3),
            profile_image_path: None,
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let token = create_token(&sample_user(), "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.email, "checker@campus.edu");
        assert_eq!(claims.role, UserRole::Checker);
    }

    #[test]
    fn token_expiry_is_one_day_out() {
        let token = create_token(&sample_user(), "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        let expected = (OffsetDateTime::now_utc() + TOKEN_LIFETIME).unix_timestamp();
        assert!((claims.exp - expected).abs() <= 5);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(&sample_user(), "secret").unwrap();
        assert!(verify_token(&token, "not-the-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            id: 7,
            email: "checker@campus.edu".to_string(),
            role: UserRole::Checker,
            // well past the default validation leeway
            exp: (OffsetDateTime::now_utc() - Duration::hours(1)).unix_timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("not-a-jwt", "secret").is_err());
    }
}
