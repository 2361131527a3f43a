use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::AppError,
    model::{
        role::Role,
        user::{Claims, CreateUser, LoginRequest, TokenType, User},
    },
    utils::db_utils::fetch_employee,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token generation failed: {e}"))
}

async fn store_refresh_token(
    tx: &mut Transaction<'_, MySql>,
    claims: &Claims,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Create a login (admin only)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User created", "id": 7
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already exists")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
#[instrument(name = "create_user", skip(auth, pool, payload), fields(username = %payload.username))]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let username = payload.username.trim().to_lowercase();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password must not be empty".to_string(),
        ));
    }
    if Role::from_id(payload.role_id).is_none() {
        return Err(AppError::BadRequest("Unknown role".to_string()));
    }
    if let Some(employee_id) = payload.employee_id {
        if fetch_employee(pool.get_ref(), employee_id).await?.is_none() {
            return Err(AppError::not_found("Employee"));
        }
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query(
        "INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(&hashed)
    .bind(payload.role_id)
    .bind(payload.employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            info!(user_id = done.last_insert_id(), "User created");
            Ok(HttpResponse::Created().json(json!({
                "message": "User created",
                "id": done.last_insert_id()
            })))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(AppError::Conflict("Username already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest("Username or password required".to_string()));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::Unauthorized("Invalid credentials".to_string())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    debug!(user_id = db_user.id, "Password verified");

    let access_token = generate_access_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    let mut tx = pool.begin().await?;
    store_refresh_token(&mut tx, &refresh_claims).await?;
    tx.commit().await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    }))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".to_string());

    let token = bearer_token(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;
    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let (record_id, user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        _ => return Err(unauthorized()),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

    let (new_refresh_token, new_claims) = generate_refresh_token(
        user_id,
        claims.sub.clone(),
        claims.role,
        claims.employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;
    store_refresh_token(&mut tx, &new_claims).await?;
    tx.commit().await?;

    let access_token = generate_access_token(
        user_id,
        claims.sub,
        claims.role,
        claims.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token: new_refresh_token,
    }))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out (also for unknown tokens)")),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = match bearer_token(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(claims)) if claims.token_type == TokenType::Refresh => claims,
        _ => return Ok(HttpResponse::NoContent().finish()),
    };

    // idempotent
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
