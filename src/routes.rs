//! HTTP JSON handlers for the public profile read, the admin CRUD surface,
//! and the auth lifecycle. Admin routes are guarded by [`require_admin`],
//! layered over the admin sub-router.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    auth::{
        ADMIN_ROLE, TOKEN_TTL_LABEL, extract_bearer, hash_password, issue_token,
        validate_password_strength, verify_password, verify_token,
    },
    error::AppError,
    state::State as AppState,
    store::{AchievementsMap, AdminRecord, is_valid_year},
};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

const CACHE_CONTROL_VALUE: &str = "public, max-age=300, s-maxage=300";

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer);

    let Some(token) = token else {
        return AppError::Unauthorized("No token provided").into_response();
    };

    if verify_token(&state.config.token_secret, token).is_none() {
        return AppError::Unauthorized("Invalid or expired token").into_response();
    }

    next.run(req).await
}

/// Public read, cacheable for 5 minutes.
pub async fn achievements_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let achievements = state.store.get_all().await;

    (
        [(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)],
        Json(json!({ "success": true, "data": achievements })),
    )
}

pub async fn admin_achievements_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let achievements = state.store.get_all().await;

    Json(json!({ "success": true, "data": achievements }))
}

/// Clients send the year as either a JSON string or a bare number; both
/// normalize to the string form the store keys on.
fn year_param(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(year)) => Some(year),
        Some(Value::Number(year)) => Some(year.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
pub struct AddAchievement {
    year: Option<Value>,
    achievement: Option<String>,
}

pub async fn add_achievement_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddAchievement>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(year), Some(achievement)) = (year_param(body.year), body.achievement) else {
        return Err(AppError::Validation(
            "Year and achievement are required".to_string(),
        ));
    };

    let in_range = year
        .parse::<i32>()
        .map(|y| (1900..=2100).contains(&y))
        .unwrap_or(false);
    if !is_valid_year(&year) || !in_range {
        return Err(AppError::Validation(
            "Year must be a valid year between 1900 and 2100".to_string(),
        ));
    }

    let achievement = achievement.trim();
    if achievement.is_empty() {
        return Err(AppError::Validation(
            "Achievement must be a non-empty string".to_string(),
        ));
    }

    let achievements = state.store.add(&year, achievement).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Achievement added successfully",
            "data": achievements,
        })),
    ))
}

#[derive(Deserialize)]
pub struct UpdateAchievement {
    year: Option<Value>,
    index: Option<i64>,
    achievement: Option<String>,
}

pub async fn update_achievement_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateAchievement>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(year), Some(index), Some(achievement)) =
        (year_param(body.year), body.index, body.achievement)
    else {
        return Err(AppError::Validation(
            "Year, index, and achievement are required".to_string(),
        ));
    };

    if index < 0 {
        return Err(AppError::Validation(
            "Index must be a non-negative number".to_string(),
        ));
    }

    let achievement = achievement.trim();
    if achievement.is_empty() {
        return Err(AppError::Validation(
            "Achievement must be a non-empty string".to_string(),
        ));
    }

    let achievements = state
        .store
        .update(&year, index as usize, achievement)
        .await
        .ok_or(AppError::NotFound("Achievement not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Achievement updated successfully",
        "data": achievements,
    })))
}

#[derive(Deserialize)]
pub struct DeleteAchievement {
    year: Option<Value>,
    index: Option<i64>,
}

pub async fn delete_achievement_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DeleteAchievement>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(year), Some(index)) = (year_param(body.year), body.index) else {
        return Err(AppError::Validation(
            "Year and index are required".to_string(),
        ));
    };

    if index < 0 {
        return Err(AppError::Validation(
            "Index must be a non-negative number".to_string(),
        ));
    }

    let achievements = state
        .store
        .delete(&year, index as usize)
        .await
        .ok_or(AppError::NotFound("Achievement not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Achievement deleted successfully",
        "data": achievements,
    })))
}

#[derive(Deserialize)]
pub struct ReplaceAchievements {
    achievements: Option<Value>,
}

pub async fn replace_achievements_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReplaceAchievements>,
) -> Result<impl IntoResponse, AppError> {
    let Some(Value::Object(entries)) = body.achievements else {
        return Err(AppError::Validation(
            "Achievements object is required".to_string(),
        ));
    };

    let mut replacement = AchievementsMap::new();
    for (year, items) in entries {
        if !is_valid_year(&year) {
            return Err(AppError::Validation(format!("Invalid year format: {year}")));
        }
        let items: Vec<String> = serde_json::from_value(items).map_err(|_| {
            AppError::Validation(format!("Achievements for year {year} must be an array"))
        })?;
        replacement.insert(year, items);
    }

    let achievements = state.store.replace_all(replacement).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Achievements updated successfully",
        "data": achievements,
    })))
}

#[derive(Deserialize)]
pub struct GradeBody {
    grade: Option<String>,
}

pub async fn get_grade_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "success": true, "data": state.store.get_grade().await }))
}

pub async fn put_grade_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GradeBody>,
) -> Result<impl IntoResponse, AppError> {
    let grade = non_empty(body.grade, "Grade must be a non-empty string")?;

    state.store.set_grade(&grade).await;

    Ok(Json(json!({
        "success": true,
        "message": "Grade updated",
        "data": grade,
    })))
}

#[derive(Deserialize)]
pub struct BioBody {
    bio: Option<String>,
}

pub async fn get_bio_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "success": true, "data": state.store.get_bio().await }))
}

pub async fn put_bio_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BioBody>,
) -> Result<impl IntoResponse, AppError> {
    let bio = non_empty(body.bio, "Bio must be a non-empty string")?;

    state.store.set_bio(&bio).await;

    Ok(Json(json!({
        "success": true,
        "message": "Bio updated",
        "data": bio,
    })))
}

#[derive(Deserialize)]
pub struct BirthdayBody {
    birthday: Option<String>,
}

pub async fn get_birthday_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "success": true, "data": state.store.get_birthday().await }))
}

pub async fn put_birthday_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BirthdayBody>,
) -> Result<impl IntoResponse, AppError> {
    let birthday = non_empty(body.birthday, "Birthday must be a non-empty string")?;

    if !DATE_RE.is_match(&birthday) {
        return Err(AppError::Validation(
            "Birthday must be in YYYY-MM-DD format".to_string(),
        ));
    }

    state.store.set_birthday(&birthday).await;

    Ok(Json(json!({
        "success": true,
        "message": "Birthday updated",
        "data": birthday,
    })))
}

fn non_empty(value: Option<String>, message: &str) -> Result<String, AppError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::Validation(message.to_string())),
    }
}

#[derive(Deserialize)]
pub struct PasswordBody {
    password: Option<String>,
}

/// One-time admin creation. Refused once a record exists; the write must
/// land in the backing store or the whole operation fails.
pub async fn setup_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PasswordBody>,
) -> Result<impl IntoResponse, AppError> {
    if state.store.is_admin_setup().await {
        return Err(AppError::AlreadySetup);
    }

    let Some(password) = body.password.filter(|p| !p.is_empty()) else {
        return Err(AppError::Validation("Password is required".to_string()));
    };

    let requirements = validate_password_strength(&password);
    if !requirements.is_empty() {
        return Err(AppError::WeakPassword(requirements));
    }

    let record = AdminRecord::new(hash_password(&password));
    state.store.set_admin(record).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Admin account created successfully. You can now login.",
        })),
    ))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PasswordBody>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store.is_admin_setup().await {
        return Err(AppError::NotSetup);
    }

    let Some(password) = body.password.filter(|p| !p.is_empty()) else {
        return Err(AppError::Validation("Password is required".to_string()));
    };

    let admin = state
        .store
        .get_admin()
        .await
        .filter(|admin| !admin.hashed_password.is_empty())
        .ok_or_else(|| anyhow::anyhow!("admin record missing after setup check"))?;

    if !verify_password(&password, &admin.hashed_password) {
        return Err(AppError::Unauthorized("Invalid password"));
    }

    let token = issue_token(&state.config.token_secret, ADMIN_ROLE);

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "expiresIn": TOKEN_TTL_LABEL,
    })))
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let setup_complete = state.store.is_admin_setup().await;

    Json(json!({
        "success": true,
        "setupRequired": !setup_complete,
        "message": if setup_complete {
            "Admin account is configured"
        } else {
            "Please setup admin account at /auth/setup"
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth, config::Config, store::Store, testutil::MemoryKv};

    const SECRET: &str = "test-secret";

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Config {
                port: 0,
                redis_url: String::new(),
                token_secret: SECRET.to_string(),
            },
            store: Store::new(Some(Arc::new(MemoryKv::default()))),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_setup_login_admin_scenario() {
        let state = test_state();

        // Weak password is rejected with the full requirements list
        let response = setup_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("Weak1".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Weak password");
        assert!(
            body["requirements"]
                .as_array()
                .unwrap()
                .iter()
                .any(|r| r.as_str().unwrap().contains("special character"))
        );

        // Strong password succeeds once
        let response = setup_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("Str0ng!Pass".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Second setup attempt is refused
        let response = setup_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("An0ther!Pass".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Already setup");

        // Wrong password is a generic 401
        let response = login_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("Wr0ng!Pass".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Correct password yields a verifiable 2h token
        let response = login_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("Str0ng!Pass".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["expiresIn"], "2h");
        let token = body["token"].as_str().unwrap();
        let claims = auth::verify_token(SECRET, token).unwrap();
        assert_eq!(claims.role, ADMIN_ROLE);
    }

    #[tokio::test]
    async fn test_login_before_setup() {
        let state = test_state();

        let response = login_handler(
            State(state),
            Json(PasswordBody {
                password: Some("Str0ng!Pass".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Not setup");
    }

    #[tokio::test]
    async fn test_status_tracks_setup() {
        let state = test_state();

        let response = status_handler(State(state.clone())).await.into_response();
        assert_eq!(body_json(response).await["setupRequired"], true);

        setup_handler(
            State(state.clone()),
            Json(PasswordBody {
                password: Some("Str0ng!Pass".to_string()),
            }),
        )
        .await
        .into_response();

        let response = status_handler(State(state)).await.into_response();
        assert_eq!(body_json(response).await["setupRequired"], false);
    }

    #[tokio::test]
    async fn test_public_read_sets_cache_header() {
        let state = test_state();

        let response = achievements_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            CACHE_CONTROL_VALUE
        );
    }

    #[tokio::test]
    async fn test_add_achievement_validation() {
        let state = test_state();

        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: Some(json!("20x5")),
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: Some(json!("1850")),
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: Some(json!("2026")),
                achievement: Some("   ".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: None,
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_achievement_handler(
            State(state),
            Json(AddAchievement {
                year: Some(json!("2026")),
                achievement: Some("  Shipped it  ".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["2026"][0], "Shipped it");
    }

    #[tokio::test]
    async fn test_update_and_delete_not_found() {
        let state = test_state();

        let response = update_achievement_handler(
            State(state.clone()),
            Json(UpdateAchievement {
                year: Some(json!("1999")),
                index: Some(0),
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = delete_achievement_handler(
            State(state.clone()),
            Json(DeleteAchievement {
                year: Some(json!("1999")),
                index: Some(0),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Negative index is a validation error, not a miss
        let response = delete_achievement_handler(
            State(state),
            Json(DeleteAchievement {
                year: Some(json!("1999")),
                index: Some(-1),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_replace_achievements_validation() {
        let state = test_state();

        let response = replace_achievements_handler(
            State(state.clone()),
            Json(ReplaceAchievements { achievements: None }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = replace_achievements_handler(
            State(state.clone()),
            Json(ReplaceAchievements {
                achievements: Some(json!({ "20x5": ["entry"] })),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body_json(response).await["message"]
                .as_str()
                .unwrap()
                .contains("Invalid year format")
        );

        let response = replace_achievements_handler(
            State(state.clone()),
            Json(ReplaceAchievements {
                achievements: Some(json!({ "2025": "not-an-array" })),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body_json(response).await["message"]
                .as_str()
                .unwrap()
                .contains("must be an array")
        );

        let response = replace_achievements_handler(
            State(state.clone()),
            Json(ReplaceAchievements {
                achievements: Some(json!({ "2025": ["kept"] })),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.get_all().await["2025"], vec!["kept"]);
    }

    #[tokio::test]
    async fn test_scalar_handlers() {
        let state = test_state();

        let response = put_birthday_handler(
            State(state.clone()),
            Json(BirthdayBody {
                birthday: Some("not-a-date".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = put_birthday_handler(
            State(state.clone()),
            Json(BirthdayBody {
                birthday: Some("2009-05-17".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = put_grade_handler(
            State(state.clone()),
            Json(GradeBody {
                grade: Some(" 11 ".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(body_json(response).await["data"], "11");

        let response = put_bio_handler(State(state.clone()), Json(BioBody { bio: None }))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get_birthday_handler(State(state)).await.into_response();
        assert_eq!(body_json(response).await["data"], "2009-05-17");
    }

    #[tokio::test]
    async fn test_achievement_year_accepts_json_number() {
        let state = test_state();

        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: Some(json!(2026)),
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["data"]["2026"][0], "entry");

        let response = update_achievement_handler(
            State(state.clone()),
            Json(UpdateAchievement {
                year: Some(json!(2026)),
                index: Some(0),
                achievement: Some("edited".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        // Non-integral numbers fail the year format check, not deserialization
        let response = add_achievement_handler(
            State(state.clone()),
            Json(AddAchievement {
                year: Some(json!(20.5)),
                achievement: Some("entry".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = delete_achievement_handler(
            State(state),
            Json(DeleteAchievement {
                year: Some(json!(2026)),
                index: Some(0),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_bearer_token() {
        use axum::body::Body;
        use tower::ServiceExt;

        let state = test_state();
        let app = crate::build_router(state);

        // No Authorization header
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/admin/achievements")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "No token provided");

        // Garbage token
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/admin/achievements")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid or expired token");

        // Freshly issued token passes through to the handler
        let token = issue_token(SECRET, ADMIN_ROLE);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/admin/achievements")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["data"].is_object());
    }
}
