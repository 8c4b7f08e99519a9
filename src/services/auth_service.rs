use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::{
        AccessToken, Claims, RefreshRequest, RegisterRequest, RegisterResponse, TokenPair,
        TokenRequest, TokenType,
    },
    entity::{
        customers::{ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::User,
    response::{ApiResponse, Meta},
    services::customer_service::customer_from_entity,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

/// Customer fields resolved from a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

pub fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("username is required".into()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN
        || payload.password2.chars().count() < MIN_PASSWORD_LEN
    {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if payload.password != payload.password2 {
        return Err(AppError::Validation("passwords don't match".into()));
    }
    Ok(())
}

/// Fills customer fields the caller left out from the account itself.
pub fn customer_profile(payload: &RegisterRequest) -> CustomerProfile {
    let nested = payload.customer.as_ref();
    let provided = |pick: fn(&crate::dto::auth::RegisterCustomer) -> &Option<String>| {
        nested
            .and_then(|c| pick(c).as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let full_name = provided(|c| &c.full_name).unwrap_or_else(|| {
        let joined = format!("{} {}", payload.first_name.trim(), payload.last_name.trim());
        let joined = joined.trim();
        if joined.is_empty() {
            payload.username.trim().to_string()
        } else {
            joined.to_string()
        }
    });

    CustomerProfile {
        full_name,
        email: provided(|c| &c.email).unwrap_or_else(|| payload.email.trim().to_string()),
        phone: provided(|c| &c.phone).unwrap_or_default(),
        address: provided(|c| &c.address).unwrap_or_default(),
        city: provided(|c| &c.city).unwrap_or_default(),
        country: provided(|c| &c.country).unwrap_or_default(),
    }
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<RegisterResponse>> {
    validate_registration(&payload)?;
    let profile = customer_profile(&payload);
    if profile.email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    let password_hash = hash_password(&payload.password)?;

    let txn = state.orm.begin().await?;

    let username_taken = Users::find()
        .filter(UserCol::Username.eq(payload.username.trim()))
        .one(&txn)
        .await?
        .is_some();
    if username_taken {
        return Err(AppError::Conflict("username is already taken".into()));
    }

    let email_taken = Customers::find()
        .filter(CustomerCol::Email.eq(profile.email.as_str()))
        .one(&txn)
        .await?
        .is_some();
    if email_taken {
        return Err(AppError::Conflict(
            "a customer with this email already exists".into(),
        ));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(payload.username.trim().to_string()),
        email: Set(payload.email.trim().to_string()),
        first_name: Set(payload.first_name.trim().to_string()),
        last_name: Set(payload.last_name.trim().to_string()),
        password_hash: Set(password_hash),
        role: Set("user".into()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let customer = CustomerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user.id)),
        full_name: Set(profile.full_name),
        email: Set(profile.email),
        phone: Set(profile.phone),
        address: Set(profile.address),
        city: Set(profile.city),
        country: Set(profile.country),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(user_id = %user.id, customer_id = %customer.id, "account registered");

    Ok(ApiResponse::success(
        "User created",
        RegisterResponse {
            user: user_from_entity(user),
            customer: customer_from_entity(customer, 0),
        },
        Some(Meta::empty()),
    ))
}

pub async fn obtain_token(
    state: &AppState,
    payload: TokenRequest,
) -> AppResult<ApiResponse<TokenPair>> {
    let user = Users::find()
        .filter(UserCol::Username.eq(payload.username.trim()))
        .one(&state.orm)
        .await?
        .ok_or_else(invalid_credentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }

    let pair = TokenPair {
        access: issue_token(&state.config, user.id, &user.role, TokenType::Access)?,
        refresh: issue_token(&state.config, user.id, &user.role, TokenType::Refresh)?,
    };

    tracing::info!(user_id = %user.id, "token issued");
    Ok(ApiResponse::success("Logged in", pair, Some(Meta::empty())))
}

pub async fn refresh_token(
    state: &AppState,
    payload: RefreshRequest,
) -> AppResult<ApiResponse<AccessToken>> {
    let claims = decode_token(&state.config.jwt_secret, &payload.refresh, TokenType::Refresh)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("invalid user id in token".into()))?;

    // Role is re-read so a demoted account does not keep elevated access.
    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;

    let access = issue_token(&state.config, user.id, &user.role, TokenType::Access)?;
    Ok(ApiResponse::success(
        "Token refreshed",
        AccessToken { access },
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    role: &str,
    token_type: TokenType,
) -> AppResult<String> {
    let ttl = match token_type {
        TokenType::Access => Duration::try_minutes(config.access_ttl_minutes),
        TokenType::Refresh => Duration::try_days(config.refresh_ttl_days),
    }
    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token lifetime out of range")))?;

    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        token_type,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(secret: &str, token: &str, expected: TokenType) -> AppResult<Claims> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("invalid or expired token".into()))?;

    if decoded.claims.token_type != expected {
        return Err(AppError::Unauthorized("wrong token type".into()));
    }
    Ok(decoded.claims)
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid username or password".into())
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        first_name: model.first_name,
        last_name: model.last_name,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::auth::RegisterCustomer;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "marta".into(),
            email: "marta@example.com".into(),
            password: "correct-horse".into(),
            password2: "correct-horse".into(),
            first_name: "Marta".into(),
            last_name: "Kowalska".into(),
            customer: None,
        }
    }

    #[test]
    fn mismatched_passwords_fail_validation() {
        let mut req = request();
        req.password2 = "correct-horsf".into();
        assert!(matches!(
            validate_registration(&req),
            Err(AppError::Validation(msg)) if msg.contains("don't match")
        ));
    }

    #[test]
    fn short_passwords_fail_validation() {
        let mut req = request();
        req.password = "short".into();
        req.password2 = "short".into();
        assert!(matches!(validate_registration(&req), Err(AppError::Validation(_))));
        assert!(validate_registration(&request()).is_ok());
    }

    #[test]
    fn customer_fields_fall_back_to_account() {
        let profile = customer_profile(&request());
        assert_eq!(profile.full_name, "Marta Kowalska");
        assert_eq!(profile.email, "marta@example.com");
        assert_eq!(profile.phone, "");
        assert_eq!(profile.country, "");
    }

    #[test]
    fn nameless_account_uses_username() {
        let mut req = request();
        req.first_name.clear();
        req.last_name.clear();
        assert_eq!(customer_profile(&req).full_name, "marta");
    }

    #[test]
    fn nested_customer_fields_win() {
        let mut req = request();
        req.customer = Some(RegisterCustomer {
            full_name: Some("M. Kowalska".into()),
            email: Some("orders@kowalska.pl".into()),
            city: Some("Gdansk".into()),
            phone: Some("   ".into()),
            ..Default::default()
        });
        let profile = customer_profile(&req);
        assert_eq!(profile.full_name, "M. Kowalska");
        assert_eq!(profile.email, "orders@kowalska.pl");
        assert_eq!(profile.city, "Gdansk");
        assert_eq!(profile.phone, "");
    }

    #[test]
    fn refresh_tokens_are_not_access_tokens() {
        let config = AppConfig::for_database("postgres://localhost/unused");
        let user_id = Uuid::new_v4();

        let access = issue_token(&config, user_id, "user", TokenType::Access).unwrap();
        let claims = decode_token(&config.jwt_secret, &access, TokenType::Access).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");

        let refresh = issue_token(&config, user_id, "user", TokenType::Refresh).unwrap();
        assert!(matches!(
            decode_token(&config.jwt_secret, &refresh, TokenType::Access),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let config = AppConfig::for_database("postgres://localhost/unused");
        let token = issue_token(&config, Uuid::new_v4(), "admin", TokenType::Access).unwrap();
        assert!(decode_token("other-secret", &token, TokenType::Access).is_err());
    }
}
