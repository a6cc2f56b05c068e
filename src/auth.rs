/// Principal resolution
///
/// Mirrors the teacher's `crypto_core::jwt` pattern: the JWT decoding key
/// is parsed once at startup and stored behind a `OnceCell`, the one kind
/// of process-wide state this service allows (immutable configuration,
/// never a mutable service handle).
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, AuthMode};
use crate::error::AppError;

static JWT_DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub is_admin: bool,
    pub rate_key: String,
}

/// Parse and cache the JWT decoding key. Call once, during startup.
pub fn init_jwt_key(cfg: &AuthConfig) -> Result<(), AppError> {
    let key = DecodingKey::from_secret(cfg.jwt_secret.as_bytes());
    JWT_DECODING_KEY
        .set(key)
        .map_err(|_| AppError::Internal("JWT decoding key already initialized".into()))
}

fn decoding_key() -> Result<&'static DecodingKey, AppError> {
    JWT_DECODING_KEY
        .get()
        .ok_or_else(|| AppError::Internal("JWT decoding key not initialized".into()))
}

/// Resolve a principal from the request's credentials per the configured
/// `auth_mode`: bearer JWT is tried first when the mode allows it, then
/// the `X-API-Key` header.
pub fn resolve_principal(
    cfg: &AuthConfig,
    authorization_header: Option<&str>,
    api_key_header: Option<&str>,
) -> Result<Principal, AppError> {
    let try_jwt = matches!(cfg.mode, AuthMode::Jwt | AuthMode::Hybrid);
    let try_api_key = matches!(cfg.mode, AuthMode::ApiKey | AuthMode::Hybrid);

    if try_jwt {
        if let Some(header) = authorization_header {
            if let Some(token) = header.strip_prefix("Bearer ") {
                return resolve_jwt(cfg, token);
            }
        }
    }

    if try_api_key {
        if let Some(api_key) = api_key_header {
            return resolve_api_key(cfg, api_key);
        }
    }

    Err(AppError::Auth("missing credentials".into()))
}

fn resolve_jwt(cfg: &AuthConfig, token: &str) -> Result<Principal, AppError> {
    let algorithm = match cfg.jwt_algorithm.as_str() {
        "HS256" => Algorithm::HS256,
        "RS256" => Algorithm::RS256,
        other => return Err(AppError::Internal(format!("unsupported jwt algorithm: {other}"))),
    };

    let mut validation = Validation::new(algorithm);
    if let Some(audience) = &cfg.jwt_audience {
        validation.set_audience(&[audience]);
    }
    if let Some(issuer) = &cfg.jwt_issuer {
        validation.set_issuer(&[issuer]);
    }

    let key = decoding_key()?;
    let data = jsonwebtoken::decode::<Claims>(token, key, &validation)
        .map_err(|e| AppError::Auth(format!("invalid token: {e}")))?;

    let user_id = data.claims.sub;
    Ok(Principal {
        is_admin: cfg.admin_user_ids.iter().any(|id| id == &user_id),
        rate_key: user_id.clone(),
        user_id,
    })
}

fn resolve_api_key(cfg: &AuthConfig, api_key: &str) -> Result<Principal, AppError> {
    let user_id = cfg
        .api_key_mappings
        .iter()
        .find(|(key, _)| key == api_key)
        .map(|(_, user)| user.clone())
        .ok_or_else(|| AppError::Auth("unknown api key".into()))?;

    Ok(Principal {
        is_admin: cfg.admin_user_ids.iter().any(|id| id == &user_id),
        rate_key: api_key.to_string(),
        user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Hybrid,
            api_key_mappings: vec![("k1".into(), "u1".into())],
            admin_user_ids: vec!["u1".into()],
            api_rate_limit_per_minute: 600,
            jwt_secret: "dev-secret".into(),
            jwt_algorithm: "HS256".into(),
            jwt_audience: None,
            jwt_issuer: None,
        }
    }

    #[test]
    fn resolves_principal_from_api_key() {
        let cfg = config();
        let principal = resolve_principal(&cfg, None, Some("k1")).unwrap();
        assert_eq!(principal.user_id, "u1");
        assert!(principal.is_admin);
        assert_eq!(principal.rate_key, "k1");
    }

    #[test]
    fn rejects_unknown_api_key() {
        let cfg = config();
        assert!(resolve_principal(&cfg, None, Some("nope")).is_err());
    }

    #[test]
    fn rejects_missing_credentials() {
        let cfg = config();
        assert!(resolve_principal(&cfg, None, None).is_err());
    }
}
