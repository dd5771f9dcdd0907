use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    auth::claims::{Claims, RefreshClaims, REFRESH_TOKEN_TYPE},
    errors::{AppError, AppResult},
    models::domain::user::User,
};

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_hours: i64,
    refresh_expiration_hours: i64,
}

impl JwtService {
    pub fn new(secret: &SecretString, expiration_hours: i64, refresh_expiration_hours: i64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation: Validation::default(),
            expiration_hours,
            refresh_expiration_hours,
        }
    }

    fn sign<T: Serialize>(&self, claims: &T, kind: &str) -> AppResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to sign {} token: {}", kind, e)))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, kind: &str) -> AppResult<T> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "has expired".to_string(),
                    ErrorKind::InvalidSignature => "signature is invalid".to_string(),
                    ErrorKind::InvalidToken => "is malformed".to_string(),
                    _ => format!("failed validation: {}", e),
                };
                AppError::Unauthorized(format!("The {} token {}", kind, reason))
            })
    }

    pub fn create_token(&self, user: &User) -> AppResult<String> {
        self.sign(&Claims::new(user, self.expiration_hours), "access")
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        self.verify(token, "access")
    }

    /// Returns the encoded token with its claims so the caller can persist the `jti`.
    pub fn create_refresh_token(&self, user_id: &str) -> AppResult<(String, RefreshClaims)> {
        let claims = RefreshClaims::new(user_id, self.refresh_expiration_hours);
        let token = self.sign(&claims, "refresh")?;
        Ok((token, claims))
    }

    pub fn refresh_expiration_hours(&self) -> i64 {
        self.refresh_expiration_hours
    }

    pub fn validate_refresh_token(&self, token: &str) -> AppResult<RefreshClaims> {
        let claims: RefreshClaims = self.verify(token, "refresh")?;
        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(AppError::Unauthorized("Token is not a refresh token".to_string()));
        }
        Ok(claims)
    }
}
