use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{JwtConfig, MIN_SECRET_KEY_BYTES};
use crate::models::{AccountType, Role};
use crate::services::permissions::IsnPerms;
use crate::services::ServiceError;

/// JWT service for access token signing and validation (HS256)
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_token_expiry_minutes: i64,
}

/// Claims carried by an access token.
///
/// `account_type` and `role` hold the wire codes. A signed token with a code
/// this service does not recognise is a data integrity failure, surfaced by
/// [`AccessTokenClaims::role`] and [`AccessTokenClaims::account_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (account ID)
    pub sub: String,
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub account_id: Uuid,
    pub account_type: String,
    pub role: String,
    pub isn_perms: IsnPerms,
}

impl AccessTokenClaims {
    pub fn account_type(&self) -> Result<AccountType, ServiceError> {
        self.account_type.parse().map_err(ServiceError::DataIntegrity)
    }

    pub fn role(&self) -> Result<Role, ServiceError> {
        self.role.parse().map_err(ServiceError::DataIntegrity)
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(anyhow::anyhow!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_KEY_BYTES
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked after decoding so the boundary is inclusive.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "iss", "iat", "exp"]);
        validation.set_issuer(&[config.issuer.as_str()]);

        tracing::info!(issuer = %config.issuer, "JWT service initialized with HS256 key");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        })
    }

    /// Assemble and sign claims issued now.
    pub fn issue(
        &self,
        account_id: Uuid,
        account_type: AccountType,
        role: Role,
        isn_perms: IsnPerms,
    ) -> Result<(String, AccessTokenClaims), ServiceError> {
        self.issue_at(account_id, account_type, role, isn_perms, Utc::now())
    }

    pub fn issue_at(
        &self,
        account_id: Uuid,
        account_type: AccountType,
        role: Role,
        isn_perms: IsnPerms,
        now: DateTime<Utc>,
    ) -> Result<(String, AccessTokenClaims), ServiceError> {
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: account_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            account_id,
            account_type: account_type.as_str().to_string(),
            role: role.as_str().to_string(),
            isn_perms,
        };

        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn sign(&self, claims: &AccessTokenClaims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// Validate and decode an access token
    pub fn validate(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate against an explicit clock. A token whose `exp` equals `now`
    /// is already expired.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<AccessTokenClaims, ServiceError> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ServiceError::AccessTokenExpired,
                _ => ServiceError::AccessTokenInvalid(format!("Invalid access token: {}", e)),
            })?;
        let claims = token_data.claims;

        if claims.exp <= now {
            return Err(ServiceError::AccessTokenExpired);
        }

        let subject = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::AccessTokenInvalid("Subject is not an account id".to_string()))?;
        if subject != claims.account_id {
            return Err(ServiceError::AccessTokenInvalid(
                "Subject does not match account_id".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Access token lifetime in seconds (for client info)
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}
