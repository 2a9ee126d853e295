use std::sync::Arc;

use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccountData, Config, Database, DatabaseError, DeviceData, NewAccount, PrimaryKey};

/// Tokens stay valid for ten years. Effectively non-expiring; revoking
/// them requires rotating the signing secret.
const TOKEN_VALIDITY_DAYS: i64 = 3650;

pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    issuer: String,
}

/// The authentication strategy a route is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// A signed bearer token carrying an account claim
    User,
    /// Same as [Scheme::User], plus the admin claim must be true
    Admin,
    /// The shared secret of a registered device
    DeviceSecret,
}

/// The outcome of a successful authentication
#[derive(Debug)]
pub enum Verified {
    Account(Principal),
    Device(DeviceData),
}

/// The authenticated caller of a token-protected route
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: PrimaryKey,
    pub admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The account id
    sub: String,
    admin: bool,
    aud: String,
    iss: String,
    exp: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Name, password, token, or device secret is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The token is valid but does not carry the admin claim
    #[error("Missing privileges")]
    MissingPrivileges,
    /// Something else went wrong with the store
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
    #[error("TokenError: {0}")]
    TokenError(String),
}

#[derive(Debug)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainAccount {
    pub name: String,
    pub password: String,
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>, config: &Config) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
            encoding_key: EncodingKey::from_secret(config.jwt.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt.secret.as_bytes()),
            audience: config.jwt.audience.clone(),
            issuer: config.jwt.issuer.clone(),
        }
    }

    /// Verifies a credential under the given scheme, producing the caller
    /// or a rejection.
    pub async fn authenticate(
        &self,
        scheme: Scheme,
        credential: &str,
    ) -> Result<Verified, AuthError> {
        match scheme {
            Scheme::User => self.verify_token(credential).map(Verified::Account),
            Scheme::Admin => {
                let principal = self.verify_token(credential)?;

                if !principal.admin {
                    return Err(AuthError::MissingPrivileges);
                }

                Ok(Verified::Account(principal))
            }
            Scheme::DeviceSecret => {
                let device = self
                    .db
                    .device_by_secret(credential)
                    .await
                    .map_err(|e| match e {
                        DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                        e => AuthError::Db(e),
                    })?;

                Ok(Verified::Device(device))
            }
        }
    }

    /// Logs in an account, returning a freshly minted token
    pub async fn login(&self, credentials: Credentials) -> Result<String, AuthError> {
        let account = self
            .db
            .account_by_name(&credentials.name)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                e => AuthError::Db(e),
            })?;

        let stored_password = PasswordHash::parse(&account.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.mint_token(&account)
    }

    /// Creates an account. The store grants the first account the admin
    /// flag, atomically with the insert.
    pub async fn create_account(
        &self,
        new_account: NewPlainAccount,
    ) -> Result<AccountData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_account.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_account(NewAccount {
                name: new_account.name,
                password: hashed_password,
            })
            .await
            .map_err(AuthError::Db)
    }

    fn mint_token(&self, account: &AccountData) -> Result<String, AuthError> {
        let expires_at = Utc::now() + Duration::days(TOKEN_VALIDITY_DAYS);

        let claims = Claims {
            sub: account.id.to_string(),
            admin: account.admin,
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            exp: expires_at.timestamp() as u64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenError(e.to_string()))
    }

    fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidCredentials)?;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let account_id = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidCredentials)?;

        Ok(Principal {
            account_id,
            admin: claims.admin,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestSetup;

    #[tokio::test]
    async fn test_login_and_user_scheme() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("bjarn").await;

        let token = setup
            .system
            .auth
            .login(Credentials {
                name: "bjarn".to_string(),
                password: TestSetup::PASSWORD.to_string(),
            })
            .await
            .expect("login succeeds");

        let verified = setup
            .system
            .auth
            .authenticate(Scheme::User, &token)
            .await
            .expect("token is accepted");

        match verified {
            Verified::Account(principal) => {
                assert_eq!(principal.account_id, account.id);
                assert!(principal.admin, "first account is the admin");
            }
            Verified::Device(_) => panic!("user scheme produced a device"),
        }
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let setup = TestSetup::new().await;
        setup.create_account("bjarn").await;

        let result = setup
            .system
            .auth
            .login(Credentials {
                name: "bjarn".to_string(),
                password: "not-the-password".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_admin_scheme_rejects_plain_accounts() {
        let setup = TestSetup::new().await;
        setup.create_account("admin").await;
        setup.create_account("plain").await;

        let token = setup.login("plain").await;

        let result = setup.system.auth.authenticate(Scheme::Admin, &token).await;
        assert!(matches!(result, Err(AuthError::MissingPrivileges)));

        // The same token still passes the user scheme
        let user = setup.system.auth.authenticate(Scheme::User, &token).await;
        assert!(user.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("bjarn").await;

        let claims = Claims {
            sub: account.id.to_string(),
            admin: true,
            aud: "plattenspieler-app".to_string(),
            iss: "plattenspieler".to_string(),
            exp: (Utc::now() - Duration::days(1)).timestamp() as u64,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("test-secret-32-chars-long!!!!!!!".as_bytes()),
        )
        .expect("token is minted");

        let result = setup.system.auth.authenticate(Scheme::User, &token).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let setup = TestSetup::new().await;

        let result = setup
            .system
            .auth
            .authenticate(Scheme::User, "not.a.token")
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_device_scheme() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("owner").await;

        let device = setup
            .system
            .devices
            .register(account.id, "device-secret".to_string())
            .await
            .expect("device registers");

        let verified = setup
            .system
            .auth
            .authenticate(Scheme::DeviceSecret, "device-secret")
            .await
            .expect("secret is accepted");

        match verified {
            Verified::Device(found) => assert_eq!(found.id, device.id),
            Verified::Account(_) => panic!("device scheme produced an account"),
        }

        let rejected = setup
            .system
            .auth
            .authenticate(Scheme::DeviceSecret, "unknown-secret")
            .await;

        assert!(matches!(rejected, Err(AuthError::InvalidCredentials)));
    }
}
