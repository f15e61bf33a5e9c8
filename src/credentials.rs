//! SSH credentials and the suppliers that produce the secret.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, SwupError};

/// Username and secret used to open the SSH session.
///
/// `Debug` comes from [`SecretString`], which redacts the value.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    secret: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: SecretString) -> Self {
        Self {
            username: username.into(),
            secret,
        }
    }

    /// Borrow the password for the authentication call only.
    pub fn password(&self) -> &str {
        self.secret.expose_secret()
    }
}

/// Source of the SSH secret.
///
/// Keeps the orchestrator independent of how the secret is obtained.
pub trait CredentialSupplier {
    fn secret(&self, username: &str, address: &str) -> Result<SecretString>;
}

/// Secret given on the command line or through `SWUP_PASSWORD`.
pub struct ProvidedSecret(SecretString);

impl ProvidedSecret {
    pub fn new(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl CredentialSupplier for ProvidedSecret {
    fn secret(&self, _username: &str, _address: &str) -> Result<SecretString> {
        Ok(self.0.clone())
    }
}

/// Interactive prompt without echo.
pub struct PromptSecret;

impl CredentialSupplier for PromptSecret {
    fn secret(&self, username: &str, address: &str) -> Result<SecretString> {
        let password = dialoguer::Password::new()
            .with_prompt(format!("Enter password for {}@{}", username, address))
            .allow_empty_password(false)
            .interact()
            .map_err(|e| SwupError::Prompt(e.to_string()))?;

        Ok(SecretString::from(password))
    }
}

/// Resolve credentials through the given supplier.
pub fn resolve(
    supplier: &dyn CredentialSupplier,
    username: &str,
    address: &str,
) -> Result<Credentials> {
    let secret = supplier.secret(username, address)?;
    Ok(Credentials::new(username, secret))
}
