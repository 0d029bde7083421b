//! Credential material for the wallet connection
//!
//! The secure-storage collaborator (Keystore, Keychain, env for the simulator)
//! hands back a mnemonic that lives only as long as the connect call.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    mnemonic: String,
    passphrase: Option<String>,
}

impl Credentials {
    pub fn new(mnemonic: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mnemonic", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Secure credential storage supplied by the host
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no wallet has been set up on this device yet.
    fn load(&self) -> Result<Option<Credentials>, String>;
}

/// Fixed credentials, for hosts that resolve them up front
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

impl CredentialStore for StaticCredentials {
    fn load(&self) -> Result<Option<Credentials>, String> {
        Ok(Some(self.0.clone()))
    }
}
