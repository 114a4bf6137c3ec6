//! Root credential generation and retention.

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::debug;

use super::StateStore;

/// Stored-state key holding the generated root credential.
pub const PASSWORD_SECRET_KEY: &str = "password_secret";

/// Length of the generated root credential.
pub const PASSWORD_SECRET_LENGTH: usize = 96;

/// Hands out the deployment's root credential, generating it on first use.
///
/// Once a secret has been saved it is returned unchanged for the lifetime of
/// the underlying store; it is never regenerated implicitly.
#[derive(Debug)]
pub struct SecretStore<S> {
    store: S,
}

impl<S: StateStore> SecretStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Return the stored secret, or generate, save and return a new one of
    /// `length` alphanumeric characters.
    ///
    /// An empty stored value is treated as absent.
    pub fn get_or_create_secret(&mut self, length: usize) -> String {
        debug_assert!(length > 0, "secret length must be positive");

        if let Some(secret) = self
            .store
            .load(PASSWORD_SECRET_KEY)
            .filter(|s| !s.is_empty())
        {
            return secret;
        }

        debug!(length, "Generating new password secret");
        let secret = generate_secret(&mut rand::thread_rng(), length);
        self.store.save(PASSWORD_SECRET_KEY, secret.clone());
        secret
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the secret store, returning the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

/// Draw `length` characters uniformly from `[A-Za-z0-9]`.
pub fn generate_secret<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
