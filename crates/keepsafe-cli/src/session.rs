//! Client session: holds the token and the master key between calls

use keepsafe_core::{
    AuthToken, NewRecord, Record, RecordId, RecordInfo, RecordType, UserCredentials, VaultError,
    VaultResult,
};
use keepsafe_crypto::{derive_master_key, open, seal, MasterKey};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::conn::VaultConn;

/// A logged-in (or not yet logged-in) client.
///
/// Record operations before `register`/`login` fail with `Authentication`.
pub struct Session<C> {
    conn: C,
    token: Option<AuthToken>,
    key: Option<MasterKey>,
}

impl<C: VaultConn> Session<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            token: None,
            key: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some() && self.key.is_some()
    }

    pub async fn register(
        &mut self,
        login: &str,
        password: &SecretString,
        master: &SecretString,
    ) -> VaultResult<()> {
        let creds = check_inputs(login, password, master)?;
        let token = self.conn.register(&creds).await?;
        self.start(token, master);
        debug!(login, "registered");
        Ok(())
    }

    pub async fn login(
        &mut self,
        login: &str,
        password: &SecretString,
        master: &SecretString,
    ) -> VaultResult<()> {
        let creds = check_inputs(login, password, master)?;
        let token = self.conn.login(&creds).await?;
        self.start(token, master);
        debug!(login, "logged in");
        Ok(())
    }

    /// Drop the token and the key. The key is zeroized on drop.
    pub fn logout(&mut self) {
        self.token = None;
        self.key = None;
    }

    pub async fn list(&self) -> VaultResult<Vec<RecordInfo>> {
        let (token, _) = self.credentials()?;
        self.conn.list(token).await
    }

    pub async fn create(
        &self,
        record_type: RecordType,
        metadata: &str,
        plaintext: &[u8],
    ) -> VaultResult<RecordId> {
        let (token, key) = self.credentials()?;
        let payload = seal(key, plaintext)?;
        self.conn
            .create(
                token,
                NewRecord {
                    record_type,
                    metadata: metadata.to_string(),
                    payload,
                },
            )
            .await
    }

    /// Fetch and decrypt. A payload that fails to open is a `Crypto` error.
    pub async fn get(&self, id: &RecordId) -> VaultResult<Record> {
        let (token, key) = self.credentials()?;
        let mut record = self.conn.get(token, id).await?;
        record.payload = open(key, &record.payload)?;
        Ok(record)
    }

    pub async fn delete(&self, id: &RecordId) -> VaultResult<()> {
        let (token, _) = self.credentials()?;
        self.conn.delete(token, id).await
    }

    fn start(&mut self, token: AuthToken, master: &SecretString) {
        self.token = Some(token);
        self.key = Some(derive_master_key(master.expose_secret().as_bytes()));
    }

    fn credentials(&self) -> VaultResult<(&AuthToken, &MasterKey)> {
        match (&self.token, &self.key) {
            (Some(token), Some(key)) => Ok((token, key)),
            _ => Err(VaultError::unauthenticated("not logged in")),
        }
    }
}

fn check_inputs(
    login: &str,
    password: &SecretString,
    master: &SecretString,
) -> VaultResult<UserCredentials> {
    if login.is_empty() {
        return Err(VaultError::validation("login must not be empty"));
    }
    if password.expose_secret().is_empty() {
        return Err(VaultError::validation("password must not be empty"));
    }
    if master.expose_secret().is_empty() {
        return Err(VaultError::validation("master secret must not be empty"));
    }
    Ok(UserCredentials {
        login: login.to_string(),
        password: password.clone(),
    })
}
