use keyring::Entry;

const SERVICE_NAME: &str = "avif-sweep";
const CLOUD_ACCOUNT: &str = "cloud";

/// Environment variable that overrides the stored cloud API key
pub const API_KEY_ENV: &str = "AVIF_SWEEP_API_KEY";

/// Cloud API key storage: environment first, then the OS keychain
pub struct CredentialManager;

impl CredentialManager {
    /// Look up the cloud API key
    pub fn cloud_api_key() -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                tracing::debug!("[Credentials] Using API key from {}", API_KEY_ENV);
                return Some(key);
            }
        }

        lookup(CLOUD_ACCOUNT)
    }

    /// Store the cloud API key in the OS keychain
    pub fn store_cloud_api_key(api_key: &str) -> Result<(), String> {
        store(CLOUD_ACCOUNT, api_key)
    }

    /// Remove the cloud API key from the OS keychain
    pub fn delete_cloud_api_key() -> Result<(), String> {
        delete(CLOUD_ACCOUNT)
    }
}

fn lookup(account: &str) -> Option<String> {
    match Entry::new(SERVICE_NAME, account).and_then(|entry| entry.get_password()) {
        Ok(key) => {
            tracing::debug!(account, "[Credentials] Retrieved API key from keychain");
            Some(key)
        }
        Err(e) => {
            tracing::debug!(account, "[Credentials] No keychain API key: {}", e);
            None
        }
    }
}

fn store(account: &str, api_key: &str) -> Result<(), String> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err("API key is empty".to_string());
    }

    let entry =
        Entry::new(SERVICE_NAME, account).map_err(|e| format!("Keychain unavailable: {}", e))?;
    entry
        .set_password(api_key)
        .map_err(|e| format!("Failed to store API key: {}", e))?;
    tracing::info!(account, "[Credentials] Stored API key in keychain");
    Ok(())
}

fn delete(account: &str) -> Result<(), String> {
    let entry =
        Entry::new(SERVICE_NAME, account).map_err(|e| format!("Keychain unavailable: {}", e))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => {
            tracing::info!(account, "[Credentials] Deleted API key from keychain");
            Ok(())
        }
        Err(e) => Err(format!("Failed to delete API key: {}", e)),
    }
}
