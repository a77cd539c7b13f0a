use std::sync::RwLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::ports::SecretStore;

/// Values of the user profile that can be changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfigs {
    pub kaggle_api_token: Option<String>,
    pub git_name: String,
    pub git_email: String,
    pub git_credential_cache_duration: u64,
    pub is_beta_mode_enabled: bool,
    pub is_dev_mode_enabled: bool,
    pub is_dark_mode_enabled: bool,
    pub github_personal_access_token: Option<String>,
    pub do_display_my_secrets_use_in_service_dialog: bool,
    pub selected_project_id: Option<String>,
    pub is_command_bar_enabled: bool,
}

impl UserConfigs {
    /// Values used for keys that were never stored
    pub fn defaults(
        username: &str,
        email: &str,
        is_dark_mode_enabled: bool,
        is_command_bar_enabled: bool,
    ) -> Self {
        Self {
            kaggle_api_token: None,
            git_name: username.to_string(),
            git_email: email.to_string(),
            git_credential_cache_duration: 0,
            is_beta_mode_enabled: false,
            is_dev_mode_enabled: false,
            is_dark_mode_enabled,
            github_personal_access_token: None,
            do_display_my_secrets_use_in_service_dialog: true,
            selected_project_id: None,
            is_command_bar_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserConfigKey {
    KaggleApiToken,
    GitName,
    GitEmail,
    GitCredentialCacheDuration,
    IsBetaModeEnabled,
    IsDevModeEnabled,
    IsDarkModeEnabled,
    GithubPersonalAccessToken,
    DoDisplayMySecretsUseInServiceDialog,
    SelectedProjectId,
    IsCommandBarEnabled,
}

impl UserConfigKey {
    pub const ALL: [UserConfigKey; 11] = [
        UserConfigKey::KaggleApiToken,
        UserConfigKey::GitName,
        UserConfigKey::GitEmail,
        UserConfigKey::GitCredentialCacheDuration,
        UserConfigKey::IsBetaModeEnabled,
        UserConfigKey::IsDevModeEnabled,
        UserConfigKey::IsDarkModeEnabled,
        UserConfigKey::GithubPersonalAccessToken,
        UserConfigKey::DoDisplayMySecretsUseInServiceDialog,
        UserConfigKey::SelectedProjectId,
        UserConfigKey::IsCommandBarEnabled,
    ];

    /// Name of the key in storage, matching the serialized field name
    pub fn as_str(self) -> &'static str {
        match self {
            UserConfigKey::KaggleApiToken => "kaggleApiToken",
            UserConfigKey::GitName => "gitName",
            UserConfigKey::GitEmail => "gitEmail",
            UserConfigKey::GitCredentialCacheDuration => "gitCredentialCacheDuration",
            UserConfigKey::IsBetaModeEnabled => "isBetaModeEnabled",
            UserConfigKey::IsDevModeEnabled => "isDevModeEnabled",
            UserConfigKey::IsDarkModeEnabled => "isDarkModeEnabled",
            UserConfigKey::GithubPersonalAccessToken => "githubPersonalAccessToken",
            UserConfigKey::DoDisplayMySecretsUseInServiceDialog => {
                "doDisplayMySecretsUseInServiceDialog"
            }
            UserConfigKey::SelectedProjectId => "selectedProjectId",
            UserConfigKey::IsCommandBarEnabled => "isCommandBarEnabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub value: Value,
    /// True while the new value is being written to the store
    pub is_being_changed: bool,
}

/// Per-user settings persisted in the secret store
pub struct UserConfigsManager<S> {
    store: S,
    dir_path: String,
    entries: RwLock<Option<FxHashMap<UserConfigKey, ConfigEntry>>>,
}

impl<S: SecretStore> UserConfigsManager<S> {
    /// Values live under `/<vault_top_dir>/.onyxia/`
    pub fn new(store: S, vault_top_dir: &str) -> Self {
        Self {
            store,
            dir_path: format!("/{}/.onyxia", vault_top_dir.trim_matches('/')),
            entries: RwLock::new(None),
        }
    }

    pub fn path_of(&self, key: UserConfigKey) -> String {
        format!("{}/{}", self.dir_path, key.as_str())
    }

    /// Load every value, storing the default of any key that has none
    pub async fn initialize(&self, defaults: &UserConfigs) -> Result<()> {
        let Value::Object(mut default_values) = serde_json::to_value(defaults)? else {
            return Err(Error::invariant("user configs must serialize to an object"));
        };

        let mut entries = FxHashMap::default();

        for key in UserConfigKey::ALL {
            let path = self.path_of(key);
            let default_value = default_values.remove(key.as_str()).unwrap_or(Value::Null);

            let stored = match self.store.get(&path).await {
                Ok(stored) => stored,
                Err(e) => {
                    log::warn!("Cannot read {}, using default: {}", path, e);
                    None
                }
            };

            let value = match stored {
                Some(value) => value,
                None => {
                    self.store.put(&path, default_value.clone()).await?;
                    default_value
                }
            };

            entries.insert(
                key,
                ConfigEntry {
                    value,
                    is_being_changed: false,
                },
            );
        }

        *self.write() = Some(entries);
        log::info!("User configs initialized from {}", self.dir_path);
        Ok(())
    }

    /// Change one value and persist it, doing nothing if it is unchanged
    pub async fn change_value(&self, key: UserConfigKey, value: impl Into<Value>) -> Result<()> {
        let value = value.into();

        {
            let mut guard = self.write();
            let Some(entries) = guard.as_mut() else {
                return Err(Error::invariant("user configs changed before initialization"));
            };
            if entries.get(&key).is_some_and(|entry| entry.value == value) {
                return Ok(());
            }

            // Reject values that do not fit the key's type before storing anything
            if let Err(e) = typed_configs(entries, Some((key, &value))) {
                log::warn!("Rejected value for {}: {}", key.as_str(), e);
                return Err(e);
            }

            let Some(entry) = entries.get_mut(&key) else {
                return Err(Error::invariant("user config key missing after initialization"));
            };
            entry.value = value.clone();
            entry.is_being_changed = true;
        }

        let result = self.store.put(&self.path_of(key), value).await;

        if let Some(entry) = self.write().as_mut().and_then(|entries| entries.get_mut(&key)) {
            entry.is_being_changed = false;
        }

        result
    }

    /// Show the helper dialogs again
    pub async fn reset_helper_dialogs(&self) -> Result<()> {
        self.change_value(UserConfigKey::DoDisplayMySecretsUseInServiceDialog, true)
            .await
    }

    pub fn entry(&self, key: UserConfigKey) -> Option<ConfigEntry> {
        self.read().as_ref()?.get(&key).cloned()
    }

    /// Current values without the change flags
    pub fn user_configs(&self) -> Result<UserConfigs> {
        let guard = self.read();
        let Some(entries) = guard.as_ref() else {
            return Err(Error::invariant("user configs read before initialization"));
        };

        typed_configs(entries, None)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<FxHashMap<UserConfigKey, ConfigEntry>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<FxHashMap<UserConfigKey, ConfigEntry>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Typed view of the entries, with `replacement` swapped in if given
fn typed_configs(
    entries: &FxHashMap<UserConfigKey, ConfigEntry>,
    replacement: Option<(UserConfigKey, &Value)>,
) -> Result<UserConfigs> {
    let values: Map<String, Value> = entries
        .iter()
        .map(|(key, entry)| {
            let value = match replacement {
                Some((replaced, value)) if replaced == *key => value.clone(),
                _ => entry.value.clone(),
            };
            (key.as_str().to_string(), value)
        })
        .collect();

    Ok(serde_json::from_value(Value::Object(values))?)
}
