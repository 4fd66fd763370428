//! Per-user scan history and settings on a keyed JSON store.
//!
//! The scan pipeline only writes here; nothing in the core reads history back.
use crate::risk::RiskLevel;
use crate::scan::{ScanMode, ScanOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored value under '{key}' is not valid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// String values by key, in the manner of browser local storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_string(value)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityStatus {
    Safe,
    Warning,
    Dangerous,
    Unknown,
}

impl From<RiskLevel> for SecurityStatus {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => SecurityStatus::Safe,
            RiskLevel::Medium => SecurityStatus::Warning,
            RiskLevel::High => SecurityStatus::Dangerous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub url: String,
    /// Milliseconds since the epoch on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub security_status: SecurityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScanRecord {
    pub fn new(
        url: impl Into<String>,
        security_status: SecurityStatus,
        title: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            timestamp: Utc::now(),
            security_status,
            title,
            notes: None,
        }
    }

    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        let title = (!outcome.target.is_url_like).then(|| outcome.target.raw_text.clone());
        Self::new(
            outcome.target.url.clone(),
            outcome.verdict.risk_level.into(),
            title,
        )
    }
}

pub struct ScanHistory {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ScanHistory {
    pub fn new(store: Arc<dyn KeyValueStore>, user_id: &str) -> Self {
        Self {
            store,
            key: format!("scan-history-{user_id}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records, newest first
    pub fn list(&self) -> Result<Vec<ScanRecord>, StoreError> {
        Ok(read_json(self.store.as_ref(), &self.key)?.unwrap_or_default())
    }

    pub fn add(
        &self,
        url: impl Into<String>,
        status: SecurityStatus,
        title: Option<String>,
    ) -> Result<ScanRecord, StoreError> {
        let record = ScanRecord::new(url, status, title);
        self.insert(record.clone())?;
        Ok(record)
    }

    /// Prepend an existing record
    pub fn insert(&self, record: ScanRecord) -> Result<(), StoreError> {
        let mut records = self.list()?;
        records.insert(0, record);
        self.save(&records)
    }

    /// Returns whether a record was removed
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }

    /// Returns whether the record exists
    pub fn update_notes(&self, id: &str, notes: impl Into<String>) -> Result<bool, StoreError> {
        let mut records = self.list()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.notes = Some(notes.into());
        self.save(&records)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.key)
    }

    /// Record a finished scan when the privacy setting allows it
    pub fn record_outcome(
        &self,
        settings: &UserSettings,
        outcome: &ScanOutcome,
    ) -> Result<Option<ScanRecord>, StoreError> {
        let record = ScanRecord::from_outcome(outcome);
        if !should_record(settings, record.security_status) {
            tracing::debug!(status = ?record.security_status, "scan withheld by privacy setting");
            return Ok(None);
        }
        self.insert(record.clone())?;
        Ok(Some(record))
    }

    fn save(&self, records: &[ScanRecord]) -> Result<(), StoreError> {
        write_json(self.store.as_ref(), &self.key, &records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPrivacy {
    #[default]
    SaveAll,
    SaveSafeOnly,
    SaveNone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub scan_privacy: ScanPrivacy,
    pub default_scan_mode: ScanMode,
    pub notifications_enabled: bool,
    pub auto_analyze: bool,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            scan_privacy: ScanPrivacy::SaveAll,
            default_scan_mode: ScanMode::Camera,
            notifications_enabled: true,
            auto_analyze: true,
            language: "en".to_string(),
        }
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub scan_privacy: Option<ScanPrivacy>,
    pub default_scan_mode: Option<ScanMode>,
    pub notifications_enabled: Option<bool>,
    pub auto_analyze: Option<bool>,
    pub language: Option<String>,
}

impl UserSettings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.scan_privacy {
            self.scan_privacy = v;
        }
        if let Some(v) = patch.default_scan_mode {
            self.default_scan_mode = v;
        }
        if let Some(v) = patch.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = patch.auto_analyze {
            self.auto_analyze = v;
        }
        if let Some(v) = patch.language {
            self.language = v;
        }
    }
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>, user_id: &str) -> Self {
        Self {
            store,
            key: format!("settings-{user_id}"),
        }
    }

    /// Stored settings, or the defaults when none are stored
    pub fn get(&self) -> Result<UserSettings, StoreError> {
        Ok(read_json(self.store.as_ref(), &self.key)?.unwrap_or_default())
    }

    pub fn update(&self, patch: SettingsPatch) -> Result<UserSettings, StoreError> {
        let mut settings = self.get()?;
        settings.apply(patch);
        write_json(self.store.as_ref(), &self.key, &settings)?;
        Ok(settings)
    }

    pub fn reset(&self) -> Result<UserSettings, StoreError> {
        let settings = UserSettings::default();
        write_json(self.store.as_ref(), &self.key, &settings)?;
        Ok(settings)
    }
}

/// Whether a scan with `status` may be stored under the user's privacy setting
pub fn should_record(settings: &UserSettings, status: SecurityStatus) -> bool {
    match settings.scan_privacy {
        ScanPrivacy::SaveAll => true,
        ScanPrivacy::SaveSafeOnly => status == SecurityStatus::Safe,
        ScanPrivacy::SaveNone => false,
    }
}
