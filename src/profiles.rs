//! File-backed profile store
//!
//! Reads and writes the config export shape `{version, exportDate, sites}` as
//! JSON or YAML (picked by extension) and stamps `lastUsed` when a site is
//! launched or a login completes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use autologin_core_types::{FieldKind, SiteProfile};
use autologin_engine::{LastUsedHook, BUNDLE_FORMAT_VERSION};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to access profiles at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid profile YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no profile named '{key}' in {}", .path.display())]
    NotFound { key: String, path: PathBuf },
}

impl ProfileError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ProfileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFile {
    #[serde(default = "version_default")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sites: Vec<SiteProfile>,
}

fn version_default() -> String {
    BUNDLE_FORMAT_VERSION.to_string()
}

impl ProfileFile {
    pub fn new(sites: Vec<SiteProfile>) -> Self {
        Self {
            version: version_default(),
            export_date: None,
            sites,
        }
    }

    /// Copy stamped with the current time, as written by `export --format config`.
    pub fn exported(&self) -> Self {
        Self {
            version: version_default(),
            export_date: Some(Utc::now()),
            sites: self.sites.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                FileFormat::Yaml
            }
            _ => FileFormat::Json,
        }
    }

    fn parse(self, raw: &str) -> Result<ProfileFile, ProfileError> {
        match self {
            FileFormat::Json => serde_json::from_str(raw).map_err(Into::into),
            FileFormat::Yaml => serde_yaml::from_str(raw).map_err(Into::into),
        }
    }

    fn render(self, file: &ProfileFile) -> Result<String, ProfileError> {
        match self {
            FileFormat::Json => serde_json::to_string_pretty(file).map_err(Into::into),
            FileFormat::Yaml => serde_yaml::to_string(file).map_err(Into::into),
        }
    }
}

pub struct ProfileStore {
    path: PathBuf,
    file: RwLock<ProfileFile>,
}

impl ProfileStore {
    /// Load `path`; a missing file yields an empty store that is created on
    /// first save.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let file = if fs::try_exists(&path).await.unwrap_or(false) {
            let raw = fs::read_to_string(&path)
                .await
                .map_err(|err| ProfileError::io(&path, err))?;
            let file = FileFormat::of(&path).parse(&raw)?;
            info!(path = %path.display(), sites = file.sites.len(), "Loaded profiles");
            file
        } else {
            warn!(path = %path.display(), "Profile file not found, starting empty");
            ProfileFile::new(Vec::new())
        };
        Ok(Self {
            path,
            file: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sites(&self) -> Vec<SiteProfile> {
        self.file.read().sites.clone()
    }

    pub fn snapshot(&self) -> ProfileFile {
        self.file.read().clone()
    }

    /// Look up by id, then by case-insensitive name.
    pub fn find(&self, key: &str) -> Option<SiteProfile> {
        let file = self.file.read();
        file.sites
            .iter()
            .find(|site| site.id.0 == key)
            .or_else(|| {
                file.sites
                    .iter()
                    .find(|site| site.name.eq_ignore_ascii_case(key))
            })
            .cloned()
    }

    pub fn get(&self, key: &str) -> Result<SiteProfile, ProfileError> {
        self.find(key).ok_or_else(|| ProfileError::NotFound {
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    /// Store a detected selector on the profile. A blank selector clears the
    /// override.
    pub fn set_selector(
        &self,
        key: &str,
        kind: FieldKind,
        selector: &str,
    ) -> Result<(), ProfileError> {
        let target = self.get(key)?;
        self.update(&target.id.0, |site| {
            let mut overrides = site.overrides();
            overrides.set(kind, Some(selector.to_string()));
            site.username_selector = overrides.username;
            site.password_selector = overrides.password;
            site.submit_selector = overrides.submit;
        });
        Ok(())
    }

    pub fn touch(&self, key: &str, at: DateTime<Utc>) -> Result<(), ProfileError> {
        let target = self.get(key)?;
        self.update(&target.id.0, |site| site.last_used = Some(at));
        Ok(())
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut SiteProfile)) {
        let mut file = self.file.write();
        if let Some(site) = file.sites.iter_mut().find(|site| site.id.0 == id) {
            apply(site);
        }
    }

    pub async fn save(&self) -> Result<(), ProfileError> {
        let rendered = {
            let file = self.file.read();
            FileFormat::of(&self.path).render(&file)?
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| ProfileError::io(parent, err))?;
        }
        fs::write(&self.path, rendered)
            .await
            .map_err(|err| ProfileError::io(&self.path, err))?;
        debug!(path = %self.path.display(), "Profiles saved");
        Ok(())
    }

    /// Profiles a completed login at `address` belongs to: every profile with
    /// the same origin and path, else the single profile sharing the origin
    /// (the second page of a multi-page login usually lives elsewhere).
    fn owners_of(&self, address: &str) -> Vec<String> {
        let Ok(target) = Url::parse(address) else {
            return Vec::new();
        };
        let file = self.file.read();
        let parsed: Vec<(&SiteProfile, Url)> = file
            .sites
            .iter()
            .filter_map(|site| Url::parse(&site.address).ok().map(|url| (site, url)))
            .collect();

        let exact: Vec<String> = parsed
            .iter()
            .filter(|(_, url)| url.origin() == target.origin() && same_path(url, &target))
            .map(|(site, _)| site.id.0.clone())
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let same_origin: Vec<String> = parsed
            .iter()
            .filter(|(_, url)| url.origin() == target.origin())
            .map(|(site, _)| site.id.0.clone())
            .collect();
        if same_origin.len() == 1 {
            same_origin
        } else {
            Vec::new()
        }
    }
}

fn same_path(a: &Url, b: &Url) -> bool {
    a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
}

#[async_trait]
impl LastUsedHook for ProfileStore {
    async fn mark_used(&self, address: &str, at: DateTime<Utc>) {
        let owners = self.owners_of(address);
        if owners.is_empty() {
            debug!(address, "no profile owns this address");
            return;
        }
        for id in &owners {
            self.update(id, |site| site.last_used = Some(at));
        }
        if let Err(err) = self.save().await {
            warn!(error = %err, "failed to persist lastUsed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EXPORT: &str = r#"{
        "version": "3.0",
        "exportDate": "2024-05-01T10:00:00.000Z",
        "sites": [
            {
                "id": "1",
                "name": "Mail",
                "url": "https://mail.example.com/login",
                "username": "alice",
                "password": "pw",
                "enabled": true,
                "loginType": "single"
            },
            {
                "id": "2",
                "name": "Portal",
                "url": "https://portal.example.org/",
                "username": "bob",
                "password": "pw",
                "enabled": false,
                "loginType": "multi-page"
            }
        ]
    }"#;

    #[tokio::test]
    async fn loads_config_export_and_finds_by_name_or_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, EXPORT).unwrap();

        let store = ProfileStore::load(&path).await.unwrap();
        assert_eq!(store.sites().len(), 2);
        assert_eq!(store.find("portal").unwrap().id.0, "2");
        assert_eq!(store.find("1").unwrap().name, "Mail");
        let missing = store.get("Bank").unwrap_err();
        assert!(matches!(missing, ProfileError::NotFound { ref key, .. } if key == "Bank"));
        assert!(missing.to_string().contains("profiles.json"));
    }

    #[tokio::test]
    async fn malformed_files_report_their_format() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("profiles.yaml");
        std::fs::write(&yaml, "sites: [unclosed").unwrap();
        let json = dir.path().join("profiles.json");
        std::fs::write(&json, "{\"sites\": 3}").unwrap();

        assert!(matches!(
            ProfileStore::load(&yaml).await,
            Err(ProfileError::Yaml(_))
        ));
        assert!(matches!(
            ProfileStore::load(&json).await,
            Err(ProfileError::Json(_))
        ));
    }

    #[tokio::test]
    async fn unwritable_location_is_an_io_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = ProfileStore::load(blocker.join("profiles.json")).await.unwrap();

        let err = store.save().await.unwrap_err();
        assert!(matches!(err, ProfileError::Io { ref path, .. } if path == &blocker));
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempdir().unwrap();
        let store = ProfileStore::load(dir.path().join("absent.yaml"))
            .await
            .unwrap();
        assert!(store.sites().is_empty());
    }

    #[tokio::test]
    async fn mark_used_persists_for_matching_address() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, EXPORT).unwrap();
        let store = ProfileStore::load(&path).await.unwrap();

        let at = Utc::now();
        store.mark_used("https://mail.example.com/login/", at).await;

        let reloaded = ProfileStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get("Mail").unwrap().last_used, Some(at));
        assert_eq!(reloaded.get("Portal").unwrap().last_used, None);
    }

    #[tokio::test]
    async fn second_page_of_multi_page_login_matches_by_origin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, EXPORT).unwrap();
        let store = ProfileStore::load(&path).await.unwrap();

        store
            .mark_used("https://portal.example.org/challenge/pwd", Utc::now())
            .await;
        assert!(store.get("Portal").unwrap().last_used.is_some());

        store
            .mark_used("https://unrelated.example.net/", Utc::now())
            .await;
        assert!(store.get("Mail").unwrap().last_used.is_none());
    }

    #[tokio::test]
    async fn yaml_round_trips_selectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.yaml");
        let store = ProfileStore::load(&path).await.unwrap();
        {
            let mut file = store.file.write();
            file.sites.push(SiteProfile::new(
                "Intranet",
                "https://intranet.example.com/",
                "carol",
                "pw",
            ));
        }
        store
            .set_selector("Intranet", FieldKind::Password, "#pass")
            .unwrap();
        store.save().await.unwrap();

        let reloaded = ProfileStore::load(&path).await.unwrap();
        let site = reloaded.get("intranet").unwrap();
        assert_eq!(site.password_selector.as_deref(), Some("#pass"));
        assert_eq!(site.username_selector, None);
    }
}
