//! JSON persistence for flows (`<app>.json`) and resource libraries
//! (`<app>.resources.json`) under the platforms directory, plus the image
//! templates kept in its templates subdirectory.

use crate::errors::{AutomationError, Result};
use crate::flow::FlowConfig;
use crate::library::ResourceLibrary;
use image::GenericImageView;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const FLOW_SUFFIX: &str = ".json";
const RESOURCES_SUFFIX: &str = ".resources.json";

fn persist_atomic(path: &Path, write: impl FnOnce(&mut NamedTempFile) -> Result<()>) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(&mut tmp)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AutomationError::Io(e.error))?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Write pretty-printed JSON next to `path` and rename it into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    persist_atomic(path, |tmp| {
        serde_json::to_writer_pretty(&mut *tmp, value)?;
        tmp.write_all(b"\n")?;
        Ok(())
    })
}

fn validate_app_id(app: &str) -> Result<()> {
    let bad = app.is_empty()
        || app.contains(['/', '\\', ':'])
        || app == "."
        || app == ".."
        || app.ends_with(".resources");
    if bad {
        return Err(AutomationError::InvalidName(format!(
            "invalid application id: {app:?}"
        )));
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone)]
pub struct FlowStore {
    root: PathBuf,
}

impl FlowStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, app: &str) -> PathBuf {
        self.root.join(format!("{app}{FLOW_SUFFIX}"))
    }

    /// `Ok(None)` when the application has no flow file.
    pub fn load(&self, app: &str) -> Result<Option<FlowConfig>> {
        validate_app_id(app)?;
        let path = self.path_for(app);
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };
        let mut config: FlowConfig = serde_json::from_str(&raw)?;
        if config.platform.is_empty() {
            config.platform = app.to_string();
        }
        Ok(Some(config))
    }

    pub fn save(&self, app: &str, config: &FlowConfig) -> Result<()> {
        validate_app_id(app)?;
        let mut config = config.clone();
        config.platform = app.to_string();
        write_json_atomic(&self.path_for(app), &config)?;
        info!("saved flow for {}", app);
        Ok(())
    }

    /// Deleting a flow that does not exist succeeds.
    pub fn delete(&self, app: &str) -> Result<()> {
        validate_app_id(app)?;
        match fs::remove_file(self.path_for(app)) {
            Ok(()) => {
                info!("deleted flow for {}", app);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sorted ids of every application with a flow file.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.ends_with(RESOURCES_SUFFIX))
            .filter_map(|name| {
                name.strip_suffix(FLOW_SUFFIX)
                    .filter(|stem| !stem.is_empty())
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceStore {
    root: PathBuf,
}

impl ResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, app: &str) -> PathBuf {
        self.root.join(format!("{app}{RESOURCES_SUFFIX}"))
    }

    /// A missing file is an empty library; a corrupt one is an error so it is
    /// never silently overwritten.
    pub fn load(&self, app: &str) -> Result<ResourceLibrary> {
        validate_app_id(app)?;
        let Some(raw) = read_optional(&self.path_for(app))? else {
            return Ok(ResourceLibrary::new(app));
        };
        let mut library: ResourceLibrary = serde_json::from_str(&raw)?;
        if library.platform.is_empty() {
            library.platform = app.to_string();
        }
        Ok(library)
    }

    pub fn save(&self, app: &str, library: &ResourceLibrary) -> Result<()> {
        validate_app_id(app)?;
        write_json_atomic(&self.path_for(app), library)
    }

    /// Load, apply `edit`, and save only when `edit` succeeds.
    pub fn update<R>(
        &self,
        app: &str,
        edit: impl FnOnce(&mut ResourceLibrary) -> Result<R>,
    ) -> Result<R> {
        let mut library = self.load(app)?;
        let out = edit(&mut library)?;
        self.save(app, &library)?;
        Ok(out)
    }
}

/// Image templates referenced by flows and image resources.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the image at `source` into the templates directory and return
    /// its file name there. `name` defaults to the source's file name; an
    /// existing template with that name is replaced.
    pub fn import(&self, source: &Path, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => name.trim().to_string(),
            None => source
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .unwrap_or_default(),
        };
        validate_template_name(&name)?;

        let bytes = fs::read(source)?;
        let (width, height) = image::load_from_memory(&bytes)?.dimensions();

        let dest = self.dir.join(&name);
        let replaced = dest.exists();
        persist_atomic(&dest, |tmp| {
            tmp.write_all(&bytes)?;
            Ok(())
        })?;
        info!(
            "imported template {} ({}x{}{})",
            dest.display(),
            width,
            height,
            if replaced { ", replaced" } else { "" }
        );
        Ok(name)
    }
}

fn validate_template_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains(['/', '\\', ':'])
        || name == "."
        || name == ".."
        || name.starts_with('.');
    if bad {
        return Err(AutomationError::InvalidName(format!(
            "invalid template file name: {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_flow_is_none_and_corrupt_flow_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        assert_eq!(store.load("nope").unwrap(), None);

        fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(matches!(
            store.load("broken").unwrap_err(),
            AutomationError::Serialization(_)
        ));
    }

    #[test]
    fn list_ids_skips_resource_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let flows = FlowStore::new(dir.path());
        let resources = ResourceStore::new(dir.path());

        let mut config = FlowConfig::new("");
        config.open.push(json!({"type": "wait", "seconds": 0.1}));
        flows.save("wechat", &config).unwrap();
        flows.save("qianniu", &FlowConfig::default()).unwrap();
        resources.save("qianniu", &ResourceLibrary::new("qianniu")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(flows.list_ids().unwrap(), vec!["qianniu", "wechat"]);
        assert_eq!(flows.load("wechat").unwrap().unwrap().platform, "wechat");
    }

    #[test]
    fn saved_json_is_pretty_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlowStore::new(dir.path().join("nested"));
        store.save("app", &FlowConfig::default()).unwrap();

        let raw = fs::read_to_string(store.path_for("app")).unwrap();
        assert!(raw.contains("\n  \"platform\": \"app\""));
        let names: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("app.json")]);
    }

    #[test]
    fn delete_of_missing_flow_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        store.delete("ghost").unwrap();
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        assert!(store.load("../etc").is_err());
        assert!(store.load("x.resources").is_err());
        assert!(ResourceStore::new(dir.path()).load("").is_err());

        let err = store.save("a/b", &FlowConfig::default()).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidName(_)), "{err:?}");
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidName);
    }
}
