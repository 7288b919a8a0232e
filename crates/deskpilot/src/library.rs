//! Named, reusable locators saved per application.

use crate::errors::{AutomationError, Result};
use crate::step::{ControlDescriptor, ImageTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Control,
    Image,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Control => "control",
            ResourceKind::Image => "image",
        })
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "control" | "controls" => Ok(ResourceKind::Control),
            "image" | "images" => Ok(ResourceKind::Image),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem<T> {
    pub id: String,
    pub name: String,
    pub payload: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type ControlResource = ResourceItem<ControlDescriptor>;
pub type ImageResource = ResourceItem<ImageTemplate>;

/// 12 lowercase hex characters.
fn new_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AutomationError::InvalidName(
            "resource name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

impl<T> ResourceItem<T> {
    fn create(name: &str, payload: T) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: new_id(),
            name: clean_name(name)?,
            payload,
            created_at: now,
            updated_at: now,
        })
    }

    fn rename(&mut self, name: &str) -> Result<()> {
        self.name = clean_name(name)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Controls and image templates saved for one application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLibrary {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub controls: Vec<ControlResource>,
    #[serde(default)]
    pub images: Vec<ImageResource>,
}

impl ResourceLibrary {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Default::default()
        }
    }

    pub fn create_control(&mut self, name: &str, payload: ControlDescriptor) -> Result<&ControlResource> {
        let item = ResourceItem::create(name, payload)?;
        self.controls.push(item);
        Ok(&self.controls[self.controls.len() - 1])
    }

    pub fn create_image(&mut self, name: &str, payload: ImageTemplate) -> Result<&ImageResource> {
        let item = ResourceItem::create(name, payload)?;
        self.images.push(item);
        Ok(&self.images[self.images.len() - 1])
    }

    pub fn control(&self, id: &str) -> Option<&ControlResource> {
        self.controls.iter().find(|item| item.id == id)
    }

    pub fn image(&self, id: &str) -> Option<&ImageResource> {
        self.images.iter().find(|item| item.id == id)
    }

    /// Rename an item; `ResourceNotFound` when no item has `id`.
    pub fn rename(&mut self, kind: ResourceKind, id: &str, name: &str) -> Result<()> {
        let renamed = match kind {
            ResourceKind::Control => self
                .controls
                .iter_mut()
                .find(|item| item.id == id)
                .map(|item| item.rename(name)),
            ResourceKind::Image => self
                .images
                .iter_mut()
                .find(|item| item.id == id)
                .map(|item| item.rename(name)),
        };
        renamed.unwrap_or_else(|| Err(not_found(kind, id)))
    }

    /// Remove an item. Returns whether anything was removed.
    pub fn delete(&mut self, kind: ResourceKind, id: &str) -> bool {
        match kind {
            ResourceKind::Control => {
                let before = self.controls.len();
                self.controls.retain(|item| item.id != id);
                self.controls.len() != before
            }
            ResourceKind::Image => {
                let before = self.images.len();
                self.images.retain(|item| item.id != id);
                self.images.len() != before
            }
        }
    }
}

pub(crate) fn not_found(kind: ResourceKind, id: &str) -> AutomationError {
    AutomationError::ResourceNotFound(format!("{kind} resource {id:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_items_get_short_hex_ids_and_trimmed_names() {
        let mut library = ResourceLibrary::new("qianniu");
        let item = library
            .create_image("  send button ", ImageTemplate::new("send.png"))
            .unwrap();
        assert_eq!(item.name, "send button");
        assert_eq!(item.id.len(), 12);
        assert!(item.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut library = ResourceLibrary::default();
        assert!(library
            .create_control("   ", ControlDescriptor::default())
            .is_err());
        assert!(library.controls.is_empty());
    }

    #[test]
    fn rename_bumps_updated_at() {
        let mut library = ResourceLibrary::default();
        let id = library
            .create_control("old", ControlDescriptor::default())
            .unwrap()
            .id
            .clone();
        let created = library.control(&id).unwrap().created_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        library.rename(ResourceKind::Control, &id, "new").unwrap();

        let item = library.control(&id).unwrap();
        assert_eq!(item.name, "new");
        assert!(item.updated_at > created);

        let err = library.rename(ResourceKind::Image, &id, "x").unwrap_err();
        assert!(matches!(err, AutomationError::ResourceNotFound(_)));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let mut library = ResourceLibrary::default();
        let keep = library.create_image("a", ImageTemplate::new("a.png")).unwrap().id.clone();
        let gone = library.create_image("b", ImageTemplate::new("b.png")).unwrap().id.clone();

        assert!(library.delete(ResourceKind::Image, &gone));
        assert!(!library.delete(ResourceKind::Image, &gone));
        assert!(!library.delete(ResourceKind::Control, &keep));
        assert_eq!(library.images.len(), 1);
        assert_eq!(library.images[0].id, keep);
    }
}
