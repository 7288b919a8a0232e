//! Element locator resolution: accessibility-tree candidate queries and
//! screen template matching.

pub mod control;
pub mod template;

pub use control::{
    control_candidates, select_unique, target_window, window_matches, ControlProps, ControlQuery,
};
pub use template::{match_template, TemplateMatch};

use std::path::{Path, PathBuf};

/// Resolve an image template reference to a file on disk.
///
/// Tried in order: the path itself when absolute and present, then
/// `<templates_dir>/<path>`, then `<platforms_dir>/<path>`. When nothing
/// exists the templates-directory candidate is returned so that error
/// messages name the most likely location.
pub fn resolve_template_path(raw: &str, platforms_dir: &Path, templates_dir: &Path) -> PathBuf {
    let given = Path::new(raw);
    if given.is_absolute() && given.exists() {
        return given.to_path_buf();
    }
    let in_templates = templates_dir.join(raw);
    if in_templates.exists() {
        return in_templates;
    }
    let in_platforms = platforms_dir.join(raw);
    if in_platforms.exists() {
        return in_platforms;
    }
    if given.is_absolute() {
        return given.to_path_buf();
    }
    in_templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn template_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let platforms = dir.path();
        let templates = platforms.join("templates");
        fs::create_dir_all(&templates).unwrap();

        fs::write(platforms.join("only_root.png"), b"x").unwrap();
        fs::write(templates.join("both.png"), b"x").unwrap();
        fs::write(platforms.join("both.png"), b"x").unwrap();

        assert_eq!(
            resolve_template_path("both.png", platforms, &templates),
            templates.join("both.png")
        );
        assert_eq!(
            resolve_template_path("only_root.png", platforms, &templates),
            platforms.join("only_root.png")
        );
        assert_eq!(
            resolve_template_path("missing.png", platforms, &templates),
            templates.join("missing.png")
        );

        let absolute = platforms.join("only_root.png");
        assert_eq!(
            resolve_template_path(absolute.to_str().unwrap(), platforms, &templates),
            absolute
        );
    }
}
