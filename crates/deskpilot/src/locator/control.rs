//! Candidate queries for accessibility-tree control lookup.
//!
//! A [`ControlDescriptor`] captured months ago rarely matches a control
//! exactly, so lookup tries a ranked series of attribute subsets, most specific
//! first, and accepts the first one that identifies a single element.

use crate::step::{non_empty, ControlDescriptor};
use crate::types::Rect;

/// One attribute subset tried against a window's descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlQuery {
    pub automation_id: Option<String>,
    pub control_id: Option<i32>,
    pub name: Option<String>,
    pub control_type: Option<String>,
}

/// Attributes read from a live element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlProps {
    pub automation_id: String,
    pub control_id: Option<i32>,
    pub name: String,
    pub control_type: String,
    pub localized_control_type: String,
    pub rect: Option<Rect>,
}

impl ControlQuery {
    pub fn is_empty(&self) -> bool {
        self.automation_id.is_none()
            && self.control_id.is_none()
            && self.name.is_none()
            && self.control_type.is_none()
    }

    /// Automation id and numeric id are exact, name is a substring and
    /// control type is compared case-insensitively against both the
    /// programmatic and the localized type name.
    pub fn matches(&self, props: &ControlProps) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(aid) = &self.automation_id {
            if props.automation_id != *aid {
                return false;
            }
        }
        if let Some(id) = self.control_id {
            if props.control_id != Some(id) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !props.name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(ct) = &self.control_type {
            let wanted = ct.to_lowercase();
            if props.control_type.to_lowercase() != wanted
                && props.localized_control_type.to_lowercase() != wanted
            {
                return false;
            }
        }
        true
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(aid) = &self.automation_id {
            parts.push(format!("automation_id={aid:?}"));
        }
        if let Some(id) = self.control_id {
            parts.push(format!("control_id={id}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name~{name:?}"));
        }
        if let Some(ct) = &self.control_type {
            parts.push(format!("control_type={ct:?}"));
        }
        parts.join(" + ")
    }
}

/// Build the ranked candidate list for a descriptor.
///
/// Order: (automation id + numeric id), (automation id + name),
/// (numeric id + name), automation id, numeric id, (name + control type),
/// name, control type. Candidates whose attribute set repeats an earlier one
/// are dropped.
pub fn control_candidates(desc: &ControlDescriptor) -> Vec<ControlQuery> {
    let aid = non_empty(&desc.automation_id).map(str::to_string);
    let cid = desc.control_id;
    let name = non_empty(&desc.name).map(str::to_string);
    let ctype = non_empty(&desc.control_type).map(str::to_string);

    let pairs = [
        (aid.is_some() && cid.is_some()).then(|| ControlQuery {
            automation_id: aid.clone(),
            control_id: cid,
            ..Default::default()
        }),
        (aid.is_some() && name.is_some()).then(|| ControlQuery {
            automation_id: aid.clone(),
            name: name.clone(),
            ..Default::default()
        }),
        (cid.is_some() && name.is_some()).then(|| ControlQuery {
            control_id: cid,
            name: name.clone(),
            ..Default::default()
        }),
        aid.is_some().then(|| ControlQuery {
            automation_id: aid.clone(),
            ..Default::default()
        }),
        cid.is_some().then(|| ControlQuery {
            control_id: cid,
            ..Default::default()
        }),
        (name.is_some() && ctype.is_some()).then(|| ControlQuery {
            name: name.clone(),
            control_type: ctype.clone(),
            ..Default::default()
        }),
        name.is_some().then(|| ControlQuery {
            name: name.clone(),
            ..Default::default()
        }),
        ctype.is_some().then(|| ControlQuery {
            control_type: ctype.clone(),
            ..Default::default()
        }),
    ];

    let mut out: Vec<ControlQuery> = Vec::new();
    for query in pairs.into_iter().flatten() {
        if !out.contains(&query) {
            out.push(query);
        }
    }
    out
}

/// First candidate that matches exactly one element with a usable rectangle.
///
/// Returns the winning candidate's index and the element's index.
pub fn select_unique(candidates: &[ControlQuery], elements: &[ControlProps]) -> Option<(usize, usize)> {
    for (qi, query) in candidates.iter().enumerate() {
        let mut hits = elements
            .iter()
            .enumerate()
            .filter(|(_, props)| query.matches(props));
        let (Some((ei, props)), None) = (hits.next(), hits.next()) else {
            continue;
        };
        if props.rect.is_some_and(|r| !r.is_degenerate()) {
            return Some((qi, ei));
        }
    }
    None
}

/// Top-level window filter: title substring when a title is given, otherwise
/// class-name substring. Both comparisons are case-sensitive.
/// Title and class filters for the window holding `control`, or `None` when
/// the descriptor names neither and no window can match.
pub fn target_window(control: &ControlDescriptor) -> Option<(Option<&str>, Option<&str>)> {
    let title = non_empty(&control.window_title);
    let class_name = non_empty(&control.window_class);
    (title.is_some() || class_name.is_some()).then_some((title, class_name))
}

pub fn window_matches(
    title: &str,
    class_name: &str,
    want_title: Option<&str>,
    want_class: Option<&str>,
) -> bool {
    match (
        want_title.filter(|t| !t.is_empty()),
        want_class.filter(|c| !c.is_empty()),
    ) {
        (Some(t), _) => title.contains(t),
        (None, Some(c)) => class_name.contains(c),
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(aid: &str, cid: Option<i32>, name: &str, ct: &str) -> ControlProps {
        ControlProps {
            automation_id: aid.into(),
            control_id: cid,
            name: name.into(),
            control_type: ct.into(),
            localized_control_type: String::new(),
            rect: Some(Rect::new(0, 0, 40, 20)),
        }
    }

    #[test]
    fn most_specific_candidate_comes_first() {
        let desc = ControlDescriptor {
            automation_id: Some("btnSend".into()),
            control_id: Some(1001),
            name: Some("Send".into()),
            ..Default::default()
        };
        let candidates = control_candidates(&desc);
        assert_eq!(
            candidates[0],
            ControlQuery {
                automation_id: Some("btnSend".into()),
                control_id: Some(1001),
                ..Default::default()
            }
        );
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[5].name.as_deref(), Some("Send"));
    }

    #[test]
    fn empty_strings_are_ignored_and_duplicates_dropped() {
        let desc = ControlDescriptor {
            automation_id: Some(String::new()),
            name: Some("OK".into()),
            control_type: Some("Button".into()),
            ..Default::default()
        };
        let candidates = control_candidates(&desc);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.automation_id.is_none()));
        assert!(control_candidates(&ControlDescriptor::default()).is_empty());
    }

    #[test]
    fn control_type_matches_localized_name_case_insensitively() {
        let query = ControlQuery {
            control_type: Some("button".into()),
            ..Default::default()
        };
        let mut p = props("", None, "Send", "Button");
        assert!(query.matches(&p));
        p.control_type = "ControlType(50000)".into();
        p.localized_control_type = "BUTTON".into();
        assert!(query.matches(&p));
    }

    #[test]
    fn ambiguous_candidate_falls_through_to_next() {
        let desc = ControlDescriptor {
            name: Some("Send".into()),
            control_type: Some("Button".into()),
            ..Default::default()
        };
        let elements = vec![
            props("a", None, "Send", "Button"),
            props("b", None, "Send later", "Button"),
            props("c", None, "Send", "Text"),
        ];
        // name+type matches a and b, name alone matches three; type alone two.
        assert_eq!(select_unique(&control_candidates(&desc), &elements), None);

        let elements = vec![
            props("a", None, "Send", "Button"),
            props("c", None, "Send", "Text"),
        ];
        assert_eq!(
            select_unique(&control_candidates(&desc), &elements),
            Some((0, 0))
        );
    }

    #[test]
    fn element_without_rectangle_is_not_accepted() {
        let query = vec![ControlQuery {
            automation_id: Some("x".into()),
            ..Default::default()
        }];
        let mut p = props("x", None, "", "");
        p.rect = None;
        assert_eq!(select_unique(&query, &[p]), None);
    }

    #[test]
    fn window_title_takes_precedence_over_class() {
        assert!(window_matches("千牛工作台 - 接待", "Qt5Window", Some("千牛"), Some("Nope")));
        assert!(!window_matches("Chat", "Qt5Window", Some("chat"), None));
        assert!(window_matches("Chat", "Qt5Window", None, Some("Qt5")));
        assert!(window_matches("Chat", "Qt5Window", Some(""), Some("Qt5")));
        assert!(!window_matches("Chat", "Qt5Window", None, None));
    }

    #[test]
    fn descriptor_without_window_has_no_target() {
        let mut control = ControlDescriptor {
            automation_id: Some("btnSend".into()),
            window_title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(target_window(&control), None);

        control.window_class = Some("Qt5Window".into());
        assert_eq!(target_window(&control), Some((None, Some("Qt5Window"))));
    }
}
