//! The paste payload returned by the API and the per-platform action table.

use std::fmt::Display;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Paste {
    /// Filled in by the client from the requested code when the server omits it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default = "default_syntax", deserialize_with = "lenient_syntax")]
    pub syntax: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub views_count: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_password_protected: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub require_actions: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<Action>,
}

impl Paste {
    #[must_use]
    pub fn display_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => "Untitled",
        }
    }

    /// Number of actions a reader must complete before the content unlocks.
    /// Zero whenever the paste does not require actions at all.
    #[must_use]
    pub fn required_actions(&self) -> usize {
        if self.require_actions {
            self.actions.len()
        } else {
            0
        }
    }
}

fn default_syntax() -> String {
    "text".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Action {
    #[serde(default, deserialize_with = "null_as_default")]
    pub action_type: ActionType,
    pub action_url: String,
    #[serde(default)]
    pub action_label: Option<String>,
}

impl Action {
    /// The text shown on the action's button.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.action_label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => self.action_type.descriptor().default_label,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Youtube,
    Instagram,
    Tiktok,
    Facebook,
    Twitter,
    Whatsapp,
    Telegram,
    Discord,
    #[default]
    #[serde(other)]
    Custom,
}

/// Static presentation data for an [`ActionType`].
#[derive(Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub name: &'static str,
    pub default_label: &'static str,
    /// Brand color, as a CSS hex string.
    pub accent: &'static str,
    /// Palette name used by the stylesheet.
    pub theme: &'static str,
}

impl ActionType {
    pub const ALL: [Self; 9] = [
        Self::Youtube,
        Self::Instagram,
        Self::Tiktok,
        Self::Facebook,
        Self::Twitter,
        Self::Whatsapp,
        Self::Telegram,
        Self::Discord,
        Self::Custom,
    ];

    #[must_use]
    pub const fn descriptor(self) -> &'static Descriptor {
        match self {
            Self::Youtube => &Descriptor {
                name: "youtube",
                default_label: "Subscribe to YouTube Channel",
                accent: "#FF0000",
                theme: "red",
            },
            Self::Instagram => &Descriptor {
                name: "instagram",
                default_label: "Follow on Instagram",
                accent: "#D6249F",
                theme: "purple",
            },
            Self::Tiktok => &Descriptor {
                name: "tiktok",
                default_label: "Follow on TikTok",
                accent: "#000000",
                theme: "gray",
            },
            Self::Facebook => &Descriptor {
                name: "facebook",
                default_label: "Like Facebook Page",
                accent: "#1877F2",
                theme: "blue",
            },
            Self::Twitter => &Descriptor {
                name: "twitter",
                default_label: "Follow on Twitter",
                accent: "#1DA1F2",
                theme: "sky",
            },
            Self::Whatsapp => &Descriptor {
                name: "whatsapp",
                default_label: "Visit Link",
                accent: "#25D366",
                theme: "green",
            },
            Self::Telegram => &Descriptor {
                name: "telegram",
                default_label: "Visit Link",
                accent: "#0088CC",
                theme: "cyan",
            },
            Self::Discord => &Descriptor {
                name: "discord",
                default_label: "Visit Link",
                accent: "#5865F2",
                theme: "indigo",
            },
            Self::Custom => &Descriptor {
                name: "custom",
                default_label: "Visit Link",
                accent: "#6B7280",
                theme: "gray",
            },
        }
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.descriptor().name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_syntax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|syntax| !syntax.trim().is_empty())
        .unwrap_or_else(default_syntax))
}

/// Accepts booleans as well as the `0`/`1` and `"0"`/`"1"` some backends send.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(flag) => flag,
        serde_json::Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        serde_json::Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

// Servers disagree on timestamp formats; a bad one shouldn't hide the paste.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(raw)) => raw,
        _ => return Ok(None),
    };

    if let Ok(time) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(time.with_timezone(&Utc)));
    }

    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive)))
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use serde_json::json;

    use super::*;

    #[test]
    fn minimal_payload_takes_defaults() {
        let paste: Paste = serde_json::from_value(json!({ "content": "hi" })).unwrap();
        assert_eq!(paste.title, None);
        assert_eq!(paste.syntax, "text");
        assert_eq!(paste.views_count, 0);
        assert!(!paste.is_password_protected);
        assert!(!paste.require_actions);
        assert!(paste.actions.is_empty());
        assert_eq!(paste.display_title(), "Untitled");
    }

    #[test]
    fn null_actions_are_empty() {
        let paste: Paste =
            serde_json::from_value(json!({ "content": "", "actions": null })).unwrap();
        assert!(paste.actions.is_empty());
    }

    #[test]
    fn null_fields_take_defaults() {
        let paste: Paste = serde_json::from_value(json!({
            "code": null,
            "title": null,
            "content": null,
            "syntax": null,
            "views_count": null,
            "is_password_protected": null,
            "require_actions": null,
        }))
        .unwrap();
        assert_eq!(paste.code, "");
        assert_eq!(paste.title, None);
        assert_eq!(paste.content, "");
        assert_eq!(paste.syntax, "text");
        assert_eq!(paste.views_count, 0);
        assert!(!paste.is_password_protected);
        assert!(!paste.require_actions);

        let blank: Paste = serde_json::from_value(json!({ "syntax": "" })).unwrap();
        assert_eq!(blank.syntax, "text");
    }

    #[test]
    fn numeric_flags_are_booleans() {
        let paste: Paste = serde_json::from_value(json!({
            "is_password_protected": 1,
            "require_actions": 0,
        }))
        .unwrap();
        assert!(paste.is_password_protected);
        assert!(!paste.require_actions);

        let paste: Paste = serde_json::from_value(json!({
            "is_password_protected": "0",
            "require_actions": "1",
        }))
        .unwrap();
        assert!(!paste.is_password_protected);
        assert!(paste.require_actions);
    }

    #[test]
    fn null_action_types_are_custom() {
        let action: Action = serde_json::from_value(json!({
            "action_type": null,
            "action_url": "https://example.com",
        }))
        .unwrap();
        assert_eq!(action.action_type, ActionType::Custom);
    }

    #[test]
    fn timestamps_parse_leniently() {
        let rfc: Paste =
            serde_json::from_value(json!({ "created_at": "2024-03-01T10:00:00.000000Z" }))
                .unwrap();
        assert_eq!(rfc.created_at.unwrap().month(), 3);

        let sql: Paste =
            serde_json::from_value(json!({ "created_at": "2024-03-01 10:00:00" })).unwrap();
        assert_eq!(sql.created_at, rfc.created_at);

        let junk: Paste = serde_json::from_value(json!({ "created_at": "yesterday" })).unwrap();
        assert_eq!(junk.created_at, None);
    }

    #[test]
    fn unknown_action_types_become_custom() {
        let action: Action = serde_json::from_value(json!({
            "action_type": "myspace",
            "action_url": "https://myspace.example",
        }))
        .unwrap();
        assert_eq!(action.action_type, ActionType::Custom);
        assert_eq!(action.label(), "Visit Link");
    }

    #[test]
    fn labels_prefer_the_author_text() {
        let mut action = Action {
            action_type: ActionType::Youtube,
            action_url: "https://youtube.example".to_string(),
            action_label: Some("  ".to_string()),
        };
        assert_eq!(action.label(), "Subscribe to YouTube Channel");

        action.action_label = Some("Watch the trailer".to_string());
        assert_eq!(action.label(), "Watch the trailer");
    }

    #[test]
    fn descriptor_names_match_the_wire_names() {
        for action_type in ActionType::ALL {
            let wire = serde_json::to_value(action_type).unwrap();
            assert_eq!(wire, json!(action_type.descriptor().name));
        }
    }
}
