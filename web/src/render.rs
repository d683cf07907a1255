//! View data handed to the page's render hooks.

use std::collections::BTreeSet;

use maud::{html, Markup};
use pastegate_common::linkify::{lines, Segment};
use pastegate_common::{share_link, Paste, Progress, Url};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionView<'a> {
    pub index: usize,
    pub kind: &'static str,
    pub label: &'a str,
    pub url: &'a str,
    pub accent: &'static str,
    pub theme: &'static str,
    pub completed: bool,
    pub processing: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGateView<'a> {
    pub title: &'a str,
    pub actions: Vec<ActionView<'a>>,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub progress_text: String,
    pub can_continue: bool,
    /// An action is processing, so every button is disabled.
    pub busy: bool,
}

impl<'a> ActionGateView<'a> {
    pub fn new(paste: &'a Paste, completed: &BTreeSet<usize>, processing: Option<usize>) -> Self {
        let actions = paste
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let descriptor = action.action_type.descriptor();
                ActionView {
                    index,
                    kind: descriptor.name,
                    label: action.label(),
                    url: &action.action_url,
                    accent: descriptor.accent,
                    theme: descriptor.theme,
                    completed: completed.contains(&index),
                    processing: processing == Some(index),
                }
            })
            .collect();
        let progress = Progress::of(paste, completed);

        Self {
            title: paste.display_title(),
            actions,
            completed: progress.completed,
            total: progress.total,
            percent: progress.percent(),
            progress_text: progress.to_string(),
            can_continue: progress.is_complete() && processing.is_none(),
            busy: processing.is_some(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteView {
    pub code: String,
    pub title: String,
    pub syntax: String,
    pub views: u64,
    pub created: Option<String>,
    pub share_link: String,
    /// Escaped content with bare URLs turned into links.
    pub content_html: String,
}

impl PasteView {
    pub fn new(paste: &Paste, origin: &Url) -> Self {
        Self {
            code: paste.code.clone(),
            title: paste.display_title().to_string(),
            syntax: paste.syntax.clone(),
            views: paste.views_count,
            created: paste
                .created_at
                .map(|at| at.format("%B %-d, %Y").to_string()),
            share_link: share_link(origin, &paste.code).to_string(),
            content_html: content(&paste.content).into_string(),
        }
    }
}

/// Renders paste content line by line, linking every `http(s)` URL.
pub fn content(text: &str) -> Markup {
    html! {
        @for (i, line) in lines(text).iter().enumerate() {
            @if i > 0 {
                br;
            }
            @for segment in line {
                @match segment {
                    Segment::Text(text) => (text),
                    Segment::Link(url) => {
                        a href=(url) target="_blank" rel="noopener noreferrer" { (url) }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pastegate_common::{Action, ActionType};

    use super::*;

    fn paste() -> Paste {
        let mut paste: Paste = serde_json::from_str(
            r#"{
                "code": "abc123",
                "title": "Notes",
                "content": "hi",
                "views_count": 4,
                "created_at": "2024-03-05 10:00:00"
            }"#,
        )
        .unwrap();
        paste.require_actions = true;
        paste.actions = vec![
            Action {
                action_type: ActionType::Youtube,
                action_url: "https://youtube.example/c".to_string(),
                action_label: None,
            },
            Action {
                action_type: ActionType::Custom,
                action_url: "https://example.com".to_string(),
                action_label: Some("Read the blog".to_string()),
            },
        ];
        paste
    }

    #[test]
    fn content_is_escaped_and_linked() {
        let html = content("a <b>\nsee https://x.io now").into_string();
        assert_eq!(
            html,
            "a &lt;b&gt;<br>see <a href=\"https://x.io\" target=\"_blank\" \
             rel=\"noopener noreferrer\">https://x.io</a> now"
        );
    }

    #[test]
    fn action_gate_reports_progress() {
        let paste = paste();
        let view = ActionGateView::new(&paste, &BTreeSet::from([1]), None);

        assert_eq!(view.title, "Notes");
        assert_eq!(view.progress_text, "Unlock Progress 1/2");
        assert_eq!(view.percent, 50);
        assert!(!view.can_continue);
        assert_eq!(view.actions[0].label, "Subscribe to YouTube Channel");
        assert_eq!(view.actions[0].kind, "youtube");
        assert!(!view.actions[0].completed);
        assert_eq!(view.actions[1].label, "Read the blog");
        assert!(view.actions[1].completed);
    }

    #[test]
    fn processing_action_blocks_continue() {
        let paste = paste();
        let view = ActionGateView::new(&paste, &BTreeSet::from([0]), Some(1));
        assert!(view.busy);
        assert!(view.actions[1].processing);
        assert!(!view.can_continue);

        let view = ActionGateView::new(&paste, &BTreeSet::from([0, 1]), None);
        assert!(view.can_continue);
    }

    #[test]
    fn paste_view_carries_share_link() {
        let origin = Url::parse("https://paste.example/verify?x=1").unwrap();
        let view = PasteView::new(&paste(), &origin);

        assert_eq!(view.share_link, "https://paste.example/abc123");
        assert_eq!(view.created.as_deref(), Some("March 5, 2024"));
        assert_eq!(view.views, 4);
        assert_eq!(view.content_html, "hi");
    }
}
