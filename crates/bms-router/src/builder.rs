//! Chat message building.
//!
//! Every function here is pure: the same updates always produce the same
//! [`Message`], whichever channel it ends up in. Blocks serialize to the
//! chat platform's block-kit JSON.

use bms_proto::{HealthCategory, HealthUpdate};
use serde::{Deserialize, Serialize};

/// Marker prefixed to each error line.
pub const ERROR_MARKER: &str = ":small_red_triangle:";

/// Marker prefixed to each warning line.
pub const WARNING_MARKER: &str = ":small_orange_diamond:";

/// Marker prefixed to each alert line.
pub const ALERT_MARKER: &str = ":question:";

/// Icon leading the overview summary.
pub const OVERVIEW_ICON: &str = ":medical_symbol:";

/// Action ID carried by the overview select menu.
pub const SELECT_ACTION_ID: &str = "health";

/// The chat platform rejects select menus with more options than this.
pub const MAX_SELECT_OPTIONS: usize = 100;

/// A formatted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Plain one-line fallback text.
    pub text: String,
    /// Rich content.
    pub blocks: Vec<Block>,
}

impl Message {
    /// Renders the blocks as plain text, one line per text element.
    ///
    /// Used where rich content cannot be shown, such as logs and the CLI.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Section { text, accessory } => {
                    lines.push(text.text().to_string());
                    if let Some(Accessory::StaticSelect { options, .. }) = accessory {
                        let names: Vec<_> = options.iter().map(|o| o.value.as_str()).collect();
                        lines.push(format!("[{}]", names.join(", ")));
                    }
                }
                Block::Header { text } => lines.push(text.text().to_string()),
                Block::Divider => lines.push("---".to_string()),
            }
        }
        lines.join("\n")
    }
}

/// A layout block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Text with an optional interactive element.
    Section {
        /// Section body.
        text: TextObject,
        /// Interactive element shown beside the text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    /// Horizontal rule.
    Divider,
    /// Large plain heading.
    Header {
        /// Heading text.
        text: TextObject,
    },
}

impl Block {
    /// A section of markdown text.
    #[must_use]
    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Section {
            text: TextObject::Mrkdwn { text: text.into() },
            accessory: None,
        }
    }
}

/// A text element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    /// Markdown-formatted text.
    Mrkdwn {
        /// Content.
        text: String,
    },
    /// Unformatted text.
    PlainText {
        /// Content.
        text: String,
    },
}

impl TextObject {
    /// The raw content.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Mrkdwn { text } | Self::PlainText { text } => text,
        }
    }
}

/// An interactive element attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    /// Drop-down menu.
    StaticSelect {
        /// Text shown before anything is picked.
        placeholder: TextObject,
        /// Menu entries.
        options: Vec<SelectOption>,
        /// Identifies the menu in interaction payloads.
        action_id: String,
    },
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Label.
    pub text: TextObject,
    /// Value sent back when picked.
    pub value: String,
}

/// Formats the current state of one resource.
///
/// `"{icon} [{kind}] {name} state: {category}."`, followed by the details
/// when requested and the resource is not healthy.
#[must_use]
pub fn format_status_line(update: &HealthUpdate, include_details: bool) -> Message {
    let category = update.category();
    let icon = category.icon();

    let text = format!(
        "{icon} [{}] {} state: {category}.",
        update.kind(),
        update.name()
    );
    let mut blocks = vec![Block::markdown(format!(
        "{icon} [{}] *{}* state: {category}.",
        update.kind(),
        update.name()
    ))];

    if include_details {
        blocks.extend(detail_blocks(update));
    }

    Message { text, blocks }
}

/// Formats a state change.
///
/// `"{icon} [{kind}] {name} transitioned state: {previous} -> {current}"`,
/// followed by the details when the new state is not healthy.
#[must_use]
pub fn format_transition(update: &HealthUpdate) -> Message {
    let category = update.category();
    let previous = update.previous_category();
    let icon = category.icon();

    let text = format!(
        "{icon} [{}] {} transitioned state: {previous} -> {category}",
        update.kind(),
        update.name()
    );
    let mut blocks = vec![Block::markdown(format!(
        "{icon} [{}] *{}* transitioned state: {previous} -> {category}",
        update.kind(),
        update.name()
    ))];
    blocks.extend(detail_blocks(update));

    Message { text, blocks }
}

/// Formats a fleet-wide summary.
///
/// Counts are listed in the fixed order healthy, unhealthy, warning, alert,
/// skipping zeros. Unhealthy resources are listed with their error and
/// warning counts and offered in a select menu.
#[must_use]
pub fn format_overview(updates: &[HealthUpdate]) -> Message {
    let counts: Vec<String> = [
        HealthCategory::Healthy,
        HealthCategory::Unhealthy,
        HealthCategory::Warning,
        HealthCategory::Alert,
    ]
    .into_iter()
    .filter_map(|category| {
        let n = updates.iter().filter(|u| u.category() == category).count();
        (n > 0).then(|| format!("{}({n})", category.as_str().to_ascii_lowercase()))
    })
    .collect();

    let summary = if counts.is_empty() {
        "Overall health: no resources".to_string()
    } else {
        format!("Overall health: {}", counts.join(", "))
    };

    let mut blocks = vec![Block::Header {
        text: TextObject::PlainText {
            text: format!("{OVERVIEW_ICON} {summary}"),
        },
    }];

    let unhealthy: Vec<&HealthUpdate> = updates
        .iter()
        .filter(|u| u.category() == HealthCategory::Unhealthy)
        .collect();

    if !unhealthy.is_empty() {
        let lines: Vec<String> = unhealthy
            .iter()
            .map(|u| {
                format!(
                    "*{}*: {} errors, {} warnings.",
                    u.name(),
                    u.errors().len(),
                    u.warnings().len()
                )
            })
            .collect();

        let options = unhealthy
            .iter()
            .take(MAX_SELECT_OPTIONS)
            .map(|u| SelectOption {
                text: TextObject::PlainText {
                    text: u.name().to_string(),
                },
                value: u.name().to_string(),
            })
            .collect();

        blocks.push(Block::Divider);
        blocks.push(Block::Section {
            text: TextObject::Mrkdwn {
                text: lines.join("\n"),
            },
            accessory: Some(Accessory::StaticSelect {
                placeholder: TextObject::PlainText {
                    text: "More details...".to_string(),
                },
                options,
                action_id: SELECT_ACTION_ID.to_string(),
            }),
        });
    }

    Message {
        text: summary,
        blocks,
    }
}

/// Formats the result of a wildcard lookup.
#[must_use]
pub fn format_matches(pattern: &str, updates: &[HealthUpdate]) -> Message {
    let text = format!("Health results for \"{pattern}\":");

    let body = if updates.is_empty() {
        "_No resources matched._".to_string()
    } else {
        updates
            .iter()
            .map(|u| format_status_line(u, false).text)
            .collect::<Vec<_>>()
            .join("\n")
    };

    Message {
        blocks: vec![
            Block::Header {
                text: TextObject::PlainText { text: text.clone() },
            },
            Block::markdown(body),
        ],
        text,
    }
}

fn detail_blocks(update: &HealthUpdate) -> Vec<Block> {
    if update.category() == HealthCategory::Healthy {
        return Vec::new();
    }

    let sections: Vec<Block> = [
        (ERROR_MARKER, update.errors()),
        (WARNING_MARKER, update.warnings()),
        (ALERT_MARKER, update.alerts()),
    ]
    .into_iter()
    .filter(|(_, items)| !items.is_empty())
    .map(|(marker, items)| Block::markdown(lines_markdown(marker, items)))
    .collect();

    if sections.is_empty() {
        return sections;
    }

    let mut blocks = Vec::with_capacity(sections.len() + 1);
    blocks.push(Block::Divider);
    blocks.extend(sections);
    blocks
}

fn lines_markdown(marker: &str, items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("{marker} {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
