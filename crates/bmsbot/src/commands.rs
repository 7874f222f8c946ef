//! On-demand chat commands.
//!
//! A mention such as `@bmsbot health of tenant1-prod` is split into tokens,
//! the first token picks the command from a fixed table, and the rest are
//! its arguments. Every command produces a reply [`Message`]; source
//! failures become user-visible replies instead of errors.

use std::collections::HashMap;
use std::sync::Arc;

use bms_router::{
    format_matches, format_overview, format_status_line, Block, Message, Pattern, PatternKind,
};
use tracing::{debug, warn};

use crate::error::BotError;
use crate::source::HealthSource;

/// Reply to `help`.
pub const HELP_TEXT: &str =
    "I do one thing, and I try to do it well. Just @mention me with 'health %namespace%' or just 'health'.";

/// Words skipped by the tokenizer.
const FILLER_WORDS: &[&str] = &["of"];

/// What a command name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Health overview, wildcard listing or single resource.
    Health,
    /// Usage text.
    Help,
}

/// Splits a mention into tokens.
///
/// User mentions (`<@U123>`) and filler words are dropped.
#[must_use]
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|token| !token.starts_with('<') && !FILLER_WORDS.contains(token))
        .collect()
}

/// Maps command names to handlers.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandKind>,
    source: Arc<dyn HealthSource>,
}

impl CommandRegistry {
    /// Creates the registry with the built-in commands.
    #[must_use]
    pub fn new(source: Arc<dyn HealthSource>) -> Self {
        let commands = HashMap::from([
            ("health", CommandKind::Health),
            ("status", CommandKind::Health),
            ("help", CommandKind::Help),
        ]);
        Self { commands, source }
    }

    /// Returns the registered command names, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolves a command name, ignoring case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CommandKind> {
        self.commands.get(name.to_ascii_lowercase().as_str()).copied()
    }

    /// Handles one mention.
    pub async fn dispatch(&self, text: &str) -> Message {
        let tokens = tokenize(text);
        let Some((command, args)) = tokens.split_first() else {
            return plain(HELP_TEXT);
        };

        debug!(command = %command, args = ?args, "dispatching command");
        match self.lookup(command) {
            Some(CommandKind::Health) => self.health(args.first().copied()).await,
            Some(CommandKind::Help) => plain(HELP_TEXT),
            None => plain(&format!("{command}: Unknown Command.")),
        }
    }

    /// Handles a pick from the overview's select menu.
    pub async fn select_action(&self, value: &str) -> Message {
        self.health(Some(value)).await
    }

    /// Runs the `health` command.
    ///
    /// With no target, summarises every resource. A glob or regex target
    /// lists every resource whose name fully matches it. Anything else is
    /// looked up by name and shown with details.
    pub async fn health(&self, target: Option<&str>) -> Message {
        let Some(target) = target else {
            return match self.source.fetch_all().await {
                Ok(updates) => format_overview(&updates),
                Err(e) => source_failure("all resources", &e),
            };
        };

        match Pattern::parse(target) {
            Ok(pattern) if pattern.kind() != PatternKind::Literal => {
                self.health_matching(&pattern).await
            }
            _ => match self.source.fetch_one(target).await {
                Ok(update) => format_status_line(&update, true),
                Err(BotError::NotFound(_)) => {
                    plain(&format!("I could not find a resource named `{target}`."))
                }
                Err(e) => source_failure(target, &e),
            },
        }
    }

    async fn health_matching(&self, pattern: &Pattern) -> Message {
        match self.source.fetch_all().await {
            Ok(updates) => {
                let matched: Vec<_> = updates
                    .into_iter()
                    .filter(|u| pattern.is_match(u.name()))
                    .collect();
                format_matches(pattern.source(), &matched)
            }
            Err(e) => source_failure(pattern.source(), &e),
        }
    }
}

fn plain(text: &str) -> Message {
    Message {
        text: text.to_string(),
        blocks: vec![Block::markdown(text)],
    }
}

fn source_failure(target: &str, error: &BotError) -> Message {
    warn!(target = %target, error = %error, "health lookup failed");
    plain(&format!(
        "There was an error while fetching the health of {target}. Check logs for details."
    ))
}
