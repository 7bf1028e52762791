use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::session::Session;

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Callback invoked for every message an action's pattern matches.
pub type ActionHandler = Arc<dyn Fn(Session, ActionContext) -> HandlerFuture + Send + Sync>;

/// A compiled pattern bound to a handler.
#[derive(Clone)]
pub struct Action {
    pattern: String,
    regex: Regex,
    handler: ActionHandler,
    /// Human-readable form of the pattern for help output
    pub friendly_pattern: Option<String>,
    pub description: Option<String>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("pattern", &self.pattern)
            .field("friendly_pattern", &self.friendly_pattern)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Compile `pattern` and bind it to `handler`.
    ///
    /// An invalid regular expression is a configuration error; callers are
    /// expected to abort startup on it.
    pub fn new<F, Fut>(pattern: &str, handler: F) -> Result<Self>
    where
        F: Fn(Session, ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let handler: ActionHandler =
            Arc::new(move |session: Session, ctx: ActionContext| -> HandlerFuture {
                Box::pin(handler(session, ctx))
            });
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            handler,
            friendly_pattern: None,
            description: None,
        })
    }

    pub fn with_friendly_pattern(mut self, friendly: impl Into<String>) -> Self {
        self.friendly_pattern = Some(friendly.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Every non-overlapping match in `text`, each as its full submatch
    /// group list. Groups that did not participate are empty strings.
    pub fn find_matches(&self, text: &str) -> Vec<Vec<String>> {
        self.regex
            .captures_iter(text)
            .map(|caps| {
                caps.iter()
                    .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub(crate) fn invoke(&self, session: Session, ctx: ActionContext) -> HandlerFuture {
        (self.handler)(session, ctx)
    }
}

/// Everything a handler learns about the message that triggered it.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub action: Action,
    pub matches: Vec<Vec<String>>,
    pub message: Message,
}

impl ActionContext {
    /// Capture group `group` of the first match, if present and non-empty.
    pub fn capture(&self, group: usize) -> Option<&str> {
        self.matches
            .first()
            .and_then(|m| m.get(group))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// An action together with the matches it produced.
#[derive(Debug, Clone)]
pub struct ActionMatch {
    pub action: Action,
    pub matches: Vec<Vec<String>>,
}

/// The two independent registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSet {
    /// Fires on every routed message
    Hear,
    /// Fires only on messages addressed to the bot
    Respond,
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSet::Hear => write!(f, "hear"),
            ActionSet::Respond => write!(f, "respond"),
        }
    }
}

/// Actions keyed by their raw pattern string.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    actions: HashMap<String, Action>,
}

impl PatternSet {
    /// Insert an action, replacing any previous one with the same pattern.
    pub fn register(&mut self, action: Action) -> Option<Action> {
        self.actions.insert(action.pattern.clone(), action)
    }

    pub fn get(&self, pattern: &str) -> Option<&Action> {
        self.actions.get(pattern)
    }

    pub fn list(&self) -> Vec<&Action> {
        self.actions.values().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All actions whose pattern is found anywhere in `text`.
    ///
    /// Iteration order is unspecified.
    pub fn match_all(&self, text: &str) -> Vec<ActionMatch> {
        self.actions
            .values()
            .filter_map(|action| {
                let matches = action.find_matches(text);
                if matches.is_empty() {
                    None
                } else {
                    Some(ActionMatch {
                        action: action.clone(),
                        matches,
                    })
                }
            })
            .collect()
    }
}

/// Hear and Respond registries. Frozen once the bot connects.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    hear: PatternSet,
    respond: PatternSet,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, set: ActionSet, action: Action) {
        debug!("Registered {} action: {}", set, action.pattern);
        if self.set_mut(set).register(action).is_some() {
            debug!("Replaced an existing {} action with the same pattern", set);
        }
    }

    pub fn set(&self, set: ActionSet) -> &PatternSet {
        match set {
            ActionSet::Hear => &self.hear,
            ActionSet::Respond => &self.respond,
        }
    }

    fn set_mut(&mut self, set: ActionSet) -> &mut PatternSet {
        match set {
            ActionSet::Hear => &mut self.hear,
            ActionSet::Respond => &mut self.respond,
        }
    }

    pub fn match_all(&self, set: ActionSet, text: &str) -> Vec<ActionMatch> {
        self.set(set).match_all(text)
    }

    /// Listing of every action for help output, sorted by pattern.
    pub fn help_text(&self) -> String {
        let mut help = String::new();
        for (title, set) in [("Listening for", &self.hear), ("Responding to", &self.respond)] {
            if set.is_empty() {
                continue;
            }
            let mut actions = set.list();
            actions.sort_by(|a, b| a.pattern.cmp(&b.pattern));

            help.push_str(&format!("{}:\n", title));
            for action in actions {
                let shown = action.friendly_pattern.as_deref().unwrap_or(&action.pattern);
                match &action.description {
                    Some(description) => help.push_str(&format!("  - {}: {}\n", shown, description)),
                    None => help.push_str(&format!("  - {}\n", shown)),
                }
            }
        }
        help
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(pattern: &str) -> Action {
        Action::new(pattern, |_session, _ctx| async { anyhow::Ok(()) }).unwrap()
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = Action::new("hel(lo", |_session, _ctx| async { anyhow::Ok(()) }).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "hel(lo"));
    }

    #[test]
    fn test_reregistering_same_pattern_overwrites() {
        let mut registry = Registry::new();
        registry.register(ActionSet::Hear, noop("hello").with_description("first"));
        registry.register(ActionSet::Hear, noop("hello").with_description("second"));

        let hear = registry.set(ActionSet::Hear);
        assert_eq!(hear.len(), 1);
        assert_eq!(hear.get("hello").unwrap().description.as_deref(), Some("second"));
    }

    #[test]
    fn test_sets_are_independent() {
        let mut registry = Registry::new();
        registry.register(ActionSet::Hear, noop("ping"));
        registry.register(ActionSet::Respond, noop("ping"));
        assert_eq!(registry.set(ActionSet::Hear).len(), 1);
        assert_eq!(registry.set(ActionSet::Respond).len(), 1);
    }

    #[test]
    fn test_match_anywhere_in_text() {
        let mut registry = Registry::new();
        registry.register(ActionSet::Hear, noop("hello"));

        let found = registry.match_all(ActionSet::Hear, "well hello there");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].matches, vec![vec!["hello".to_string()]]);
        assert!(registry.match_all(ActionSet::Hear, "goodbye").is_empty());
    }

    #[test]
    fn test_match_all_returns_every_matching_action() {
        let mut registry = Registry::new();
        registry.register(ActionSet::Hear, noop("hello"));
        registry.register(ActionSet::Hear, noop("there"));
        registry.register(ActionSet::Hear, noop("nope"));

        let mut patterns: Vec<String> = registry
            .match_all(ActionSet::Hear, "hello there")
            .into_iter()
            .map(|m| m.action.pattern().to_string())
            .collect();
        patterns.sort();
        assert_eq!(patterns, vec!["hello", "there"]);
    }

    #[test]
    fn test_submatch_groups_for_every_occurrence() {
        let action = noop(r"(\d+)(x)?");
        assert_eq!(
            action.find_matches("1x and 22"),
            vec![
                vec!["1x".to_string(), "1".to_string(), "x".to_string()],
                vec!["22".to_string(), "22".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn test_context_capture() {
        let action = noop(r"mute (\d+)");
        let ctx = ActionContext {
            matches: action.find_matches("please mute 30 now"),
            action,
            message: Message::default(),
        };
        assert_eq!(ctx.capture(1), Some("30"));
        assert_eq!(ctx.capture(2), None);
    }

    #[test]
    fn test_help_text_lists_actions() {
        let mut registry = Registry::new();
        registry.register(
            ActionSet::Respond,
            noop(r"mute (\d+)")
                .with_friendly_pattern("mute <seconds>")
                .with_description("Stay quiet for a while"),
        );
        registry.register(ActionSet::Hear, noop("hello"));

        let help = registry.help_text();
        assert!(help.contains("Listening for:\n  - hello\n"));
        assert!(help.contains("Responding to:\n  - mute <seconds>: Stay quiet for a while\n"));
    }

    #[test]
    fn test_help_text_empty_registry() {
        assert_eq!(Registry::new().help_text(), "");
    }
}
