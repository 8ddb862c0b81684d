// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User-customizable decision points.
//!
//! Every filter and transform in the item pipeline is either a built-in
//! default or an external shell command supplied by the operator.

mod shell;

pub use shell::ShellCommand;

use async_trait::async_trait;

use crate::error::CommandError;

/// A yes/no decision about an item name
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn matches(&self, input: &str) -> Result<bool, CommandError>;
}

/// A string-to-string rewrite with optional named inputs
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, input: &str, env: &[(&str, &str)]) -> Result<String, CommandError>;
}

/// Predicate with a fixed answer, used when no command is configured
#[derive(Debug, Clone, Copy)]
pub struct Always(pub bool);

#[async_trait]
impl Predicate for Always {
    async fn matches(&self, _input: &str) -> Result<bool, CommandError> {
        Ok(self.0)
    }
}

/// Transform that returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[async_trait]
impl Transform for Identity {
    async fn transform(&self, input: &str, _env: &[(&str, &str)]) -> Result<String, CommandError> {
        Ok(input.to_string())
    }
}

/// Shell expressions for each hook; `None` or empty selects the default
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    pub normalize: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub item_path: Option<String>,
    pub sanitize: Option<String>,
}

/// The full set of pipeline hooks for one run
pub struct Hooks {
    /// Rewrites the item name before any checks
    pub normalize: Box<dyn Transform>,
    /// Items must match to be kept
    pub include: Box<dyn Predicate>,
    /// Items matching are dropped
    pub exclude: Box<dyn Predicate>,
    /// Builds the item directory name from `INDEX`, `NAME` and `FEED`
    pub item_path: Box<dyn Transform>,
    /// Cleans up directory and media file names
    pub sanitize: Box<dyn Transform>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            normalize: Box::new(Identity),
            include: Box::new(Always(true)),
            exclude: Box::new(Always(false)),
            item_path: Box::new(Identity),
            sanitize: Box::new(Identity),
        }
    }
}

impl Hooks {
    /// Build hooks from configuration, falling back to defaults for unset entries
    pub fn from_config(config: &HookConfig) -> Self {
        let mut hooks = Self::default();

        if let Some(cmd) = shell_command(&config.normalize) {
            hooks.normalize = Box::new(cmd);
        }
        if let Some(cmd) = shell_command(&config.include) {
            hooks.include = Box::new(cmd);
        }
        if let Some(cmd) = shell_command(&config.exclude) {
            hooks.exclude = Box::new(cmd);
        }
        if let Some(cmd) = shell_command(&config.item_path) {
            hooks.item_path = Box::new(cmd);
        }
        if let Some(cmd) = shell_command(&config.sanitize) {
            hooks.sanitize = Box::new(cmd);
        }

        hooks
    }
}

fn shell_command(expr: &Option<String>) -> Option<ShellCommand> {
    expr.as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(ShellCommand::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_hooks_pass_everything_through() {
        let hooks = Hooks::default();

        assert!(hooks.include.matches("any").await.unwrap());
        assert!(!hooks.exclude.matches("any").await.unwrap());
        assert_eq!(hooks.normalize.transform("Name ", &[]).await.unwrap(), "Name ");
        assert_eq!(
            hooks
                .item_path
                .transform("Name", &[("INDEX", "0"), ("NAME", "Name")])
                .await
                .unwrap(),
            "Name"
        );
        assert_eq!(hooks.sanitize.transform("a/b", &[]).await.unwrap(), "a/b");
    }

    #[test]
    fn blank_expressions_select_defaults() {
        assert!(shell_command(&None).is_none());
        assert!(shell_command(&Some("   ".to_string())).is_none());
        assert_eq!(
            shell_command(&Some(" tr a b ".to_string())).unwrap().expr(),
            "tr a b"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn configured_hooks_run_commands() {
        let hooks = Hooks::from_config(&HookConfig {
            exclude: Some("grep -q trailer".to_string()),
            ..Default::default()
        });

        assert!(hooks.exclude.matches("season trailer").await.unwrap());
        assert!(!hooks.exclude.matches("episode 1").await.unwrap());
        // untouched hooks keep their defaults
        assert!(hooks.include.matches("episode 1").await.unwrap());
    }
}
