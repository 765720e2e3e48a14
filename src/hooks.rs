//! Extension hooks
//!
//! Rules may list extension commands under `non-bids.code_execution`. Each
//! entry is the *name* of a callback registered in a [`HookRegistry`]; nothing
//! in the rules is ever evaluated as code.
//!
//! Hooks run in order, once per file, after channel renames and types have
//! been staged and before the target path is resolved, so a hook may still
//! adjust the entities. A hook that fails (or is not registered) is logged
//! and skipped; the pipeline always continues.
//!
//! ```
//! use sovabids::hooks::HookRegistry;
//!
//! let mut hooks = HookRegistry::new();
//! hooks.register("default_task", |ctx| {
//!     ctx.rules["entities"]["task"] = "resting".into();
//!     Ok(())
//! });
//! assert!(hooks.contains("default_task"));
//! ```

use log::{debug, warn};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Error;
use crate::recording::Recording;

/// What a hook gets to see and change.
pub struct HookContext<'a> {
    /// Source recording being mapped.
    pub file: &'a Path,
    /// The merged rules for this file.
    pub rules: &'a mut YamlValue,
    /// The recording, when one has been read (not in dry mode).
    pub recording: Option<&'a mut dyn Recording>,
}

type HookFn = dyn Fn(&mut HookContext<'_>) -> Result<(), String> + Send + Sync;

/// Named extension callbacks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, Box<HookFn>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` under `name`, replacing any previous hook of that name.
    pub fn register<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.insert(name.to_string(), Box::new(hook));
    }

    /// Whether a hook is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Registered hook names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.hooks.keys().map(String::as_str).collect()
    }

    /// Run `commands` in order.
    ///
    /// Failures are logged with the command text and returned; they never
    /// stop the remaining commands.
    pub fn run(&self, commands: &[String], ctx: &mut HookContext<'_>) -> Vec<Error> {
        let mut failures = Vec::new();
        for command in commands {
            let name = command.trim();
            let outcome = match self.hooks.get(name) {
                Some(hook) => hook(ctx),
                None => Err("no hook is registered under this name".to_string()),
            };
            match outcome {
                Ok(()) => debug!("Hook '{}' ran for '{}'", name, ctx.file.display()),
                Err(message) => {
                    let error = Error::ExtensionHook {
                        command: command.clone(),
                        message,
                    };
                    warn!("{} (file '{}'); continuing", error, ctx.file.display());
                    failures.push(error);
                }
            }
        }
        failures
    }
}
