//! The plugin container.
//!
//! [`PluginContainer`] owns the ordered list of registered plugins and
//! resolves, per hook, which of them to call:
//!
//! - additive hooks call every implementing plugin in registration order;
//! - exclusive hooks call only the most recently registered implementor,
//!   so later registrations shadow earlier ones.
//!
//! Capability sets are recorded once at registration; resolving a hook
//! never asks a plugin anything.

use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use std::fmt;
use std::sync::Arc;

struct Registered {
    plugin: Arc<dyn Plugin>,
    hooks: HookSet,
}

/// An append-only, ordered collection of plugins.
#[derive(Clone, Default)]
pub struct PluginContainer {
    plugins: Vec<Arc<Registered>>,
    /// Per hook, the positions of implementing plugins in registration order.
    index: [Vec<usize>; Hook::COUNT],
}

impl PluginContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin after all previously registered ones.
    pub fn add<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        self.add_arc(Arc::new(plugin))
    }

    /// Registers a shared plugin after all previously registered ones.
    pub fn add_arc(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        let hooks = plugin.hooks();
        let position = self.plugins.len();
        for hook in hooks.iter() {
            self.index[hook as usize].push(position);
        }
        tracing::debug!(plugin = plugin.name(), hooks = ?hooks, "plugin registered");
        self.plugins.push(Arc::new(Registered { plugin, hooks }));
        self
    }

    /// Every plugin implementing `hook`, in registration order.
    pub fn implementors(&self, hook: Hook) -> impl Iterator<Item = &dyn Plugin> + '_ {
        self.index[hook as usize]
            .iter()
            .map(|&position| self.plugins[position].plugin.as_ref())
    }

    /// The most recently registered plugin implementing `hook`.
    #[must_use]
    pub fn last_implementor(&self, hook: Hook) -> Option<&dyn Plugin> {
        self.index[hook as usize]
            .last()
            .map(|&position| self.plugins[position].plugin.as_ref())
    }

    /// The plugins to call for `hook`: all implementors for additive
    /// hooks, the last implementor only for exclusive hooks.
    #[must_use]
    pub fn call_list(&self, hook: Hook) -> Vec<&dyn Plugin> {
        if hook.is_exclusive() {
            self.last_implementor(hook).into_iter().collect()
        } else {
            self.implementors(hook).collect()
        }
    }

    /// Returns the hooks recorded for the plugin named `name`.
    #[must_use]
    pub fn hooks_of(&self, name: &str) -> Option<HookSet> {
        self.plugins
            .iter()
            .find(|registered| registered.plugin.name() == name)
            .map(|registered| registered.hooks)
    }

    /// Checks whether a plugin named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.hooks_of(name).is_some()
    }

    /// Plugin names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins
            .iter()
            .map(|registered| registered.plugin.name())
            .collect()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true when no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.plugins
                    .iter()
                    .map(|registered| (registered.plugin.name(), registered.hooks)),
            )
            .finish()
    }
}
