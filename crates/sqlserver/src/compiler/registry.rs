//! Predicate handler registry
//!
//! Handlers turn values the dialect cannot express as literals (regular
//! expressions, caller-defined objects) into SQL fragments. The registry is
//! built during adapter initialization and handed to the compiler; lookups
//! return the earliest registered handler that matches.

use std::fmt;
use std::sync::Arc;

use crate::error::DialectResult;
use crate::value::{SqlValue, ValueKind};

use super::SqlFragment;

/// Handler receiving the quoted column and the value
pub type PredicateHandler = Arc<dyn Fn(&str, &SqlValue) -> DialectResult<SqlFragment> + Send + Sync>;

/// What a handler is registered for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerKey {
    /// Comparisons whose value has this kind
    Kind(ValueKind),
    /// `Predicate::Custom` nodes carrying this handler id
    Named(String),
}

/// Ordered table of predicate handlers
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<(HandlerKey, PredicateHandler)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for comparisons against values of `kind`
    pub fn register_handler<F>(&mut self, kind: ValueKind, handler: F) -> &mut Self
    where
        F: Fn(&str, &SqlValue) -> DialectResult<SqlFragment> + Send + Sync + 'static,
    {
        tracing::debug!("Registering predicate handler for value kind '{}'", kind);
        self.handlers.push((HandlerKey::Kind(kind), Arc::new(handler)));
        self
    }

    /// Register a handler for `Predicate::Custom` nodes with this id
    pub fn register_named<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&str, &SqlValue) -> DialectResult<SqlFragment> + Send + Sync + 'static,
    {
        tracing::debug!("Registering predicate handler '{}'", name);
        self.handlers
            .push((HandlerKey::Named(name.to_string()), Arc::new(handler)));
        self
    }

    /// First handler registered for the value's kind
    pub fn handler_for_value(&self, value: &SqlValue) -> Option<&PredicateHandler> {
        let kind = value.kind();
        self.handlers
            .iter()
            .find(|(key, _)| matches!(key, HandlerKey::Kind(k) if *k == kind))
            .map(|(_, handler)| handler)
    }

    /// First handler registered under `name`
    pub fn handler_named(&self, name: &str) -> Option<&PredicateHandler> {
        self.handlers
            .iter()
            .find(|(key, _)| matches!(key, HandlerKey::Named(n) if n == name))
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field(
                "handlers",
                &self.handlers.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            )
            .finish()
    }
}
