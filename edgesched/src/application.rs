/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Declarative application graph: services and the messages between them.
//!
//! Built once at start-up, validated as it is built, read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::ApplicationError;
use crate::message::MessageTemplate;

#[derive(Debug, Clone)]
pub struct Application {
    name: String,
    services: BTreeSet<String>,
    messages: BTreeMap<String, Arc<MessageTemplate>>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: BTreeSet::new(),
            messages: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_service(&mut self, name: impl Into<String>) -> Result<(), ApplicationError> {
        let name = name.into();
        if self.services.contains(&name) {
            return Err(ApplicationError::DuplicateService(name));
        }
        debug!(app = %self.name, service = %name, "service declared");
        self.services.insert(name);
        Ok(())
    }

    /// Declare a message type.
    ///
    /// # Errors
    /// * [`ApplicationError::UnknownService`] if `template.destination` was
    ///   not declared with [`add_service`](Self::add_service) first.
    /// * [`ApplicationError::DuplicateMessage`] if the name is taken.
    pub fn add_message(&mut self, template: MessageTemplate) -> Result<(), ApplicationError> {
        if !self.services.contains(&template.destination) {
            return Err(ApplicationError::UnknownService {
                message: template.name,
                service: template.destination,
            });
        }
        if self.messages.contains_key(&template.name) {
            return Err(ApplicationError::DuplicateMessage(template.name));
        }
        debug!(
            app = %self.name,
            message = %template.name,
            from = %template.source,
            to = %template.destination,
            instructions = template.instructions,
            bytes = template.bytes,
            "message declared"
        );
        self.messages.insert(template.name.clone(), Arc::new(template));
        Ok(())
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Services in name order.
    pub fn services(&self) -> impl Iterator<Item = &str> + '_ {
        self.services.iter().map(String::as_str)
    }

    pub fn message(&self, name: &str) -> Option<&Arc<MessageTemplate>> {
        self.messages.get(name)
    }

    /// Message templates in name order.
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MessageTemplate>> + '_ {
        self.messages.values()
    }
}
