//! Action Executor
//!
//! Performs planned actions in order, one LXD call per action. In dry-run
//! mode the call is skipped but the action is still logged, so a check run
//! reports exactly what a real run would do.

use super::desired::DesiredResource;
use super::diff::Action;
use crate::domain::ports::{HttpMethod, LxdApi};
use crate::error::Result;
use crate::resource::identity::with_query;
use serde_json::Value;
use tracing::{info, warn};

// =============================================================================
// Action Log
// =============================================================================

/// Append-only record of the actions taken during one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLog {
    actions: Vec<Action>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn tags(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.tag().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

// =============================================================================
// Executor
// =============================================================================

/// A single LXD request derived from an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Runs planned actions against the LXD API
pub struct ActionExecutor<'a> {
    api: &'a dyn LxdApi,
    dry_run: bool,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(api: &'a dyn LxdApi, dry_run: bool) -> Self {
        Self { api, dry_run }
    }

    /// Execute `actions` in order, appending each to `log` once it has taken
    /// effect. Stops at the first failure.
    pub async fn execute(
        &self,
        resource: &DesiredResource,
        actions: &[Action],
        log: &mut ActionLog,
    ) -> Result<()> {
        for action in actions {
            let request = Self::request_for(resource, action);

            if self.dry_run {
                warn!(
                    "Check mode: skipping {} {} for {} {}",
                    request.method,
                    request.path,
                    resource.identity.kind_label(),
                    resource.identity
                );
            } else {
                info!(
                    "Performing {} on {} {}",
                    action,
                    resource.identity.kind_label(),
                    resource.identity
                );
                self.api
                    .send(request.method, &request.path, request.body.as_ref())
                    .await?;
            }

            log.push(action.clone());
        }

        Ok(())
    }

    /// Build the request that carries out `action`
    pub fn request_for(resource: &DesiredResource, action: &Action) -> ActionRequest {
        let identity = &resource.identity;
        let project = identity.project();

        match action {
            Action::Create { body } => ActionRequest {
                method: HttpMethod::Post,
                path: with_query(
                    identity.collection_path(),
                    &[
                        ("target", resource.placement.as_deref()),
                        ("project", project),
                    ],
                ),
                body: Some(body.clone()),
            },
            Action::Delete => ActionRequest {
                method: HttpMethod::Delete,
                path: with_query(identity.resource_path(), &[("project", project)]),
                body: None,
            },
            Action::ApplyConfigs { body } => ActionRequest {
                method: HttpMethod::Put,
                path: with_query(identity.resource_path(), &[("project", project)]),
                body: Some(body.clone()),
            },
            Action::Migrate { to, .. } => ActionRequest {
                method: HttpMethod::Post,
                path: with_query(
                    identity.resource_path(),
                    &[("target", Some(to.as_str())), ("project", project)],
                ),
                body: None,
            },
        }
    }
}
