//! Reconciler - runs the pipeline for one resource
//!
//! authenticate → fetch → decide → execute → report, strictly in sequence.

use super::desired::DesiredResource;
use super::diff::DiffEngine;
use super::executor::{ActionExecutor, ActionLog};
use super::observed::{fetch, ObservedState};
use super::report::{ReconcileFailure, ReconcileReport, Reporter};
use crate::domain::ports::LxdApiRef;
use crate::error::Error;
use serde_json::Value;
use tracing::{info, instrument};

/// Converges LXD storage resources to their desired state
pub struct Reconciler {
    api: LxdApiRef,
    trust_password: Option<String>,
    dry_run: bool,
    include_logs: bool,
}

impl Reconciler {
    pub fn new(api: LxdApiRef) -> Self {
        Self {
            api,
            trust_password: None,
            dry_run: false,
            include_logs: false,
        }
    }

    /// Authenticate with this trust password before the first request
    pub fn with_trust_password(mut self, trust_password: Option<String>) -> Self {
        self.trust_password = trust_password;
        self
    }

    /// Report actions without performing them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Copy the client's request log into reports
    pub fn with_logs(mut self, include_logs: bool) -> Self {
        self.include_logs = include_logs;
        self
    }

    /// Reconcile one resource
    #[instrument(skip_all, fields(resource = %resource.identity, state = %resource.state))]
    pub async fn reconcile(
        &self,
        resource: &DesiredResource,
    ) -> Result<ReconcileReport, ReconcileFailure> {
        let mut log = ActionLog::new();
        let desired_after = resource.config.to_value();

        if let Some(password) = &self.trust_password {
            if let Err(error) = self.api.authenticate(password).await {
                return Err(self.failure(error, None, &log, desired_after));
            }
        }

        let observed = match fetch(self.api.as_ref(), &resource.identity).await {
            Ok(observed) => observed,
            Err(error) => return Err(self.failure(error, None, &log, desired_after)),
        };

        let plan = match DiffEngine::decide(resource, &observed) {
            Ok(plan) => plan,
            Err(error) => {
                return Err(self.failure(error, Some(&observed), &log, desired_after))
            }
        };

        let executor = ActionExecutor::new(self.api.as_ref(), self.dry_run);
        if let Err(error) = executor.execute(resource, &plan.actions, &mut log).await {
            return Err(self.failure(error, Some(&observed), &log, plan.after));
        }

        info!(
            "Reconciled {} {}: actions={:?} check_mode={}",
            resource.identity.kind_label(),
            resource.identity,
            log.tags(),
            self.dry_run
        );

        Ok(Reporter::build(
            Some(&observed),
            &log,
            plan.after,
            self.request_logs(),
        ))
    }

    fn failure(
        &self,
        error: Error,
        observed: Option<&ObservedState>,
        log: &ActionLog,
        after: Value,
    ) -> ReconcileFailure {
        tracing::error!(
            "Reconciliation failed after {} action(s): {}",
            log.len(),
            error
        );
        ReconcileFailure {
            report: Reporter::build(observed, log, after, self.request_logs()),
            error,
        }
    }

    fn request_logs(&self) -> Option<Vec<Value>> {
        self.include_logs.then(|| self.api.logs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ApiResponse, HttpMethod};
    use crate::reconcile::desired::{DesiredConfig, DesiredState};
    use crate::reconcile::observed::OldState;
    use crate::resource::identity::{ContentType, ResourceIdentity, VolumeType};
    use crate::testing::FakeLxdApi;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const POOL_PATH: &str = "/1.0/storage-pools/p1";
    const VOLUME_PATH: &str = "/1.0/storage-pools/d/volumes/custom/v1";

    fn pool(desired: DesiredConfig) -> DesiredResource {
        DesiredResource::new(ResourceIdentity::pool("p1", None), desired)
    }

    fn volume(desired: DesiredConfig) -> DesiredResource {
        DesiredResource::new(
            ResourceIdentity::volume("v1", "d", None, VolumeType::Custom, ContentType::Filesystem),
            desired,
        )
    }

    fn size(value: &str) -> Option<BTreeMap<String, String>> {
        Some(BTreeMap::from([("size".to_string(), value.to_string())]))
    }

    async fn run(
        api: FakeLxdApi,
        resource: &DesiredResource,
        dry_run: bool,
    ) -> (Arc<FakeLxdApi>, Result<ReconcileReport, ReconcileFailure>) {
        let api = Arc::new(api);
        let result = Reconciler::new(api.clone())
            .with_dry_run(dry_run)
            .reconcile(resource)
            .await;
        (api, result)
    }

    #[tokio::test]
    async fn test_create_pool_scenario() {
        let api = FakeLxdApi::new()
            .on_get(POOL_PATH, ApiResponse::not_found())
            .on(HttpMethod::Post, "/1.0/storage-pools", ApiResponse::sync(json!({})));
        let resource = pool(DesiredConfig::builder().driver(Some("dir".into())).build());

        let (api, result) = run(api, &resource, false).await;
        let report = result.unwrap();

        assert!(report.changed);
        assert_eq!(report.old_state, Some(OldState::Absent));
        assert_eq!(report.actions, vec!["create"]);
        assert_eq!(
            api.write_calls()[0].body,
            Some(json!({"name": "p1", "driver": "dir"}))
        );
    }

    #[tokio::test]
    async fn test_create_pool_without_driver_scenario() {
        let api = FakeLxdApi::new().on_get(POOL_PATH, ApiResponse::not_found());

        let (api, result) = run(api, &pool(DesiredConfig::default()), false).await;
        let failure = result.unwrap_err();

        assert_matches!(failure.error, Error::DriverRequired { .. });
        assert!(failure.report.actions.is_empty());
        assert!(!failure.report.changed);
        assert!(api.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_volume_scenario() {
        let api = FakeLxdApi::new()
            .on_get(VOLUME_PATH, ApiResponse::sync(json!({"name": "v1", "location": "node1"})))
            .on(
                HttpMethod::Post,
                "/1.0/storage-pools/d/volumes/custom/v1?target=node2",
                ApiResponse::sync(json!({})),
            );
        let resource = volume(DesiredConfig::default())
            .with_placement(Some("node2".into()))
            .with_allow_migrate(true);

        let (api, result) = run(api, &resource, false).await;
        let report = result.unwrap();

        assert!(report.changed);
        assert_eq!(report.actions, vec!["migrate"]);
        assert_eq!(api.write_calls()[0].body, None);
    }

    #[tokio::test]
    async fn test_migration_guard_makes_no_writes() {
        let api = FakeLxdApi::new()
            .on_get(VOLUME_PATH, ApiResponse::sync(json!({"location": "node01"})));
        let resource = volume(DesiredConfig::builder().config(size("5GiB")).build())
            .with_placement(Some("node02".into()));

        let (api, result) = run(api, &resource, false).await;
        let failure = result.unwrap_err();

        let msg = failure.to_string();
        assert!(msg.contains("node01") && msg.contains("node02"));
        assert_eq!(failure.report.old_state, Some(OldState::Present));
        assert!(api.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_volume_no_change() {
        let api = FakeLxdApi::new().on_get(
            VOLUME_PATH,
            ApiResponse::sync(json!({
                "name": "v1",
                "type": "custom",
                "config": {"size": "10GiB"},
                "description": "Test volume"
            })),
        );
        let resource = volume(
            DesiredConfig::builder()
                .config(size("10GiB"))
                .description(Some("Test volume".into()))
                .build(),
        );

        let (_, result) = run(api, &resource, false).await;
        let report = result.unwrap();

        assert!(!report.changed);
        assert_eq!(report.old_state, Some(OldState::Present));
        assert!(report.actions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_noop_delete() {
        let api = FakeLxdApi::new()
            .on_get(POOL_PATH, ApiResponse::sync(json!({"name": "p1"})))
            .on(HttpMethod::Delete, POOL_PATH, ApiResponse::sync(json!({})));
        let resource = pool(DesiredConfig::default()).with_state(DesiredState::Absent);

        let (_, result) = run(api, &resource, false).await;
        assert_eq!(result.unwrap().actions, vec!["delete"]);

        let api = FakeLxdApi::new().on_get(POOL_PATH, ApiResponse::not_found());
        let (_, result) = run(api, &resource, false).await;
        let report = result.unwrap();
        assert!(!report.changed);
        assert_eq!(report.old_state, Some(OldState::Absent));
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run() {
        let observed = ApiResponse::sync(json!({
            "location": "node1",
            "config": {"size": "10GiB"}
        }));
        let resource = volume(DesiredConfig::builder().config(size("20GiB")).build())
            .with_placement(Some("node2".into()))
            .with_allow_migrate(true);

        let real_api = FakeLxdApi::new()
            .on_get(VOLUME_PATH, observed.clone())
            .on(
                HttpMethod::Post,
                "/1.0/storage-pools/d/volumes/custom/v1?target=node2",
                ApiResponse::sync(json!({})),
            )
            .on(HttpMethod::Put, VOLUME_PATH, ApiResponse::sync(json!({})));
        let (real_api, real) = run(real_api, &resource, false).await;

        let check_api = FakeLxdApi::new().on_get(VOLUME_PATH, observed);
        let (check_api, check) = run(check_api, &resource, true).await;

        let real = real.unwrap();
        let check = check.unwrap();
        assert_eq!(real.actions, vec!["migrate", "apply_configs"]);
        assert_eq!(real, check);
        assert_eq!(real_api.write_calls().len(), 2);
        assert!(check_api.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_then_converged() {
        let resource = pool(
            DesiredConfig::builder()
                .driver(Some("zfs".into()))
                .config(size("20GiB"))
                .build(),
        );
        let api = FakeLxdApi::new()
            .on_get(
                POOL_PATH,
                ApiResponse::sync(json!({"driver": "dir", "config": {"size": "10GiB", "source": "/x"}})),
            )
            .on(HttpMethod::Put, POOL_PATH, ApiResponse::sync(json!({})));

        let (api, result) = run(api, &resource, false).await;
        assert_eq!(result.unwrap().actions, vec!["apply_configs"]);
        let body = api.write_calls()[0].body.clone().unwrap();
        assert_eq!(
            body,
            json!({"driver": "dir", "config": {"size": "20GiB", "source": "/x"}})
        );

        let converged = FakeLxdApi::new().on_get(POOL_PATH, ApiResponse::sync(body));
        let (converged, result) = run(converged, &resource, false).await;
        assert!(result.unwrap().actions.is_empty());
        assert!(converged.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_and_update_volume_then_converged() {
        let resource = volume(DesiredConfig::builder().config(size("20GiB")).build())
            .with_placement(Some("node2".into()))
            .with_allow_migrate(true);
        let api = FakeLxdApi::new()
            .on_get(
                VOLUME_PATH,
                ApiResponse::sync(json!({
                    "name": "v1",
                    "location": "node1",
                    "config": {"size": "10GiB"},
                    "description": "scratch"
                })),
            )
            .on(
                HttpMethod::Post,
                "/1.0/storage-pools/d/volumes/custom/v1?target=node2",
                ApiResponse::sync(json!({})),
            )
            .on(HttpMethod::Put, VOLUME_PATH, ApiResponse::sync(json!({})));

        let (api, result) = run(api, &resource, false).await;
        assert_eq!(result.unwrap().actions, vec!["migrate", "apply_configs"]);
        let body = api.write_calls()[1].body.clone().unwrap();
        assert_eq!(
            body,
            json!({"config": {"size": "20GiB"}, "description": "scratch"})
        );

        let mut observed = body;
        observed["location"] = json!("node2");
        let converged = FakeLxdApi::new().on_get(VOLUME_PATH, ApiResponse::sync(observed));
        let (converged, result) = run(converged, &resource, false).await;
        assert!(result.unwrap().actions.is_empty());
        assert!(converged.write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_report() {
        let api = FakeLxdApi::new().on_get(POOL_PATH, ApiResponse::error(403, "not authorized"));

        let (_, result) = run(api, &pool(DesiredConfig::default()), false).await;
        let failure = result.unwrap_err();

        assert_eq!(failure.to_string(), "not authorized");
        assert_eq!(failure.report.old_state, None);
        assert!(!failure.report.changed);
    }

    #[tokio::test]
    async fn test_authenticates_first_and_reports_logs() {
        let api = Arc::new(
            FakeLxdApi::new().on_get(
                "/1.0/storage-pools/p1?project=myproject",
                ApiResponse::not_found(),
            ),
        );
        let resource = DesiredResource::new(
            ResourceIdentity::pool("p1", Some("myproject".into())),
            DesiredConfig::builder().driver(Some("dir".into())).build(),
        );

        let report = Reconciler::new(api.clone())
            .with_trust_password(Some("s3cret".into()))
            .with_dry_run(true)
            .with_logs(true)
            .reconcile(&resource)
            .await
            .unwrap();

        assert_eq!(api.authenticated_with().as_deref(), Some("s3cret"));
        assert_eq!(report.actions, vec!["create"]);
        assert_eq!(report.logs.map(|l| l.len()), Some(1));
    }
}
