//! Name-based label reconciliation
//!
//! Makes the mailbox's label set a superset of the configured definitions.
//! Existing labels are matched by exact, case-sensitive name and are never
//! renamed, recolored or deleted. One pass lists the remote labels once and
//! creates whatever is missing, in declaration order.

use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::client::LabelApi;
use crate::config::DuplicatePolicy;
use crate::error::{Result, SyncError};
use crate::models::{CreatedLabel, LabelDefinition, NewLabel, ReconciliationReport};

pub struct LabelReconciler {
    api: Box<dyn LabelApi>,
    duplicates: DuplicatePolicy,
}

impl LabelReconciler {
    pub fn new(api: Box<dyn LabelApi>, duplicates: DuplicatePolicy) -> Self {
        Self { api, duplicates }
    }

    pub async fn reconcile(&self, desired: &[LabelDefinition]) -> Result<ReconciliationReport> {
        reconcile(self.api.as_ref(), desired, self.duplicates).await
    }

    /// Startup pass: failures are logged and leave the process running
    pub async fn run_startup_pass(
        &self,
        desired: &[LabelDefinition],
    ) -> Option<ReconciliationReport> {
        match self.reconcile(desired).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Error creating Gmail labels: {}", e);
                None
            }
        }
    }
}

/// One fetch-compare-create pass against `api`
pub async fn reconcile(
    api: &dyn LabelApi,
    desired: &[LabelDefinition],
    duplicates: DuplicatePolicy,
) -> Result<ReconciliationReport> {
    if desired.is_empty() {
        info!("No label definitions found in configuration. Skipping label creation.");
        return Ok(ReconciliationReport::default());
    }

    info!("Checking and creating Gmail labels...");
    let plan = match duplicates {
        DuplicatePolicy::Collapse => collapse_duplicates(desired),
        DuplicatePolicy::CreateEach => desired.to_vec(),
    };

    let existing = api
        .list_labels()
        .await
        .map_err(|e| SyncError::reconciliation("listing labels", e))?;

    // Snapshot of the remote state; not updated as labels get created
    let existing_names: HashSet<String> = existing.into_iter().map(|label| label.name).collect();

    let mut report = ReconciliationReport::default();
    for definition in &plan {
        if existing_names.contains(&definition.name) {
            info!("Label '{}' already exists. Skipping creation.", definition.name);
            report.skipped.push(definition.name.clone());
            continue;
        }

        let created = api
            .create_label(&NewLabel::from_definition(definition))
            .await
            .map_err(|e| {
                SyncError::reconciliation(format!("creating label '{}'", definition.name), e)
            })?;

        info!(
            "Created new label: '{}' with ID: {}",
            created.name, created.id
        );
        report.created.push(CreatedLabel {
            name: created.name,
            id: created.id,
        });
    }

    info!(
        "Gmail label check and creation complete: {} created, {} already present",
        report.created.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// One entry per name at its first position, carrying the last declared color
pub fn collapse_duplicates(desired: &[LabelDefinition]) -> Vec<LabelDefinition> {
    let mut collapsed: Vec<LabelDefinition> = Vec::with_capacity(desired.len());

    for definition in desired {
        match collapsed.iter_mut().find(|d| d.name == definition.name) {
            Some(earlier) => {
                warn!(
                    "Label '{}' is declared more than once; using color {}",
                    definition.name, definition.color
                );
                earlier.color = definition.color.clone();
            }
            None => collapsed.push(definition.clone()),
        }
    }

    collapsed
}
