//! Bulk runner tests

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wpfleet::audit::{EventCategory, Outcome, RiskLevel};
use wpfleet::bulk::{BulkAction, BulkRunner, SiteOps};
use wpfleet::codec::PhpValue;
use wpfleet::errors::FleetError;

use crate::common::{memory_auditor, site};

/// Site operations that fail for chosen (insid, action) pairs and record every call
#[derive(Default)]
struct ScriptedOps {
    failing: HashSet<(String, BulkAction)>,
    calls: Mutex<Vec<(String, BulkAction)>>,
}

impl ScriptedOps {
    fn failing(pairs: &[(&str, BulkAction)]) -> Self {
        Self {
            failing: pairs.iter().map(|(id, a)| (id.to_string(), *a)).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(String, BulkAction)> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, insid: &str, action: BulkAction) -> Result<PhpValue, FleetError> {
        self.calls.lock().unwrap().push((insid.to_string(), action));
        if self.failing.contains(&(insid.to_string(), action)) {
            Err(FleetError::Remote {
                status: 500,
                body: "Internal Server Error".to_string(),
            })
        } else {
            Ok(PhpValue::map([("done", PhpValue::Bool(true))]))
        }
    }
}

#[async_trait]
impl SiteOps for ScriptedOps {
    async fn update_plugins(&self, insid: &str) -> Result<PhpValue, FleetError> {
        self.answer(insid, BulkAction::UpdatePlugins)
    }

    async fn upgrade_core(&self, insid: &str) -> Result<PhpValue, FleetError> {
        self.answer(insid, BulkAction::UpgradeCore)
    }

    async fn create_backup(&self, insid: &str) -> Result<PhpValue, FleetError> {
        self.answer(insid, BulkAction::CreateBackup)
    }
}

fn actions(list: &[BulkAction]) -> BTreeSet<BulkAction> {
    list.iter().copied().collect()
}

#[tokio::test]
async fn test_backup_run_with_one_failure() {
    let ops = Arc::new(ScriptedOps::failing(&[("2", BulkAction::CreateBackup)]));
    let (log, auditor) = memory_auditor();
    let runner = BulkRunner::new(ops.clone(), auditor);
    let sites = vec![site("1", "a"), site("2", "b"), site("3", "c")];

    let mut progress = Vec::new();
    let result = runner
        .run(&sites, &actions(&[BulkAction::CreateBackup]), |done, total, s| {
            progress.push((done, total, s.insid.clone()));
        })
        .await
        .unwrap();

    assert_eq!(result.successes.len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.total_sites, 3);
    assert!(result.successes[0].contains("a.example.edu/"));
    assert!(result.successes[1].contains("c.example.edu/"));
    assert!(result.errors[0].contains("b.example.edu/"));
    assert!(result.errors[0].contains("500"));

    assert_eq!(
        progress,
        vec![
            (1, 3, "1".to_string()),
            (2, 3, "2".to_string()),
            (3, 3, "3".to_string())
        ]
    );

    let starts = log.by_action("BULK_START");
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].details["site_count"], 3);
    assert_eq!(starts[0].details["actions"], serde_json::json!(["create_backup"]));

    let completes = log.by_action("BULK_COMPLETE");
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].category, EventCategory::BulkOperation);
    assert_eq!(completes[0].details["total"], 3);
    assert_eq!(completes[0].details["success_count"], 2);
    assert_eq!(completes[0].details["failure_count"], 1);
    assert_eq!(completes[0].details["actions"], serde_json::json!(["create_backup"]));
    assert_eq!(completes[0].risk, RiskLevel::High);
    assert!(log.by_action("HIGH_FAILURE_RATE").is_empty());

    // Start comes before completion
    let events = log.events();
    assert_eq!(events.first().map(|e| e.action.as_str()), Some("BULK_START"));
    assert_eq!(events.last().map(|e| e.action.as_str()), Some("BULK_COMPLETE"));
}

#[tokio::test]
async fn test_one_line_per_site_and_action_in_fixed_order() {
    let ops = Arc::new(ScriptedOps::failing(&[
        ("1", BulkAction::UpgradeCore),
        ("2", BulkAction::UpdatePlugins),
    ]));
    let (_, auditor) = memory_auditor();
    let runner = BulkRunner::new(ops.clone(), auditor);
    let sites = vec![site("1", "a"), site("2", "b")];
    let selected = actions(&[
        BulkAction::CreateBackup,
        BulkAction::UpgradeCore,
        BulkAction::UpdatePlugins,
    ]);

    let result = runner.run(&sites, &selected, |_, _, _| {}).await.unwrap();
    assert_eq!(result.total(), sites.len() * selected.len());
    assert_eq!(result.errors.len(), 2);

    let calls = ops.calls();
    let expected: Vec<(String, BulkAction)> = ["1", "2"]
        .iter()
        .flat_map(|id| BulkAction::ALL.iter().map(move |a| (id.to_string(), *a)))
        .collect();
    assert_eq!(calls, expected);
}

#[tokio::test]
async fn test_high_failure_rate_alert() {
    let ops = Arc::new(ScriptedOps::failing(&[
        ("1", BulkAction::UpdatePlugins),
        ("2", BulkAction::UpdatePlugins),
    ]));
    let (log, auditor) = memory_auditor();
    let runner = BulkRunner::new(ops, auditor);
    let sites = vec![site("1", "a"), site("2", "b"), site("3", "c")];

    let result = runner
        .run(&sites, &actions(&[BulkAction::UpdatePlugins]), |_, _, _| {})
        .await
        .unwrap();
    assert!(result.high_failure_rate());

    let alerts = log.by_category(EventCategory::Security);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].action, "HIGH_FAILURE_RATE");
    assert_eq!(alerts[0].risk, RiskLevel::High);
    assert_eq!(log.by_action("BULK_COMPLETE")[0].outcome, Outcome::Failure);
}

#[tokio::test]
async fn test_exactly_half_failing_is_not_alerted() {
    let ops = Arc::new(ScriptedOps::failing(&[("1", BulkAction::CreateBackup)]));
    let (log, auditor) = memory_auditor();
    let runner = BulkRunner::new(ops, auditor);
    let sites = vec![site("1", "a"), site("2", "b")];

    runner
        .run(&sites, &actions(&[BulkAction::CreateBackup]), |_, _, _| {})
        .await
        .unwrap();
    assert!(log.by_action("HIGH_FAILURE_RATE").is_empty());
}

#[tokio::test]
async fn test_empty_inputs_do_nothing() {
    let ops = Arc::new(ScriptedOps::default());
    let (log, auditor) = memory_auditor();
    let runner = BulkRunner::new(ops.clone(), auditor);

    let err = runner
        .run(&[], &actions(&[BulkAction::CreateBackup]), |_, _, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::ValidationError(_)));

    let err = runner
        .run(&[site("1", "a")], &BTreeSet::new(), |_, _, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::ValidationError(_)));

    assert!(ops.calls().is_empty());
    assert!(log.is_empty());
}
