//! Expiry sweeper.
//!
//! Converts expired hide windows and completion grace windows into permanent
//! exclusion flags. Invoked from outside on an interval; safe to run
//! concurrently with itself and with admin mutations (every write is a
//! compare-and-swap, and re-excluding is a no-op).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::campaign::{update_with_retry, Campaign, CampaignError, CampaignFilter, CampaignStore};
use crate::metrics;

/// What a sweep changed on one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub hidden_cleared: bool,
    pub initial_excluded: bool,
    pub removal_excluded: bool,
}

impl SweepOutcome {
    pub fn changed(&self) -> bool {
        self.hidden_cleared || self.initial_excluded || self.removal_excluded
    }
}

/// Apply expiry rules to one campaign. `updated_at` is left alone.
pub fn sweep_campaign(campaign: &mut Campaign, now: DateTime<Utc>, grace: Duration) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    if campaign.hidden_until.is_some_and(|until| until <= now) {
        campaign.hidden_until = None;
        outcome.hidden_cleared = true;

        // Finished work does not resurface after a snooze.
        if campaign.initial_actions_complete() && !campaign.initial_actions_excluded {
            campaign.initial_actions_excluded = true;
            outcome.initial_excluded = true;
        }
        if campaign.removed_from_playlists && !campaign.removal_actions_excluded {
            campaign.removal_actions_excluded = true;
            outcome.removal_excluded = true;
        }
    }

    let grace_expired = campaign.grace_expired(grace, now);

    if grace_expired && campaign.initial_actions_complete() && !campaign.initial_actions_excluded {
        campaign.initial_actions_excluded = true;
        outcome.initial_excluded = true;
    }

    if grace_expired && campaign.removed_from_playlists && !campaign.removal_actions_excluded {
        campaign.removal_actions_excluded = true;
        outcome.removal_excluded = true;
    }

    outcome
}

/// Totals for one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub updated: usize,
    pub hidden_cleared: usize,
    pub initial_excluded: usize,
    pub removal_excluded: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: &SweepOutcome) {
        self.updated += 1;
        if outcome.hidden_cleared {
            self.hidden_cleared += 1;
            metrics::SWEEP_EXCLUSIONS
                .with_label_values(&["hidden_cleared"])
                .inc();
        }
        if outcome.initial_excluded {
            self.initial_excluded += 1;
            metrics::SWEEP_EXCLUSIONS.with_label_values(&["initial"]).inc();
        }
        if outcome.removal_excluded {
            self.removal_excluded += 1;
            metrics::SWEEP_EXCLUSIONS.with_label_values(&["removal"]).inc();
        }
    }
}

/// Sweep every campaign that is not yet fully excluded.
///
/// A failed update is logged and counted; the sweep carries on. Only a
/// failure to list campaigns aborts the run.
pub fn run_sweep(
    store: &dyn CampaignStore,
    now: DateTime<Utc>,
    grace: Duration,
    max_attempts: u32,
) -> Result<SweepReport, CampaignError> {
    let campaigns = store.list(&CampaignFilter::new().unbounded())?;
    let mut report = SweepReport {
        examined: campaigns.len(),
        ..Default::default()
    };

    for campaign in campaigns {
        let mut preview = campaign.clone();
        if !sweep_campaign(&mut preview, now, grace).changed() {
            continue;
        }

        let result = update_with_retry::<_, CampaignError, _>(store, &campaign.id, max_attempts, |c| {
            Ok(sweep_campaign(c, now, grace))
        });

        match result {
            Ok((_, outcome)) if outcome.changed() => {
                debug!(campaign_id = %campaign.id, ?outcome, "Swept campaign");
                report.record(&outcome);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "Failed to sweep campaign");
                metrics::SWEEP_FAILURES.inc();
                report.failed += 1;
            }
        }
    }

    info!(
        examined = report.examined,
        updated = report.updated,
        hidden_cleared = report.hidden_cleared,
        initial_excluded = report.initial_excluded,
        removal_excluded = report.removal_excluded,
        failed = report.failed,
        "Sweep completed"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::SqliteCampaignStore;
    use crate::testing::fixtures;

    fn grace() -> Duration {
        Duration::hours(8)
    }

    fn completed_initial(hours_ago: i64) -> Campaign {
        let mut c = fixtures::campaign("c1", "o1", "LEGENDARY");
        c.direct_streams_confirmed = true;
        c.playlists_added_confirmed = true;
        c.playlists_added_at = Some(fixtures::now() - Duration::hours(hours_ago));
        c.updated_at = fixtures::now() - Duration::hours(hours_ago);
        c
    }

    #[test]
    fn test_completed_initial_excluded_after_grace() {
        let mut c = completed_initial(9);
        let outcome = sweep_campaign(&mut c, fixtures::now(), grace());
        assert!(outcome.initial_excluded);
        assert!(c.initial_actions_excluded);
        assert!(!c.removal_actions_excluded);
    }

    #[test]
    fn test_completed_initial_kept_within_grace() {
        let mut c = completed_initial(7);
        assert!(!sweep_campaign(&mut c, fixtures::now(), grace()).changed());
        assert!(!c.initial_actions_excluded);
    }

    #[test]
    fn test_incomplete_work_never_excluded() {
        let mut c = fixtures::campaign("c1", "o1", "LEGENDARY");
        c.updated_at = fixtures::now() - Duration::hours(100);
        assert!(!sweep_campaign(&mut c, fixtures::now(), grace()).changed());
    }

    #[test]
    fn test_expired_hide_resurfaces_incomplete_work() {
        let mut c = fixtures::campaign("c1", "o1", "LEGENDARY");
        c.hidden_until = Some(fixtures::now() - Duration::minutes(1));

        let outcome = sweep_campaign(&mut c, fixtures::now(), grace());
        assert!(outcome.hidden_cleared);
        assert!(!outcome.initial_excluded);
        assert!(c.hidden_until.is_none());
    }

    #[test]
    fn test_expired_hide_on_complete_work_excludes() {
        let mut c = completed_initial(1);
        c.hidden_until = Some(fixtures::now() - Duration::minutes(1));

        let outcome = sweep_campaign(&mut c, fixtures::now(), grace());
        assert!(outcome.hidden_cleared);
        assert!(outcome.initial_excluded);
    }

    #[test]
    fn test_active_hide_left_alone() {
        let mut c = fixtures::campaign("c1", "o1", "LEGENDARY");
        c.hidden_until = Some(fixtures::now() + Duration::hours(1));
        assert!(!sweep_campaign(&mut c, fixtures::now(), grace()).changed());
        assert!(c.hidden_until.is_some());
    }

    #[test]
    fn test_removal_excluded_after_grace() {
        let mut c = completed_initial(30);
        c.initial_actions_excluded = true;
        c.removed_from_playlists = true;
        c.updated_at = fixtures::now() - Duration::hours(9);

        let outcome = sweep_campaign(&mut c, fixtures::now(), grace());
        assert!(outcome.removal_excluded);
        assert!(c.fully_excluded());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let mut c = completed_initial(9);
        sweep_campaign(&mut c, fixtures::now(), grace());
        let again = sweep_campaign(&mut c, fixtures::now(), grace());
        assert!(!again.changed());
    }

    #[test]
    fn test_run_sweep_reports_counts() {
        let store = SqliteCampaignStore::in_memory().unwrap();
        let now = fixtures::now();

        let mut done = store
            .create(&fixtures::new_campaign("o1", "t1", "LEGENDARY"), now - Duration::hours(20))
            .unwrap();
        done.direct_streams_confirmed = true;
        done.playlists_added_confirmed = true;
        done.playlists_added_at = Some(now - Duration::hours(10));
        done.updated_at = now - Duration::hours(10);
        store.update(&done).unwrap();

        let mut snoozed = store
            .create(&fixtures::new_campaign("o1", "t2", "LEGENDARY"), now - Duration::hours(20))
            .unwrap();
        snoozed.hidden_until = Some(now - Duration::hours(1));
        store.update(&snoozed).unwrap();

        store
            .create(&fixtures::new_campaign("o2", "t3", "LEGENDARY"), now - Duration::hours(20))
            .unwrap();

        let report = run_sweep(&store, now, grace(), 3).unwrap();
        assert_eq!(report.examined, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(report.initial_excluded, 1);
        assert_eq!(report.hidden_cleared, 1);
        assert_eq!(report.failed, 0);

        assert!(store.get(&done.id).unwrap().unwrap().initial_actions_excluded);
        assert!(store.get(&snoozed.id).unwrap().unwrap().hidden_until.is_none());

        let second = run_sweep(&store, now, grace(), 3).unwrap();
        assert_eq!(second.updated, 0);
    }
}
