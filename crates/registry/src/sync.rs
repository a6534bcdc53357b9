//! Reconciliation planner.
//!
//! Computes, without touching storage, the writes needed to bring one
//! service's registrations in line with a scanned manifest. Registrations the
//! manifest no longer mentions are reported as stale and left in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_core::DomainResult;

use crate::endpoint::{AccessRule, EndpointKey, EndpointPermission, HttpMethod, validate_service_name};
use crate::manifest::ScannedEndpoint;

/// Counts reported by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub stale: usize,
    /// Number of scanned endpoints in the manifest, duplicates included.
    pub total: usize,
    pub stale_keys: Vec<EndpointKey>,
}

/// Writes to apply as one unit, plus the result they produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub service_name: String,
    pub creates: Vec<EndpointPermission>,
    /// New snapshots of existing registrations, at the version they were read.
    pub updates: Vec<EndpointPermission>,
    pub result: SyncResult,
}

impl SyncPlan {
    pub fn has_writes(&self) -> bool {
        !self.creates.is_empty() || !self.updates.is_empty()
    }
}

type RouteKey = (String, HttpMethod);

/// Every manifest entry for one route, in manifest order.
struct RouteEntries {
    key: EndpointKey,
    rules: Vec<AccessRule>,
}

impl RouteEntries {
    /// The last entry wins.
    fn effective(&self) -> &AccessRule {
        &self.rules[self.rules.len() - 1]
    }

    /// Repeats after the first entry that change the rule seen so far.
    fn changing_repeats(&self) -> usize {
        self.rules.windows(2).filter(|w| w[0] != w[1]).count()
    }
}

/// Plan the reconciliation of `service_name` against `scanned`.
///
/// `existing` may contain deleted registrations or rows of other services;
/// both are ignored. Entries repeating a `(path, method)` collapse into one
/// registration carrying the last entry's rule. The first entry of a route
/// counts as created, updated or unchanged against the stored row. A repeat
/// counts as updated when the route is written and it changes the rule seen
/// so far, and as unchanged otherwise, so re-running a manifest that was
/// already applied reports no writes.
///
/// Any invalid manifest entry fails the whole plan.
pub fn plan_sync(
    service_name: &str,
    existing: Vec<EndpointPermission>,
    scanned: &[ScannedEndpoint],
    now: DateTime<Utc>,
) -> DomainResult<SyncPlan> {
    validate_service_name(service_name)?;

    let mut index: BTreeMap<RouteKey, EndpointPermission> = existing
        .into_iter()
        .filter(|ep| !ep.is_deleted() && ep.service_name() == service_name)
        .map(|ep| ((ep.http_path().to_string(), ep.http_method()), ep))
        .collect();

    let mut routes: BTreeMap<RouteKey, RouteEntries> = BTreeMap::new();
    for entry in scanned {
        let key = entry.key(service_name)?;
        let rule = entry.rule();
        rule.validate()?;
        routes
            .entry((key.http_path.clone(), key.http_method))
            .or_insert_with(|| RouteEntries {
                key,
                rules: Vec::new(),
            })
            .rules
            .push(rule);
    }

    let mut result = SyncResult {
        total: scanned.len(),
        ..SyncResult::default()
    };
    let mut creates = Vec::new();
    let mut updates = Vec::new();

    for (route, entries) in routes {
        let repeats = entries.rules.len() - 1;
        let effective = entries.effective().clone();

        let written = match index.remove(&route) {
            Some(current) if current.rule() == &effective => {
                result.unchanged += 1;
                false
            }
            Some(current) => {
                updates.push(current.with_rule(effective, now)?);
                result.updated += 1;
                true
            }
            None => {
                creates.push(EndpointPermission::create(entries.key.clone(), effective, now)?);
                result.created += 1;
                true
            }
        };

        let changing = if written { entries.changing_repeats() } else { 0 };
        result.updated += changing;
        result.unchanged += repeats - changing;
    }

    result.stale_keys = index.into_values().map(|ep| ep.key().clone()).collect();
    result.stale = result.stale_keys.len();

    debug!(
        service = service_name,
        created = result.created,
        updated = result.updated,
        unchanged = result.unchanged,
        stale = result.stale,
        "planned endpoint sync"
    );

    Ok(SyncPlan {
        service_name: service_name.to_string(),
        creates,
        updates,
        result,
    })
}
