//! Aggregate view subscriptions.
//!
//! Every view is bound to the shared data source and recomputed whenever
//! its query changes. A [`Delivery::Once`] view closes itself the first
//! time it accepts a result and is never fetched again. A
//! [`Delivery::Every`] view stays open and fires whenever its output
//! changes.

use std::collections::BTreeSet;

use geo_dashboard_models::{AggregateRequest, AggregateSpec, CategoryCount, ViewId};

use crate::source::QueryUpdate;

/// How often a view delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First accepted result only, then the subscription is closed.
    Once,
    /// Every changed result, indefinitely.
    Every,
}

/// What to do with an incoming result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Hand the normalized result to the view's consumer.
    Fire(Vec<CategoryCount>),
    /// The result belongs to a superseded query.
    Stale,
    /// Same output as the last accepted result.
    Unchanged,
    /// The view is closed or was never subscribed.
    Closed,
}

#[derive(Debug, Clone)]
struct AggregateView {
    id: ViewId,
    spec: AggregateSpec,
    delivery: Delivery,
    open: bool,
    last: Option<Vec<CategoryCount>>,
    fired: u32,
}

/// The dashboard's aggregate views.
#[derive(Debug, Clone, Default)]
pub struct AggregateViews {
    views: Vec<AggregateView>,
}

impl AggregateViews {
    /// Subscribes a view. Re-subscribing an id replaces the old view.
    pub fn subscribe(&mut self, id: ViewId, spec: AggregateSpec, delivery: Delivery) {
        self.views.retain(|v| v.id != id);
        log::debug!("Subscribed {id} view ({delivery:?}, limit {})", spec.limit);
        self.views.push(AggregateView {
            id,
            spec,
            delivery,
            open: true,
            last: None,
            fired: 0,
        });
    }

    /// Requests for every open view under `update`.
    #[must_use]
    pub fn requests(&self, update: &QueryUpdate) -> Vec<AggregateRequest> {
        self.views
            .iter()
            .filter(|v| v.open)
            .map(|v| AggregateRequest {
                view: v.id,
                generation: update.generation,
                query: update.query.clone(),
                spec: v.spec.clone(),
            })
            .collect()
    }

    /// Decides whether a result for `id` computed under `generation`
    /// should fire, given the data source is at `current`.
    pub fn accept(
        &mut self,
        id: ViewId,
        generation: u64,
        current: u64,
        result: Vec<CategoryCount>,
    ) -> Acceptance {
        let Some(view) = self.views.iter_mut().find(|v| v.id == id) else {
            return Acceptance::Closed;
        };
        if !view.open {
            return Acceptance::Closed;
        }
        if generation != current {
            return Acceptance::Stale;
        }

        let result = normalize(result, view.spec.limit);
        if view.delivery == Delivery::Every && view.last.as_ref() == Some(&result) {
            return Acceptance::Unchanged;
        }

        view.fired += 1;
        view.last = Some(result.clone());
        if view.delivery == Delivery::Once {
            view.open = false;
            log::debug!("Closed one-shot {id} view");
        }
        Acceptance::Fire(result)
    }

    /// `true` if `id` is subscribed and still open.
    #[must_use]
    pub fn is_open(&self, id: ViewId) -> bool {
        self.views.iter().any(|v| v.id == id && v.open)
    }

    /// Number of results `id` has fired.
    #[must_use]
    pub fn fired(&self, id: ViewId) -> u32 {
        self.views
            .iter()
            .find(|v| v.id == id)
            .map_or(0, |v| v.fired)
    }
}

/// Enforces the result invariants: unique keys (first occurrence wins)
/// and at most `limit` entries.
#[must_use]
pub fn normalize(result: Vec<CategoryCount>, limit: u32) -> Vec<CategoryCount> {
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let received = result.len();
    let mut seen = BTreeSet::new();
    let normalized: Vec<CategoryCount> = result
        .into_iter()
        .filter(|c| seen.insert(c.key.clone()))
        .take(limit)
        .collect();

    if normalized.len() < received {
        log::warn!(
            "Dropped {} aggregate rows (duplicate keys or over limit {limit})",
            received - normalized.len()
        );
    }
    normalized
}
