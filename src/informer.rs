// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation triggers.
//!
//! Reconciliation depends on aggregate state (every master service, their secrets, the
//! certificate directory and the ConfigMap), so triggers carry no payload the
//! reconciler relies on. They only say that something may have changed:
//!
//! - [`artificial_ticks`] fires every resync period, starting immediately
//! - [`service_triggers`] fires on every add, update or delete of a master service
//! - [`config_map_triggers`] fires on every change of the Prometheus ConfigMap

use crate::key;
use futures::{future, Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Why a reconciliation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Periodic resync
    Tick,
    /// A master service was added, changed or deleted
    Service {
        /// Namespace of the service
        namespace: String,
        /// Name of the service
        name: String,
    },
    /// The Prometheus ConfigMap changed
    ConfigMap,
    /// A previous reconciliation asked to be revisited
    Requeue,
}

/// Stream yielding [`TriggerEvent::Tick`] right away and then every `period`.
pub fn artificial_ticks(period: Duration) -> impl Stream<Item = TriggerEvent> + Send {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures::stream::unfold(interval, |mut interval| async move {
        interval.tick().await;
        Some((TriggerEvent::Tick, interval))
    })
}

/// Trigger for one service watch event.
///
/// The end of the initial listing yields a single trigger; the objects of the
/// initial listing do not trigger individually.
#[must_use]
pub fn service_trigger(event: &watcher::Event<Service>) -> Option<TriggerEvent> {
    match event {
        watcher::Event::Apply(service) | watcher::Event::Delete(service) => {
            Some(TriggerEvent::Service {
                namespace: service.namespace().unwrap_or_default(),
                name: service.name_any(),
            })
        }
        watcher::Event::InitDone => Some(TriggerEvent::Tick),
        watcher::Event::Init | watcher::Event::InitApply(_) => None,
    }
}

/// Trigger for one ConfigMap watch event.
#[must_use]
pub fn config_map_trigger(event: &watcher::Event<ConfigMap>) -> Option<TriggerEvent> {
    match event {
        watcher::Event::Apply(_) | watcher::Event::Delete(_) | watcher::Event::InitDone => {
            Some(TriggerEvent::ConfigMap)
        }
        watcher::Event::Init | watcher::Event::InitApply(_) => None,
    }
}

/// Watch master services cluster-wide.
///
/// Watch errors are logged and the watch is re-established with backoff.
pub fn service_triggers(client: Client) -> impl Stream<Item = TriggerEvent> + Send {
    let api: Api<Service> = Api::all(client);
    let config = watcher::Config::default().labels(&key::master_service_selector());

    watcher(api, config)
        .default_backoff()
        .filter_map(|event| {
            future::ready(match event {
                Ok(event) => service_trigger(&event),
                Err(e) => {
                    warn!(error = %e, "Service watch failed, retrying");
                    None
                }
            })
        })
        .inspect(|trigger| debug!(trigger = ?trigger, "Service trigger"))
}

/// Watch the Prometheus ConfigMap `namespace/name`.
///
/// Watch errors are logged and the watch is re-established with backoff.
pub fn config_map_triggers(
    client: Client,
    namespace: &str,
    name: &str,
) -> impl Stream<Item = TriggerEvent> + Send {
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let config = watcher::Config::default().fields(&format!("metadata.name={name}"));

    watcher(api, config)
        .default_backoff()
        .filter_map(|event| {
            future::ready(match event {
                Ok(event) => config_map_trigger(&event),
                Err(e) => {
                    warn!(error = %e, "ConfigMap watch failed, retrying");
                    None
                }
            })
        })
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;
