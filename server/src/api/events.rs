//! Webhook Event Catalog Endpoint
//!
//! Lists the event types available for webhook subscriptions.

use std::collections::BTreeMap;

use axum::Json;
use serde::Serialize;

use crate::webhooks::events::EventKind;

#[derive(Serialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    kind: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
pub struct EventCatalogResponse {
    catalog: BTreeMap<&'static str, Vec<CatalogEntry>>,
    total: usize,
    defaults: Vec<&'static str>,
}

/// GET /v1/events
pub async fn list_events() -> Json<EventCatalogResponse> {
    let mut catalog: BTreeMap<&'static str, Vec<CatalogEntry>> = BTreeMap::new();
    for event in EventKind::ALL {
        catalog.entry(event.category()).or_default().push(CatalogEntry {
            kind: event.as_str(),
            description: event.describe(),
        });
    }

    Json(EventCatalogResponse {
        catalog,
        total: EventKind::ALL.len(),
        defaults: EventKind::DEFAULTS.iter().map(|e| e.as_str()).collect(),
    })
}
