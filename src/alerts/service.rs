//! Alert lifecycle orchestration: CRUD with ownership enforcement, plus
//! proximity fan-out to tracked users on creation.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::alerts::error::AlertError;
use crate::alerts::model::{Alert, AlertDraft, AlertStatus};
use crate::alerts::store::AlertStore;
use crate::geo::{GeoPoint, NOTIFY_RADIUS_KM};
use crate::live::Notifier;
use crate::tracking::LocationRegistry;

pub struct AlertService {
    store: Arc<dyn AlertStore>,
    registry: Arc<LocationRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn AlertStore>,
        registry: Arc<LocationRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
        }
    }

    /// Create an alert owned by `owner_id`. Status is forced to ACTIVE no
    /// matter what the client sent. Persistence happens first; the push
    /// fan-out is best-effort and cannot fail the call.
    pub async fn create(&self, owner_id: i32, draft: AlertDraft) -> Result<Alert, AlertError> {
        let location = GeoPoint::new(draft.latitude, draft.longitude)?;
        let now = chrono::Utc::now().naive_utc();
        let alert = Alert {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            alert_type: draft.alert_type,
            severity: draft.severity,
            status: AlertStatus::Active,
            location,
            owner_id,
            created_at: now,
            updated_at: now,
        };

        let saved = self.store.save(alert).await?;
        self.notify_nearby(&saved);
        metrics::counter!("beacon_alerts_created_total").increment(1);
        metrics::gauge!("beacon_alerts_total").increment(1.0);
        metrics::gauge!("beacon_alerts_by_status", "status" => saved.status.as_str())
            .increment(1.0);
        Ok(saved)
    }

    fn notify_nearby(&self, alert: &Alert) {
        let nearby = self.registry.nearby(alert.location, NOTIFY_RADIUS_KM);
        for identity in &nearby {
            self.notifier.deliver(identity, alert);
        }
        info!(
            "alert {} fanned out to {} tracked users",
            alert.id,
            nearby.len()
        );
    }

    /// Full update of the mutable alert fields. Only the owner may call
    /// this; status is out of scope here (see [`update_status`]).
    ///
    /// [`update_status`]: AlertService::update_status
    pub async fn update(
        &self,
        id: Uuid,
        owner_id: i32,
        patch: AlertDraft,
    ) -> Result<Alert, AlertError> {
        let mut alert = self.get_owned(id, owner_id).await?;

        alert.title = patch.title;
        alert.description = patch.description;
        alert.alert_type = patch.alert_type;
        alert.severity = patch.severity;
        alert.location = GeoPoint::new(patch.latitude, patch.longitude)?;
        alert.updated_at = chrono::Utc::now().naive_utc();

        self.store.update(alert).await
    }

    /// Narrow mutation: status and updated-timestamp only.
    pub async fn update_status(
        &self,
        id: Uuid,
        owner_id: i32,
        status: AlertStatus,
    ) -> Result<Alert, AlertError> {
        let mut alert = self.get_owned(id, owner_id).await?;
        let previous = alert.status;
        alert.status = status;
        alert.updated_at = chrono::Utc::now().naive_utc();
        let updated = self.store.update(alert).await?;
        if previous != updated.status {
            metrics::gauge!("beacon_alerts_by_status", "status" => previous.as_str())
                .decrement(1.0);
            metrics::gauge!("beacon_alerts_by_status", "status" => updated.status.as_str())
                .increment(1.0);
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid, owner_id: i32) -> Result<(), AlertError> {
        let alert = self.get_owned(id, owner_id).await?;
        self.store.delete(alert.id).await?;
        metrics::gauge!("beacon_alerts_total").decrement(1.0);
        metrics::gauge!("beacon_alerts_by_status", "status" => alert.status.as_str())
            .decrement(1.0);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Alert, AlertError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AlertError::NotFound("alert"))
    }

    pub async fn list_all(&self) -> Result<Vec<Alert>, AlertError> {
        self.store.find_all().await
    }

    pub async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<Alert>, AlertError> {
        self.store.find_by_owner(owner_id).await
    }

    pub async fn list_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Alert>, AlertError> {
        let center = GeoPoint::new(latitude, longitude)?;
        self.store.find_within_radius(center, radius_km).await
    }

    async fn get_owned(&self, id: Uuid, owner_id: i32) -> Result<Alert, AlertError> {
        let alert = self.get(id).await?;
        if alert.owner_id != owner_id {
            return Err(AlertError::NotAuthorized);
        }
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::model::{AlertType, Severity};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryStore {
        alerts: Mutex<HashMap<Uuid, Alert>>,
    }

    #[async_trait]
    impl AlertStore for InMemoryStore {
        async fn save(&self, alert: Alert) -> Result<Alert, AlertError> {
            self.alerts.lock().unwrap().insert(alert.id, alert.clone());
            Ok(alert)
        }

        async fn update(&self, alert: Alert) -> Result<Alert, AlertError> {
            self.alerts.lock().unwrap().insert(alert.id, alert.clone());
            Ok(alert)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>, AlertError> {
            Ok(self.alerts.lock().unwrap().get(&id).cloned())
        }

        async fn delete(&self, id: Uuid) -> Result<(), AlertError> {
            self.alerts.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<Alert>, AlertError> {
            Ok(self.alerts.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_owner(&self, owner_id: i32) -> Result<Vec<Alert>, AlertError> {
            let mut owned: Vec<Alert> = self
                .alerts
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.owner_id == owner_id)
                .cloned()
                .collect();
            owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(owned)
        }

        async fn find_within_radius(
            &self,
            center: GeoPoint,
            radius_km: f64,
        ) -> Result<Vec<Alert>, AlertError> {
            let mut hits: Vec<Alert> = self
                .alerts
                .lock()
                .unwrap()
                .values()
                .filter(|a| {
                    a.status == AlertStatus::Active
                        && crate::geo::distance_km(a.location, center) <= radius_km
                })
                .cloned()
                .collect();
            hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(hits)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        deliveries: Mutex<Vec<(String, Uuid)>>,
    }

    impl Notifier for RecordingNotifier {
        fn deliver(&self, identity: &str, alert: &Alert) {
            self.deliveries
                .lock()
                .unwrap()
                .push((identity.to_string(), alert.id));
        }
    }

    fn draft() -> AlertDraft {
        AlertDraft {
            title: "Break-in reported".to_string(),
            description: "Rear window forced on 5th Ave".to_string(),
            alert_type: AlertType::Crime,
            severity: Severity::High,
            latitude: 40.7128,
            longitude: -74.0060,
        }
    }

    fn service() -> (
        AlertService,
        Arc<InMemoryStore>,
        Arc<LocationRegistry>,
        Arc<RecordingNotifier>,
    ) {
        let store = Arc::new(InMemoryStore::default());
        let registry = Arc::new(LocationRegistry::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = AlertService::new(store.clone(), registry.clone(), notifier.clone());
        (service, store, registry, notifier)
    }

    #[tokio::test]
    async fn create_persists_active_and_notifies_each_nearby_user_once() {
        let (service, _, registry, notifier) = service();
        registry.update("near@example.com", GeoPoint::new(40.72, -74.00).unwrap());
        registry.update("far@example.com", GeoPoint::new(34.0522, -118.2437).unwrap());

        let alert = service.create(1, draft()).await.unwrap();

        assert_eq!(alert.status, AlertStatus::Active);
        let deliveries = notifier.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0], ("near@example.com".to_string(), alert.id));
    }

    #[tokio::test]
    async fn create_with_no_tracked_users_delivers_nothing() {
        let (service, store, _, notifier) = service();

        let alert = service.create(1, draft()).await.unwrap();

        assert!(notifier.deliveries.lock().unwrap().is_empty());
        assert!(store.find_by_id(alert.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_by_non_owner_fails_and_leaves_alert_unchanged() {
        let (service, store, _, _) = service();
        let alert = service.create(1, draft()).await.unwrap();

        let mut patch = draft();
        patch.title = "hijacked".to_string();
        let result = service.update(alert.id, 2, patch).await;

        assert!(matches!(result, Err(AlertError::NotAuthorized)));
        let stored = store.find_by_id(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Break-in reported");
        assert_eq!(stored.updated_at, alert.updated_at);
    }

    #[tokio::test]
    async fn update_by_owner_overwrites_fields_but_not_status() {
        let (service, _, _, _) = service();
        let alert = service.create(1, draft()).await.unwrap();
        service
            .update_status(alert.id, 1, AlertStatus::Resolved)
            .await
            .unwrap();

        let mut patch = draft();
        patch.title = "Break-in (updated)".to_string();
        patch.severity = Severity::Low;
        let updated = service.update(alert.id, 1, patch).await.unwrap();

        assert_eq!(updated.title, "Break-in (updated)");
        assert_eq!(updated.severity, Severity::Low);
        assert_eq!(updated.status, AlertStatus::Resolved);
    }

    #[tokio::test]
    async fn update_status_touches_only_status_and_timestamp() {
        let (service, _, _, _) = service();
        let alert = service.create(1, draft()).await.unwrap();

        let updated = service
            .update_status(alert.id, 1, AlertStatus::FalseAlarm)
            .await
            .unwrap();

        assert_eq!(updated.status, AlertStatus::FalseAlarm);
        assert_eq!(updated.title, alert.title);
        assert_eq!(updated.description, alert.description);
        assert_eq!(updated.location, alert.location);
        assert!(updated.updated_at >= alert.updated_at);
    }

    #[tokio::test]
    async fn status_transitions_are_unrestricted() {
        let (service, _, _, _) = service();
        let alert = service.create(1, draft()).await.unwrap();

        for status in [
            AlertStatus::Resolved,
            AlertStatus::FalseAlarm,
            AlertStatus::Active,
            AlertStatus::FalseAlarm,
        ] {
            let updated = service.update_status(alert.id, 1, status).await.unwrap();
            assert_eq!(updated.status, status);
        }
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let (service, store, _, _) = service();
        let alert = service.create(1, draft()).await.unwrap();

        assert!(matches!(
            service.delete(alert.id, 2).await,
            Err(AlertError::NotAuthorized)
        ));
        service.delete(alert.id, 1).await.unwrap();
        assert!(store.find_by_id(alert.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn operations_on_missing_alerts_report_not_found() {
        let (service, _, _, _) = service();
        let missing = Uuid::new_v4();

        assert!(matches!(
            service.get(missing).await,
            Err(AlertError::NotFound(_))
        ));
        assert!(matches!(
            service.update(missing, 1, draft()).await,
            Err(AlertError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(missing, 1).await,
            Err(AlertError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_malformed_coordinates() {
        let (service, store, _, _) = service();
        let mut bad = draft();
        bad.latitude = 123.0;

        assert!(matches!(
            service.create(1, bad).await,
            Err(AlertError::InvalidInput(_))
        ));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[derive(Default)]
    struct GaugeRecorder {
        values: Arc<Mutex<HashMap<String, f64>>>,
    }

    struct TestGauge {
        key: String,
        values: Arc<Mutex<HashMap<String, f64>>>,
    }

    impl metrics::GaugeFn for TestGauge {
        fn increment(&self, value: f64) {
            *self
                .values
                .lock()
                .unwrap()
                .entry(self.key.clone())
                .or_insert(0.0) += value;
        }

        fn decrement(&self, value: f64) {
            *self
                .values
                .lock()
                .unwrap()
                .entry(self.key.clone())
                .or_insert(0.0) -= value;
        }

        fn set(&self, value: f64) {
            self.values.lock().unwrap().insert(self.key.clone(), value);
        }
    }

    impl metrics::Recorder for GaugeRecorder {
        fn describe_counter(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn describe_gauge(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn describe_histogram(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn register_counter(
            &self,
            _: &metrics::Key,
            _: &metrics::Metadata<'_>,
        ) -> metrics::Counter {
            metrics::Counter::noop()
        }

        fn register_gauge(&self, key: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
            let mut name = key.name().to_string();
            for label in key.labels() {
                name.push_str(&format!("{{{}={}}}", label.key(), label.value()));
            }
            metrics::Gauge::from_arc(Arc::new(TestGauge {
                key: name,
                values: self.values.clone(),
            }))
        }

        fn register_histogram(
            &self,
            _: &metrics::Key,
            _: &metrics::Metadata<'_>,
        ) -> metrics::Histogram {
            metrics::Histogram::noop()
        }
    }

    #[test]
    fn alert_mutations_keep_the_gauges_in_sync() {
        let recorder = GaugeRecorder::default();
        let values = recorder.values.clone();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let (service, _, _, _) = service();
                let alert = service.create(1, draft()).await.unwrap();
                service
                    .update_status(alert.id, 1, AlertStatus::Resolved)
                    .await
                    .unwrap();
                let second = service.create(1, draft()).await.unwrap();
                service.delete(second.id, 1).await.unwrap();
            });
        });

        let values = values.lock().unwrap();
        assert_eq!(values["beacon_alerts_total"], 1.0);
        assert_eq!(values["beacon_alerts_by_status{status=ACTIVE}"], 0.0);
        assert_eq!(values["beacon_alerts_by_status{status=RESOLVED}"], 1.0);
    }

    #[tokio::test]
    async fn list_nearby_filters_resolved_alerts_and_distant_ones() {
        let (service, _, _, _) = service();
        let near = service.create(1, draft()).await.unwrap();
        let mut la_draft = draft();
        la_draft.latitude = 34.0522;
        la_draft.longitude = -118.2437;
        service.create(1, la_draft).await.unwrap();
        let resolved = service.create(2, draft()).await.unwrap();
        service
            .update_status(resolved.id, 2, AlertStatus::Resolved)
            .await
            .unwrap();

        let hits = service.list_nearby(40.7128, -74.0060, 10.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, near.id);
    }
}
