use crate::entities::{alert, customer};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Seed the Prometheus gauges from current table counts at startup.
/// The auth/customer handlers and the alert service keep them in sync
/// incrementally afterwards.
pub async fn init_metrics(db: &DatabaseConnection) {
    let customer_count = customer::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("beacon_customers_total").set(customer_count as f64);

    let alert_count = alert::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("beacon_alerts_total").set(alert_count as f64);

    for status in ["ACTIVE", "RESOLVED", "FALSE_ALARM"] {
        let count = alert::Entity::find()
            .filter(alert::Column::Status.eq(status))
            .count(db)
            .await
            .unwrap_or(0);
        metrics::gauge!("beacon_alerts_by_status", "status" => status).set(count as f64);
    }

    tracing::info!(
        "Initialized metrics: Customers={}, Alerts={}",
        customer_count,
        alert_count
    );
}
