//! Persistence contract for alerts, plus the Postgres implementation.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use uuid::Uuid;

use crate::alerts::error::AlertError;
use crate::alerts::model::{Alert, AlertStatus, AlertType, Severity};
use crate::entities::alert;
use crate::geo::GeoPoint;

/// Narrow persistence contract consumed by [`AlertService`].
///
/// [`AlertService`]: crate::alerts::AlertService
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert a new alert row.
    async fn save(&self, alert: Alert) -> Result<Alert, AlertError>;
    /// Overwrite every mutable column of an existing alert.
    async fn update(&self, alert: Alert) -> Result<Alert, AlertError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>, AlertError>;
    async fn delete(&self, id: Uuid) -> Result<(), AlertError>;
    async fn find_all(&self) -> Result<Vec<Alert>, AlertError>;
    async fn find_by_owner(&self, owner_id: i32) -> Result<Vec<Alert>, AlertError>;
    /// ACTIVE alerts within `radius_km` of `center`, newest first, using a
    /// native great-circle predicate.
    async fn find_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Alert>, AlertError>;
}

pub struct SeaOrmAlertStore {
    db: DatabaseConnection,
}

impl SeaOrmAlertStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: alert::Model) -> Result<Alert, AlertError> {
    // A row with an enum string we cannot parse is corrupt storage, not bad
    // caller input.
    let alert_type = AlertType::parse(&model.alert_type)
        .map_err(|e| AlertError::Storage(e.to_string()))?;
    let severity =
        Severity::parse(&model.severity).map_err(|e| AlertError::Storage(e.to_string()))?;
    let status =
        AlertStatus::parse(&model.status).map_err(|e| AlertError::Storage(e.to_string()))?;
    let location = GeoPoint::new(model.latitude, model.longitude)
        .map_err(|e| AlertError::Storage(e.to_string()))?;

    Ok(Alert {
        id: model.id,
        title: model.title,
        description: model.description,
        alert_type,
        severity,
        status,
        location,
        owner_id: model.user_id,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn to_active_model(alert: &Alert) -> alert::ActiveModel {
    alert::ActiveModel {
        id: Set(alert.id),
        title: Set(alert.title.clone()),
        description: Set(alert.description.clone()),
        alert_type: Set(alert.alert_type.as_str().to_string()),
        severity: Set(alert.severity.as_str().to_string()),
        status: Set(alert.status.as_str().to_string()),
        latitude: Set(alert.location.latitude),
        longitude: Set(alert.location.longitude),
        user_id: Set(alert.owner_id),
        created_at: Set(alert.created_at),
        updated_at: Set(alert.updated_at),
    }
}

#[async_trait]
impl AlertStore for SeaOrmAlertStore {
    async fn save(&self, alert: Alert) -> Result<Alert, AlertError> {
        let model = to_active_model(&alert).insert(&self.db).await?;
        to_domain(model)
    }

    async fn update(&self, alert: Alert) -> Result<Alert, AlertError> {
        let model = to_active_model(&alert).update(&self.db).await?;
        to_domain(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Alert>, AlertError> {
        let model = alert::Entity::find_by_id(id).one(&self.db).await?;
        model.map(to_domain).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<(), AlertError> {
        alert::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Alert>, AlertError> {
        let models = alert::Entity::find().all(&self.db).await?;
        models.into_iter().map(to_domain).collect()
    }

    async fn find_by_owner(&self, owner_id: i32) -> Result<Vec<Alert>, AlertError> {
        let models = alert::Entity::find()
            .filter(alert::Column::UserId.eq(owner_id))
            .order_by_desc(alert::Column::CreatedAt)
            .all(&self.db)
            .await?;
        models.into_iter().map(to_domain).collect()
    }

    async fn find_within_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Alert>, AlertError> {
        // Spherical law of cosines in SQL, same R = 6371 km as geo::distance_km.
        // LEAST() clamps rounding error above 1.0 before acos.
        let models = alert::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                SELECT * FROM alerts
                WHERE status = 'ACTIVE'
                  AND (6371 * acos(LEAST(1.0,
                        cos(radians($1)) * cos(radians(latitude))
                        * cos(radians(longitude) - radians($2))
                        + sin(radians($1)) * sin(radians(latitude))))) <= $3
                ORDER BY created_at DESC
                "#,
                [
                    center.latitude.into(),
                    center.longitude.into(),
                    radius_km.into(),
                ],
            ))
            .all(&self.db)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}
