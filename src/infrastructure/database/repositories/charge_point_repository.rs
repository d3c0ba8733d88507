//! SeaORM implementation of ChargePointRepository

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait, UpdateResult,
};
use tracing::debug;

use super::db_err;
use crate::domain::{
    ChargePointRecord, ChargePointRepository, ConnectorFilter, ConnectorRecord, ConnectorStatus,
    ConnectorUpdate, DomainError, DomainResult,
};
use crate::infrastructure::database::entities::{charge_point, connector};

pub struct SeaOrmChargePointRepository {
    db: DatabaseConnection,
}

impl SeaOrmChargePointRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn connector_from_model(c: connector::Model) -> ConnectorRecord {
    ConnectorRecord {
        connector_id: c.connector_id.max(0) as u32,
        connector_type: c.connector_type,
        status: ConnectorStatus::parse(&c.status),
        meter_value: c.meter_value,
        start_timestamp: c.start_timestamp,
    }
}

fn cp_from_model(model: charge_point::Model, connectors: Vec<connector::Model>) -> ChargePointRecord {
    let mut connectors: Vec<_> = connectors.into_iter().map(connector_from_model).collect();
    connectors.sort_by_key(|c| c.connector_id);

    ChargePointRecord {
        id: model.id,
        serial_number: model.serial_number,
        vendor: model.vendor,
        model: model.model,
        password_hash: model.password_hash,
        status: ConnectorStatus::parse(&model.status),
        connectors,
        last_activity: model.last_activity,
        registered_at: model.registered_at,
    }
}

fn not_found(id: &str) -> DomainError {
    DomainError::not_found("ChargePoint", "id", id)
}

fn ensure_updated(result: UpdateResult, id: &str) -> DomainResult<()> {
    if result.rows_affected == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

async fn load(
    db: &impl ConnectionTrait,
    model: charge_point::Model,
) -> DomainResult<ChargePointRecord> {
    let connectors = connector::Entity::find()
        .filter(connector::Column::ChargePointId.eq(model.id.as_str()))
        .all(db)
        .await
        .map_err(db_err)?;
    Ok(cp_from_model(model, connectors))
}

// ── ChargePointRepository impl ──────────────────────────────────

#[async_trait]
impl ChargePointRepository for SeaOrmChargePointRepository {
    async fn create(&self, cp: ChargePointRecord) -> DomainResult<()> {
        debug!(charge_point_id = cp.id.as_str(), "Creating charge point record");

        let clash = charge_point::Entity::find()
            .filter(
                Condition::any()
                    .add(charge_point::Column::Id.eq(cp.id.as_str()))
                    .add(charge_point::Column::SerialNumber.eq(cp.serial_number.as_str())),
            )
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if let Some(existing) = clash {
            let what = if existing.id == cp.id {
                format!("charge point with id {}", cp.id)
            } else {
                format!("charge point with serial number {}", cp.serial_number)
            };
            return Err(DomainError::Conflict(what));
        }

        let txn = self.db.begin().await.map_err(db_err)?;

        charge_point::ActiveModel {
            id: Set(cp.id.clone()),
            serial_number: Set(cp.serial_number),
            vendor: Set(cp.vendor),
            model: Set(cp.model),
            password_hash: Set(cp.password_hash),
            status: Set(cp.status.as_str().to_string()),
            last_activity: Set(cp.last_activity),
            registered_at: Set(cp.registered_at),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        let now = Utc::now();
        for conn in cp.connectors {
            connector::ActiveModel {
                id: NotSet,
                charge_point_id: Set(cp.id.clone()),
                connector_id: Set(conn.connector_id as i32),
                connector_type: Set(conn.connector_type),
                status: Set(conn.status.as_str().to_string()),
                meter_value: Set(conn.meter_value),
                start_timestamp: Set(conn.start_timestamp),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePointRecord>> {
        let Some(model) = charge_point::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn find_by_serial_number(
        &self,
        serial_number: &str,
    ) -> DomainResult<Option<ChargePointRecord>> {
        let Some(model) = charge_point::Entity::find()
            .filter(charge_point::Column::SerialNumber.eq(serial_number))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        load(&self.db, model).await.map(Some)
    }

    async fn find_all(&self) -> DomainResult<Vec<ChargePointRecord>> {
        let rows = charge_point::Entity::find()
            .order_by_asc(charge_point::Column::Id)
            .find_with_related(connector::Entity)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(cp, connectors)| cp_from_model(cp, connectors))
            .collect())
    }

    async fn find_by_connector(
        &self,
        filter: &ConnectorFilter,
    ) -> DomainResult<Vec<ChargePointRecord>> {
        let mut condition = Condition::all();
        if let Some(connector_id) = filter.connector_id {
            condition = condition.add(connector::Column::ConnectorId.eq(connector_id as i32));
        }
        if let Some(status) = filter.status {
            condition = condition.add(connector::Column::Status.eq(status.as_str()));
        }

        let ids: BTreeSet<String> = connector::Entity::find()
            .filter(condition)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|c| c.charge_point_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = charge_point::Entity::find()
            .filter(charge_point::Column::Id.is_in(ids))
            .order_by_asc(charge_point::Column::Id)
            .find_with_related(connector::Entity)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(cp, connectors)| cp_from_model(cp, connectors))
            .collect())
    }

    async fn update_connector(&self, id: &str, update: ConnectorUpdate) -> DomainResult<()> {
        debug!(
            charge_point_id = id,
            connector_id = update.connector_id,
            status = update.status.as_str(),
            "Updating connector"
        );

        let txn = self.db.begin().await.map_err(db_err)?;

        if charge_point::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .is_none()
        {
            return Err(not_found(id));
        }

        let existing = connector::Entity::find()
            .filter(connector::Column::ChargePointId.eq(id))
            .filter(connector::Column::ConnectorId.eq(update.connector_id as i32))
            .one(&txn)
            .await
            .map_err(db_err)?;

        let now = Utc::now();
        match existing {
            Some(model) => {
                let mut active: connector::ActiveModel = model.into();
                active.status = Set(update.status.as_str().to_string());
                active.meter_value = Set(update.meter_value);
                active.start_timestamp = Set(update.start_timestamp);
                active.updated_at = Set(now);
                active.update(&txn).await.map_err(db_err)?;
            }
            None => {
                connector::ActiveModel {
                    id: NotSet,
                    charge_point_id: Set(id.to_string()),
                    connector_id: Set(update.connector_id as i32),
                    connector_type: Set(None),
                    status: Set(update.status.as_str().to_string()),
                    meter_value: Set(update.meter_value),
                    start_timestamp: Set(update.start_timestamp),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
            }
        }

        if let Some(status) = update.charge_point_status {
            charge_point::Entity::update_many()
                .col_expr(charge_point::Column::Status, Expr::value(status.as_str()))
                .filter(charge_point::Column::Id.eq(id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)
    }

    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()> {
        let result = charge_point::Entity::update_many()
            .col_expr(charge_point::Column::Status, Expr::value(status.as_str()))
            .filter(charge_point::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        ensure_updated(result, id)
    }

    async fn update_last_activity(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let result = charge_point::Entity::update_many()
            .col_expr(charge_point::Column::LastActivity, Expr::value(at))
            .filter(charge_point::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        ensure_updated(result, id)
    }
}
