//! Transaction entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Allocated by the orchestrator, never by the database
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub charge_point_id: String,
    pub connector_id: i32,
    pub id_tag: String,

    pub meter_start: i32,

    #[sea_orm(nullable)]
    pub meter_stop: Option<i32>,

    pub started_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub stopped_at: Option<DateTimeUtc>,

    /// EmergencyStop, EVDisconnected, HardReset, Local, Other, PowerLoss,
    /// Reboot, Remote, SoftReset, UnlockCommand, DeAuthorized
    #[sea_orm(nullable)]
    pub stop_reason: Option<String>,

    /// Energy consumed in Wh
    #[sea_orm(nullable)]
    pub energy_consumed: Option<i32>,

    pub authorization_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
