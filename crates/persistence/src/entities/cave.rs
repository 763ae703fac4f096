//! Cave entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::cave::{Cave, CaveEntrance};
use sqlx::FromRow;

/// Database row mapping for the caves table.
#[derive(Debug, Clone, FromRow)]
pub struct CaveEntity {
    pub cave_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub owner_email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: Option<f64>,
    pub length_m: Option<f64>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CaveEntity> for Cave {
    fn from(entity: CaveEntity) -> Self {
        Self {
            cave_id: entity.cave_id,
            name: entity.name,
            description: entity.description,
            owner_email: entity.owner_email,
            latitude: entity.latitude,
            longitude: entity.longitude,
            depth_m: entity.depth_m,
            length_m: entity.length_m,
            discovered_at: entity.discovered_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the cave_entrances table.
#[derive(Debug, Clone, FromRow)]
pub struct CaveEntranceEntity {
    pub entrance_id: i32,
    pub cave_id: i32,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
}

impl From<CaveEntranceEntity> for CaveEntrance {
    fn from(entity: CaveEntranceEntity) -> Self {
        Self {
            entrance_id: entity.entrance_id,
            cave_id: entity.cave_id,
            name: entity.name,
            latitude: entity.latitude,
            longitude: entity.longitude,
            elevation_m: entity.elevation_m,
        }
    }
}

