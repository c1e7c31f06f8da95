use serde::{Deserialize, Serialize};

use crate::model::Entity;

#[derive(Deserialize, Debug)]
pub struct EntityTypesResponse {
    pub data: EntityTypesData,
}

#[derive(Deserialize, Debug)]
pub struct EntityTypesData {
    pub count: u64,
    pub entities: Vec<Entity>,
}

/// JSON body of `POST /platform/database/{ref}/clone`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloneBody {
    pub clone_backup_id: i64,
    pub new_project_name: String,
    pub new_db_pass: String,
}
