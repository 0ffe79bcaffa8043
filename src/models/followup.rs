use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A follow-up scheduled for a visit, at most one per visit. Projected
/// into the daily listing index by its due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
    pub created_at: i64,
}
