use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PresetKind;

/// A medicine or prescription preset. Name-unique within its kind via
/// the `<KIND>_NAME#` index item; searchable by normalized-name prefix
/// through Index-1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: Uuid,
    pub kind: PresetKind,
    pub name: String,
    pub name_norm: String,
    /// Free-form preset content (dose/frequency/duration for medicines,
    /// the medicine list for prescription presets).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
    pub created_by: Uuid,
    /// Presets created inline during a consult are editable only by
    /// their creator (or an admin).
    pub inline: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewPreset {
    pub kind: PresetKind,
    pub name: String,
    pub details: Option<String>,
    pub created_by: Uuid,
    pub inline: bool,
}

/// Sparse preset patch; a name change routes through the
/// uniqueness-rename protocol.
#[derive(Debug, Clone, Default)]
pub struct PresetPatch {
    pub name: Option<String>,
    pub details: Option<String>,
    pub clear_details: bool,
}
