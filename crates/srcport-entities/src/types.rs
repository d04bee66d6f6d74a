use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lifecycle state of an import entry.
/// NOTE: Use db_type = "Text" for SQLite compatibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Newly created; the import is in progress
    #[sea_orm(string_value = "archiving")]
    Archiving,
    #[sea_orm(string_value = "archived")]
    Archived,
    #[sea_orm(string_value = "on_hold")]
    OnHold,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "retracting")]
    Retracting,
    #[sea_orm(string_value = "retracted")]
    Retracted,
}

impl Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Archiving => "archiving",
            EntryState::Archived => "archived",
            EntryState::OnHold => "on_hold",
            EntryState::Cancelled => "cancelled",
            EntryState::Failed => "failed",
            EntryState::Retracting => "retracting",
            EntryState::Retracted => "retracted",
        }
    }
}
