//! Entries entity
//!
//! One row per package-import attempt. The commit provenance columns
//! (`commit_hash`, `commit_uri`, `commit_branch`, `commit_tag`, `pkg`) are
//! only ever written together through [`ActiveModel::set_import_result`].

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use srcport_core::DBDateTime;

use crate::types::EntryState;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// `<name>-<version>-<release>.src`, set once the artifact was parsed
    pub entry_id: Option<String>,
    pub os_release: String,
    pub sha256_sum: String,
    pub repository: String,
    pub state: EntryState,
    pub commit_hash: String,
    pub commit_uri: String,
    pub commit_branch: String,
    pub commit_tag: String,
    pub pkg: String,
    /// Worker that created the entry; lookup only
    pub worker_id: String,
    pub created_at: DBDateTime,
    pub updated_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();

        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            self.updated_at = Set(now);
        }

        Ok(self)
    }
}

/// Provenance of a successful import, reported by the commit/push step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub commit_hash: String,
    pub commit_uri: String,
    pub commit_branch: String,
    pub commit_tag: String,
    pub pkg: String,
}

impl ActiveModel {
    /// Set all commit provenance columns from `result`, or clear all of them.
    pub fn set_import_result(&mut self, result: Option<&ImportResult>) {
        match result {
            Some(result) => {
                self.commit_hash = Set(result.commit_hash.clone());
                self.commit_uri = Set(result.commit_uri.clone());
                self.commit_branch = Set(result.commit_branch.clone());
                self.commit_tag = Set(result.commit_tag.clone());
                self.pkg = Set(result.pkg.clone());
            }
            None => {
                self.commit_hash = Set(String::new());
                self.commit_uri = Set(String::new());
                self.commit_branch = Set(String::new());
                self.commit_tag = Set(String::new());
                self.pkg = Set(String::new());
            }
        }
    }
}

impl Model {
    /// The commit provenance carried by this entry, if any was recorded.
    pub fn import_result(&self) -> Option<ImportResult> {
        if self.commit_hash.is_empty() {
            return None;
        }
        Some(ImportResult {
            commit_hash: self.commit_hash.clone(),
            commit_uri: self.commit_uri.clone(),
            commit_branch: self.commit_branch.clone(),
            commit_tag: self.commit_tag.clone(),
            pkg: self.pkg.clone(),
        })
    }

    /// Package name taken from `entry_id`. Versions and releases never
    /// contain `-`, so the name is everything before the last two.
    pub fn package_name(&self) -> Option<&str> {
        let nvr = self.entry_id.as_deref()?.strip_suffix(".src")?;
        let mut parts = nvr.rsplitn(3, '-');
        let (_release, _version) = (parts.next()?, parts.next()?);
        parts.next().filter(|name| !name.is_empty())
    }
}
