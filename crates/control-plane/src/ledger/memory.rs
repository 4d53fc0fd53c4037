//! In-process ledger backed by a map behind a tokio `RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerError, LedgerResult, ProgressLedger};
use crate::db::models::{Backup, DetailField, NewProject, Project, StepKey, StepUpdate};

#[derive(Default)]
struct Inner {
    projects: HashMap<String, (u64, Project)>,
    seq: u64,
}

/// Ledger that lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressLedger for MemoryLedger {
    async fn insert_project(&self, project: &NewProject) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;
        if inner.projects.contains_key(&project.name) {
            return Err(LedgerError::NameConflict(project.name.clone()));
        }
        inner.seq += 1;
        let seq = inner.seq;
        inner
            .projects
            .insert(project.name.clone(), (seq, Project::new(project)));
        Ok(())
    }

    async fn record_step(
        &self,
        project_name: &str,
        key: StepKey,
        update: &StepUpdate,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;
        let (_, project) = inner
            .projects
            .get_mut(project_name)
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))?;
        let step = project
            .progress
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or_else(|| LedgerError::StepNotFound {
                project: project_name.to_string(),
                key,
            })?;
        step.apply(update);
        Ok(())
    }

    async fn attach_detail(
        &self,
        project_name: &str,
        field: DetailField,
        value: serde_json::Value,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;
        let (_, project) = inner
            .projects
            .get_mut(project_name)
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))?;
        *project.detail_mut(field) = Some(value);
        Ok(())
    }

    async fn get_project(&self, project_name: &str) -> LedgerResult<Project> {
        let inner = self.inner.read().await;
        inner
            .projects
            .get(project_name)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))
    }

    async fn list_projects(&self) -> LedgerResult<Vec<Project>> {
        let inner = self.inner.read().await;
        let mut projects: Vec<_> = inner.projects.values().collect();
        projects.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b_seq.cmp(a_seq))
        });
        Ok(projects.into_iter().map(|(_, p)| p.clone()).collect())
    }

    async fn set_backups(&self, project_name: &str, mut backups: Vec<Backup>) -> LedgerResult<()> {
        backups.reverse();
        let mut inner = self.inner.write().await;
        let (_, project) = inner
            .projects
            .get_mut(project_name)
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))?;
        project.backups = backups;
        Ok(())
    }

    async fn set_backup_restores(
        &self,
        project_name: &str,
        backup_id: &str,
        mut restores: Vec<serde_json::Value>,
    ) -> LedgerResult<()> {
        restores.reverse();
        let mut inner = self.inner.write().await;
        let (_, project) = inner
            .projects
            .get_mut(project_name)
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))?;
        if let Some(backup) = project.backups.iter_mut().find(|b| b.id == backup_id) {
            backup.restores = restores;
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}
