use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{AlertStatus, CrisisAlert, User};
use crate::error::{AppError, Result};
use crate::observability::metrics;
use crate::storage::{alerts, Database};

/// Admin handling of crisis alerts
pub struct CrisisUseCase {
    db: Arc<Database>,
}

impl CrisisUseCase {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn list(&self, status: Option<AlertStatus>) -> Result<Vec<CrisisAlert>> {
        self.db.list_alerts(status)
    }

    pub fn get(&self, id: Uuid) -> Result<CrisisAlert> {
        self.db.get_alert(id)
    }

    pub fn acknowledge(&self, admin: &User, id: Uuid) -> Result<CrisisAlert> {
        let alert = self.transition(id, |alert| alert.acknowledge(admin.id, Utc::now()))?;
        info!(alert_id = %id, admin_id = %admin.id, "Crisis alert acknowledged");
        Ok(alert)
    }

    pub fn resolve(&self, admin: &User, id: Uuid, notes: &str) -> Result<CrisisAlert> {
        let alert = self.transition(id, |alert| alert.resolve(admin.id, notes, Utc::now()))?;
        metrics::crisis::alert_resolved();
        info!(alert_id = %id, admin_id = %admin.id, "Crisis alert resolved");
        Ok(alert)
    }

    fn transition(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut CrisisAlert) -> Result<()>,
    ) -> Result<CrisisAlert> {
        self.db.transaction(|c| {
            let mut alert = alerts::find(c, id)?
                .ok_or_else(|| AppError::not_found("Crisis alert"))?;
            apply(&mut alert)?;
            alerts::update_status(c, &alert)?;
            Ok(alert)
        })
    }
}
