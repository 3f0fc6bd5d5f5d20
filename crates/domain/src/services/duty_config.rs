//! Administration of duty templates.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::clock::Clock;
use super::store::DutyStore;
use crate::error::DutyError;
use crate::models::{CreateDutyConfigRequest, DutyConfig, UpdateDutyConfigRequest};

pub struct DutyConfigService {
    store: Arc<dyn DutyStore>,
    clock: Arc<dyn Clock>,
}

impl DutyConfigService {
    pub fn new(store: Arc<dyn DutyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a template. One-off templates announce themselves through the
    /// outbox so a calendar entry can be created for the event.
    pub async fn create_config(
        &self,
        request: CreateDutyConfigRequest,
        created_by: Uuid,
    ) -> Result<DutyConfig, DutyError> {
        request.validate()?;
        let new_config = request.into_new_config(created_by)?;

        let config = self
            .store
            .insert_config(new_config, self.clock.now())
            .await?;

        info!(
            config_id = %config.id,
            section_id = %config.section_id,
            one_off = config.schedule.is_one_off(),
            created_by = %created_by,
            "Duty config created"
        );

        Ok(config)
    }

    pub async fn get_config(&self, config_id: Uuid) -> Result<DutyConfig, DutyError> {
        self.store
            .find_config(config_id)
            .await?
            .ok_or_else(|| DutyError::NotFound("Duty config not found".to_string()))
    }

    /// Edit a template. Slots already generated keep their snapshot.
    pub async fn update_config(
        &self,
        config_id: Uuid,
        request: UpdateDutyConfigRequest,
    ) -> Result<DutyConfig, DutyError> {
        request.validate()?;
        let current = self.get_config(config_id).await?;
        let updated = request.apply_to(&current)?;

        let config = self
            .store
            .update_config(&updated, self.clock.now())
            .await?
            .ok_or_else(|| DutyError::NotFound("Duty config not found".to_string()))?;

        info!(config_id = %config_id, "Duty config updated");
        Ok(config)
    }

    /// Toggle whether the template produces new slots.
    pub async fn set_active(&self, config_id: Uuid, active: bool) -> Result<DutyConfig, DutyError> {
        let config = self
            .store
            .set_config_active(config_id, active, self.clock.now())
            .await?
            .ok_or_else(|| DutyError::NotFound("Duty config not found".to_string()))?;

        info!(config_id = %config_id, active = active, "Duty config activation changed");
        Ok(config)
    }

    pub async fn deactivate_config(&self, config_id: Uuid) -> Result<DutyConfig, DutyError> {
        self.set_active(config_id, false).await
    }
}
