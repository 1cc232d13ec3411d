//! Session lifecycle: reset, guarded restart and pause

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anchorstage_config::{seconds, StatusConfig};

use crate::error::Result;
use crate::status::{MessageKind, StatusHandle};
use crate::tracking::{RunOptions, TrackingConfiguration, TrackingSession};

pub const LOOK_AROUND_MESSAGE: &str = "Look around to detect images";

pub struct Experience {
    session: Arc<dyn TrackingSession>,
    configuration: TrackingConfiguration,
    status: StatusHandle,
    restart_available: Arc<AtomicBool>,
    look_around_delay: Duration,
    restart_cooldown: Duration,
}

impl Experience {
    pub fn new(
        session: Arc<dyn TrackingSession>,
        configuration: TrackingConfiguration,
        status: StatusHandle,
        config: &StatusConfig,
    ) -> Result<Self> {
        Ok(Self {
            session,
            configuration,
            status,
            restart_available: Arc::new(AtomicBool::new(true)),
            look_around_delay: seconds(
                "status.look_around_delay_seconds",
                config.look_around_delay_seconds,
            )?,
            restart_cooldown: seconds(
                "status.restart_cooldown_seconds",
                config.restart_cooldown_seconds,
            )?,
        })
    }

    pub fn configuration(&self) -> &TrackingConfiguration {
        &self.configuration
    }

    pub fn restart_available(&self) -> bool {
        self.restart_available.load(Ordering::SeqCst)
    }

    /// Run tracking from scratch and nudge the user to look around
    pub async fn reset_tracking(&self) -> Result<()> {
        self.session
            .run(self.configuration.clone(), RunOptions::reset())
            .await?;
        self.status
            .schedule(
                LOOK_AROUND_MESSAGE,
                self.look_around_delay,
                MessageKind::ContentPlacement,
            )
            .await
    }

    /// Restart the experience unless a restart happened within the
    /// cooldown. Returns whether the restart ran.
    pub async fn restart(&self) -> Result<bool> {
        if self
            .restart_available
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Restart ignored during cooldown");
            return Ok(false);
        }

        tracing::info!("Restarting experience");
        let available = Arc::clone(&self.restart_available);
        let cooldown = self.restart_cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            available.store(true, Ordering::SeqCst);
        });

        self.status.cancel_all_scheduled().await?;
        self.reset_tracking().await?;
        Ok(true)
    }

    pub async fn pause(&self) -> Result<()> {
        self.session.pause().await
    }
}
