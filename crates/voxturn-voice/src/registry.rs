//! Per-conversation run controllers, keyed by session.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::debug;
use voxturn_core::{CancelOutcome, CancelStatus, SessionKey, TurnError, TurnSnapshot};

use crate::controller::{TurnConfig, TurnController, TurnDeps, TurnStream};

/// Routes turn requests to the controller that owns their conversation.
///
/// Controllers are created on first use; turns in different sessions never
/// share state. A controller idle for longer than
/// [`TurnConfig::idle_session_ttl`] is evicted the next time a new session
/// is created, unless someone still holds it.
pub struct TurnRegistry {
    deps: TurnDeps,
    config: TurnConfig,
    controllers: RwLock<HashMap<SessionKey, Arc<TurnController>>>,
}

impl TurnRegistry {
    pub fn new(deps: TurnDeps, config: TurnConfig) -> Self {
        Self {
            deps,
            config,
            controllers: RwLock::new(HashMap::new()),
        }
    }

    /// Controller for `session`, creating it if needed.
    pub fn controller(&self, session: &SessionKey) -> Arc<TurnController> {
        if let Some(existing) = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
        {
            return Arc::clone(existing);
        }

        let mut controllers = self.controllers.write().unwrap_or_else(PoisonError::into_inner);
        if !controllers.contains_key(session) {
            evict_idle(&mut controllers, self.config.idle_session_ttl);
        }
        Arc::clone(controllers.entry(session.clone()).or_insert_with(|| {
            debug!(session = %session, "Creating turn controller");
            Arc::new(TurnController::new(
                session.clone(),
                self.deps.clone(),
                self.config.clone(),
            ))
        }))
    }

    pub async fn submit(
        &self,
        session: &SessionKey,
        text: impl Into<String>,
    ) -> Result<TurnStream, TurnError> {
        self.controller(session).submit(text).await
    }

    /// Cancel the active turn of `session`. Unknown sessions report that
    /// there was nothing to cancel.
    pub async fn cancel(&self, session: &SessionKey) -> CancelOutcome {
        let controller = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .cloned();
        match controller {
            Some(controller) => controller.cancel().await,
            None => CancelOutcome::new(CancelStatus::NoActiveTurn, "No turn to cancel"),
        }
    }

    pub fn snapshot(&self, session: &SessionKey) -> Option<TurnSnapshot> {
        self.controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .and_then(|controller| controller.snapshot())
    }

    /// Drop controllers that have been idle past the TTL. Returns how many
    /// were evicted.
    pub fn evict_idle(&self) -> usize {
        let mut controllers = self.controllers.write().unwrap_or_else(PoisonError::into_inner);
        evict_idle(&mut controllers, self.config.idle_session_ttl)
    }

    /// Number of sessions currently tracked.
    pub fn session_count(&self) -> usize {
        self.controllers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn evict_idle(controllers: &mut HashMap<SessionKey, Arc<TurnController>>, ttl: Duration) -> usize {
    let before = controllers.len();
    controllers.retain(|session, controller| {
        let keep = Arc::strong_count(controller) > 1 || !controller.is_idle_for(ttl);
        if !keep {
            debug!(session = %session, "Evicting idle turn controller");
        }
        keep
    });
    before - controllers.len()
}

impl std::fmt::Debug for TurnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRegistry")
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}
