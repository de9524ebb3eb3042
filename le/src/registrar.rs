//! Registrar - puts this process up for election

use std::sync::Arc;

use coordstore::{CoordError, CoordinationService, CreateMode, path};
use tracing::{debug, info};

use crate::error::ElectionError;

/// Creates this process's candidacy marker
pub struct Registrar {
    service: Arc<dyn CoordinationService>,
    namespace: String,
    prefix: String,
}

impl Registrar {
    pub fn new(service: Arc<dyn CoordinationService>, namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            service,
            namespace: namespace.into(),
            prefix: prefix.into(),
        }
    }

    /// Create the namespace and any missing ancestors
    ///
    /// Nodes that already exist are left alone, so concurrent volunteers can
    /// all call this.
    pub async fn ensure_namespace(&self) -> Result<(), ElectionError> {
        debug!(namespace = %self.namespace, "Registrar::ensure_namespace: called");
        path::validate(&self.namespace).map_err(|e| self.namespace_missing(e))?;
        if self.namespace == path::ROOT {
            return Ok(());
        }

        let mut to_create = path::ancestors(&self.namespace);
        to_create.push(&self.namespace);
        for node in to_create {
            match self.service.create(node, CreateMode::Persistent).await {
                Ok(_) => debug!(%node, "Registrar::ensure_namespace: created"),
                Err(CoordError::NodeExists { .. }) => {}
                Err(e) => return Err(self.classify(e)),
            }
        }
        Ok(())
    }

    /// Register as a candidate, returning the bare marker name
    ///
    /// The marker is ephemeral: it lives exactly as long as the session.
    pub async fn volunteer(&self) -> Result<String, ElectionError> {
        debug!(namespace = %self.namespace, prefix = %self.prefix, "Registrar::volunteer: called");
        self.ensure_namespace().await?;

        let marker_path = path::join(&self.namespace, &self.prefix);
        let full_path = self
            .service
            .create(&marker_path, CreateMode::EphemeralSequential)
            .await
            .map_err(|e| self.classify(e))?;

        let marker = path::basename(&full_path).to_string();
        info!(%full_path, session = self.service.session_id(), "Volunteered for leadership");
        Ok(marker)
    }

    fn classify(&self, err: CoordError) -> ElectionError {
        match err {
            CoordError::ConnectionLoss | CoordError::SessionExpired(_) => err.into(),
            other => self.namespace_missing(other),
        }
    }

    fn namespace_missing(&self, err: CoordError) -> ElectionError {
        ElectionError::NamespaceMissing {
            namespace: self.namespace.clone(),
            reason: err.to_string(),
        }
    }
}
