//! Weighting-profile lookup.
//!
//! The engine asks a [`PersonaProvider`] for the profile named in a
//! request. Lookups are async so implementations may reach a remote
//! store; the bundled ones read from the grading policy or a fixed map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tribunal_core::{GradingPolicy, WeightingProfile};

/// Errors from profile lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersonaError {
    #[error("Unknown profile: {0}")]
    NotFound(String),

    #[error("Profile store unavailable: {0}")]
    Unavailable(String),
}

/// Source of weighting profiles.
#[async_trait]
pub trait PersonaProvider: Send + Sync {
    async fn get(&self, profile_id: &str) -> Result<WeightingProfile, PersonaError>;
}

/// Profiles from a grading policy.
///
/// A profile id resolves to a persona entry first, then to a grading mode
/// of the same name.
#[derive(Debug, Clone)]
pub struct PolicyPersonaProvider {
    policy: Arc<GradingPolicy>,
}

impl PolicyPersonaProvider {
    pub fn new(policy: Arc<GradingPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PersonaProvider for PolicyPersonaProvider {
    async fn get(&self, profile_id: &str) -> Result<WeightingProfile, PersonaError> {
        if let Some(profile) = self.policy.persona(profile_id) {
            return Ok(profile);
        }

        self.policy
            .profile_for_mode(profile_id)
            .map_err(|_| PersonaError::NotFound(profile_id.to_string()))
    }
}

/// Fixed in-memory profiles.
#[derive(Debug, Clone, Default)]
pub struct StaticPersonaProvider {
    profiles: HashMap<String, WeightingProfile>,
}

impl StaticPersonaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: WeightingProfile) -> Self {
        self.profiles.insert(profile.profile_id.clone(), profile);
        self
    }
}

#[async_trait]
impl PersonaProvider for StaticPersonaProvider {
    async fn get(&self, profile_id: &str) -> Result<WeightingProfile, PersonaError> {
        self.profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| PersonaError::NotFound(profile_id.to_string()))
    }
}
