//! Inbound identifier filtering
//!
//! The allow-set itself belongs to the caller; the driver only asks it
//! whether an identifier is wanted.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Externally owned set of accepted identifiers
pub trait AllowList: Send + Sync {
    /// Check if frames with this identifier should be delivered
    fn contains(&self, id: u32) -> bool;
}

impl AllowList for HashSet<u32> {
    fn contains(&self, id: u32) -> bool {
        HashSet::contains(self, &id)
    }
}

impl AllowList for BTreeSet<u32> {
    fn contains(&self, id: u32) -> bool {
        BTreeSet::contains(self, &id)
    }
}

/// Accept/reject decision for received frame identifiers
#[derive(Clone, Default)]
pub struct IdFilter {
    bypass: bool,
    allowed: Option<Arc<dyn AllowList>>,
}

impl IdFilter {
    /// Filter that accepts every identifier
    pub fn bypass() -> Self {
        Self {
            bypass: true,
            allowed: None,
        }
    }

    /// Filter backed by an allow-set
    pub fn with_allow_list(allowed: Arc<dyn AllowList>) -> Self {
        Self {
            bypass: false,
            allowed: Some(allowed),
        }
    }

    /// Enable or disable bypass mode
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    /// Replace the allow-set
    pub fn set_allow_list(&mut self, allowed: Arc<dyn AllowList>) {
        self.allowed = Some(allowed);
    }

    /// Whether bypass mode is enabled
    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// Decide whether a frame with `id` is delivered
    ///
    /// Without bypass and without an allow-set nothing is accepted.
    pub fn accept(&self, id: u32) -> bool {
        if self.bypass {
            return true;
        }
        self.allowed.as_ref().is_some_and(|list| list.contains(id))
    }
}

impl std::fmt::Debug for IdFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdFilter")
            .field("bypass", &self.bypass)
            .field("has_allow_list", &self.allowed.is_some())
            .finish()
    }
}
