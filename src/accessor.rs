//! Per-node cache of how a property chain's root was last resolved.
//!
//! A node starts `Unresolved`. The first successful resolution records the
//! binding that worked (`Optimized`). Later executions try that binding first; when
//! it no longer applies the node is `Deoptimized` under the lock and resolution
//! falls back to the full lookup once before failing.

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::ast::Ty;

#[derive(Debug, Clone, PartialEq)]
pub enum RootBinding {
    /// Root read from the variable factory
    Variable,
    /// Root read from the root object through the property resolver
    RootProperty,
    /// Root names a qualified static type spanning `consumed` segments
    Static { ty: Ty, consumed: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AccessorState {
    #[default]
    Unresolved,
    Optimized(RootBinding),
    Deoptimized {
        retries: u32,
    },
}

#[derive(Debug, Default)]
pub struct AccessorCache {
    state: Mutex<AccessorState>,
}

impl AccessorCache {
    pub fn state(&self) -> AccessorState {
        self.state.lock().clone()
    }

    /// The cached binding, if the node is optimized.
    pub fn binding(&self) -> Option<RootBinding> {
        match &*self.state.lock() {
            AccessorState::Optimized(binding) => Some(binding.clone()),
            _ => None,
        }
    }

    /// Record a successful resolution. Only an unresolved node is optimized; a
    /// deoptimized node keeps taking the full path.
    pub fn optimize(&self, binding: RootBinding) {
        let mut state = self.state.lock();
        if *state == AccessorState::Unresolved {
            trace!(?binding, "accessor optimized");
            *state = AccessorState::Optimized(binding);
        }
    }

    /// Drop the cached binding, returning the number of fallbacks so far.
    pub fn deoptimize(&self, expr: &str) -> u32 {
        let mut state = self.state.lock();
        let retries = match &*state {
            AccessorState::Deoptimized { retries } => retries + 1,
            _ => 1,
        };
        warn!(expr, retries, "accessor deoptimized");
        *state = AccessorState::Deoptimized { retries };
        retries
    }
}
