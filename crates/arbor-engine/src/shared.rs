//! Thread-safe handle to an option engine.
//!
//! Every call takes the engine lock for its whole duration, so each public
//! operation is one exclusive transaction over the registry.

use std::sync::Arc;

use parking_lot::Mutex;

use arbor_core::{Amount, ArborResult, OptionId, OptionRecord, PartyId, Settlement, Timestamp};

use crate::engine::{OptionEngine, RootOptionRequest};

/// Cloneable, lock-protected [`OptionEngine`].
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<OptionEngine>>,
}

impl SharedEngine {
    /// Wraps an engine.
    pub fn new(engine: OptionEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn transact<R>(&self, f: impl FnOnce(&mut OptionEngine) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// Runs `f` against the engine without mutating it.
    pub fn read<R>(&self, f: impl FnOnce(&OptionEngine) -> R) -> R {
        let engine = self.inner.lock();
        f(&engine)
    }

    /// Snapshot of an option.
    pub fn get_option(&self, id: OptionId) -> ArborResult<OptionRecord> {
        self.read(|engine| engine.get_option(id).cloned())
    }

    /// See [`OptionEngine::create_root_option`].
    pub fn create_root_option(
        &self,
        writer: &PartyId,
        request: RootOptionRequest,
    ) -> ArborResult<OptionId> {
        self.transact(|engine| engine.create_root_option(writer, request))
    }

    /// See [`OptionEngine::create_child_option`].
    pub fn create_child_option(
        &self,
        caller: &PartyId,
        parent_id: OptionId,
        child_strike: Amount,
        child_maturity: Option<Timestamp>,
    ) -> ArborResult<OptionId> {
        self.transact(|engine| {
            engine.create_child_option(caller, parent_id, child_strike, child_maturity)
        })
    }

    /// See [`OptionEngine::purchase_option`].
    pub fn purchase_option(&self, buyer: &PartyId, id: OptionId) -> ArborResult<()> {
        self.transact(|engine| engine.purchase_option(buyer, id))
    }

    /// See [`OptionEngine::settle_option`].
    pub fn settle_option(&self, id: OptionId) -> ArborResult<Settlement> {
        self.transact(|engine| engine.settle_option(id))
    }

    /// See [`OptionEngine::settle_option_tree`].
    pub fn settle_option_tree(&self, id: OptionId) -> ArborResult<Vec<OptionId>> {
        self.transact(|engine| engine.settle_option_tree(id))
    }

    /// See [`OptionEngine::claim_settlement`].
    pub fn claim_settlement(&self, caller: &PartyId, id: OptionId) -> ArborResult<Amount> {
        self.transact(|engine| engine.claim_settlement(caller, id))
    }
}
