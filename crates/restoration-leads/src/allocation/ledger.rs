use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use super::domain::{DebitReceipt, DebitRefusal, Money, Partner, PartnerId};

/// Result of one check-and-debit attempt at the final gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited(DebitReceipt),
    Refused(DebitRefusal),
}

/// Partner storage boundary. `debit` is the only mutation the engine performs and
/// must be linearizable per partner: the status, credit and cap checks and the write
/// happen inside one exclusive section keyed by partner id.
pub trait PartnerStore: Send + Sync {
    /// Snapshot of the roster; may be stale since `debit` re-validates.
    fn roster(&self) -> Result<Vec<Partner>, StoreError>;
    fn debit(
        &self,
        partner_id: &PartnerId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("partner store unavailable: {0}")]
    Unavailable(String),
}

/// In-process partner store holding one mutex per partner.
///
/// The outer `RwLock` only guards the index; it is released before a partner's
/// mutex is taken, so debits against different partners never contend.
#[derive(Debug, Default)]
pub struct InMemoryPartnerStore {
    partners: RwLock<BTreeMap<PartnerId, Arc<Mutex<Partner>>>>,
}

impl InMemoryPartnerStore {
    pub fn new(partners: impl IntoIterator<Item = Partner>) -> Self {
        let partners = partners
            .into_iter()
            .map(|partner| (partner.id.clone(), Arc::new(Mutex::new(partner))))
            .collect();
        Self {
            partners: RwLock::new(partners),
        }
    }

    /// Insert or replace a partner record (CRM administration path).
    pub fn upsert(&self, partner: Partner) -> Result<(), StoreError> {
        let mut index = self
            .partners
            .write()
            .map_err(|_| poisoned("partner index"))?;
        match index.get(&partner.id) {
            Some(slot) => {
                let mut current = slot.lock().map_err(|_| poisoned("partner record"))?;
                *current = partner;
            }
            None => {
                index.insert(partner.id.clone(), Arc::new(Mutex::new(partner)));
            }
        }
        Ok(())
    }

    pub fn get(&self, partner_id: &PartnerId) -> Result<Option<Partner>, StoreError> {
        match self.slot(partner_id)? {
            Some(slot) => {
                let partner = slot.lock().map_err(|_| poisoned("partner record"))?;
                Ok(Some(partner.clone()))
            }
            None => Ok(None),
        }
    }

    fn slot(&self, partner_id: &PartnerId) -> Result<Option<Arc<Mutex<Partner>>>, StoreError> {
        let index = self
            .partners
            .read()
            .map_err(|_| poisoned("partner index"))?;
        Ok(index.get(partner_id).cloned())
    }
}

impl PartnerStore for InMemoryPartnerStore {
    fn roster(&self) -> Result<Vec<Partner>, StoreError> {
        let slots: Vec<Arc<Mutex<Partner>>> = {
            let index = self
                .partners
                .read()
                .map_err(|_| poisoned("partner index"))?;
            index.values().cloned().collect()
        };

        slots
            .iter()
            .map(|slot| {
                slot.lock()
                    .map(|partner| partner.clone())
                    .map_err(|_| poisoned("partner record"))
            })
            .collect()
    }

    fn debit(
        &self,
        partner_id: &PartnerId,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<DebitOutcome, StoreError> {
        let Some(slot) = self.slot(partner_id)? else {
            return Ok(DebitOutcome::Refused(DebitRefusal::UnknownPartner));
        };

        let mut partner = slot.lock().map_err(|_| poisoned("partner record"))?;
        Ok(match partner.try_debit(amount, at) {
            Ok(receipt) => DebitOutcome::Debited(receipt),
            Err(refusal) => DebitOutcome::Refused(refusal),
        })
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} lock poisoned"))
}
