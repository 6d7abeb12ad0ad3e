//! Fee record synchronizer.
//!
//! Owns the selection machine and the per-selection [`FeeRecord`]. Every
//! remote call is issued with the [`SelectionTicket`] that was current when
//! it started, and its result is written back only if that ticket is still
//! current when it completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::collaborators::{Collaborators, ContentStore, FeeAuthority, ObligationService};
use crate::config::DEFAULT_SERVICE_KIND;
use crate::encoding;
use crate::error::{EngineError, GatewayError, Precondition, Result};
use crate::gateway::Gateway;
use crate::identity::SessionContext;
use crate::selection::{SelectionMachine, SelectionState, SelectionTicket, Transition};
use crate::types::{Currency, Direction, Selection, UnlockingField};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeeRecord {
    pub saved_value: Option<String>,
    pub edit_value: Option<String>,
    pub published_self: Option<String>,
    pub published_other: Option<String>,
}

impl FeeRecord {
    fn set_confirmed(&mut self, value: String) {
        self.edit_value = Some(value.clone());
        self.saved_value = Some(value);
    }

    fn clear_confirmed(&mut self) {
        self.saved_value = None;
        self.edit_value = None;
    }
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeeView {
    pub selection: Option<Selection>,
    pub unit: Option<&'static str>,
    pub record: FeeRecord,
    pub other_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedSource {
    SelfPublished,
    Other,
}

/// Whether a completed response was written or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    Discarded,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub authoritative: Result<Delivery>,
    pub self_published: Result<Delivery>,
}

#[derive(Debug, Default)]
struct SyncState {
    machine: SelectionMachine,
    record: FeeRecord,
    other_name: Option<String>,
}

impl SyncState {
    fn view(&self) -> FeeView {
        let selection = self.machine.selection();
        FeeView {
            selection,
            unit: selection.map(|s| s.unit()),
            record: self.record.clone(),
            other_name: self.other_name.clone(),
        }
    }
}

pub struct FeeSynchronizer {
    gateway: Gateway,
    fees: Arc<dyn FeeAuthority>,
    store: Arc<dyn ContentStore>,
    obligations: Arc<dyn ObligationService>,
    session: Arc<SessionContext>,
    unlocking_field: UnlockingField,
    service_kind: String,
    state: Mutex<SyncState>,
    view: watch::Sender<FeeView>,
}

impl FeeSynchronizer {
    pub fn new(
        collaborators: &Collaborators,
        gateway: Gateway,
        session: Arc<SessionContext>,
    ) -> Self {
        let (view, _rx) = watch::channel(FeeView::default());
        Self {
            gateway,
            fees: collaborators.fees.clone(),
            store: collaborators.store.clone(),
            obligations: collaborators.obligations.clone(),
            session,
            unlocking_field: UnlockingField::default(),
            service_kind: DEFAULT_SERVICE_KIND.to_string(),
            state: Mutex::new(SyncState::default()),
            view,
        }
    }

    pub fn with_unlocking_field(mut self, field: UnlockingField) -> Self {
        self.unlocking_field = field;
        self
    }

    pub fn with_service_kind(mut self, kind: impl Into<String>) -> Self {
        self.service_kind = kind.into();
        self
    }

    pub fn view(&self) -> FeeView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeeView> {
        self.view.subscribe()
    }

    pub fn selection_state(&self) -> SelectionState {
        self.lock().machine.state()
    }

    pub fn current_ticket(&self) -> Option<SelectionTicket> {
        self.lock().machine.current_ticket()
    }

    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        self.lock().machine.is_current(ticket)
    }

    /// Choose a currency. Returns the new ticket when this completed or
    /// changed the selection; the record has already been cleared by then.
    pub fn select_currency(&self, currency: Currency) -> Option<SelectionTicket> {
        self.transition(|machine| machine.choose_currency(currency))
    }

    pub fn select_direction(&self, direction: Direction) -> Option<SelectionTicket> {
        self.transition(|machine| machine.choose_direction(direction))
    }

    /// Issue the authoritative and self-published fetches for `ticket`.
    pub async fn refresh(&self, ticket: &SelectionTicket) -> RefreshOutcome {
        let (authoritative, self_published) = tokio::join!(
            self.fetch_authoritative_for(ticket),
            self.fetch_self_published_for(ticket)
        );
        RefreshOutcome {
            authoritative,
            self_published,
        }
    }

    pub fn set_edit_value(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.update(|state| {
            if state.machine.selection().is_none() {
                return Err(Precondition::SelectionIncomplete.into());
            }
            state.record.edit_value = Some(text);
            Ok(())
        })
    }

    pub async fn fetch_authoritative(&self) -> Result<Delivery> {
        let ticket = self.require_ticket()?;
        self.fetch_authoritative_for(&ticket).await
    }

    pub async fn fetch_authoritative_for(&self, ticket: &SelectionTicket) -> Result<Delivery> {
        let selection = ticket.selection();
        let field = selection.direction.fee_field(self.unlocking_field);
        let response = self
            .gateway
            .call(
                "get_foreign_fee",
                self.fees.foreign_fee(selection.currency, field),
            )
            .await;
        match response {
            Ok(value) => {
                let delivery = self.apply(ticket, |state| state.record.set_confirmed(value));
                trace_delivery(ticket, "get_foreign_fee", delivery);
                Ok(delivery)
            }
            Err(err) => {
                let delivery = self.apply(ticket, |state| state.record.clear_confirmed());
                self.surface(ticket, delivery, err)
            }
        }
    }

    pub async fn save(&self, value: &str) -> Result<Delivery> {
        let ticket = self.require_ticket()?;
        self.save_for(&ticket, value).await
    }

    /// Save whatever is currently in the edit buffer.
    pub async fn save_staged(&self) -> Result<Delivery> {
        let (ticket, staged) = {
            let state = self.lock();
            let ticket = state
                .machine
                .current_ticket()
                .ok_or(Precondition::SelectionIncomplete)?;
            let staged = state
                .record
                .edit_value
                .clone()
                .filter(|value| !value.trim().is_empty())
                .ok_or(Precondition::NothingStaged)?;
            (ticket, staged)
        };
        self.save_for(&ticket, &staged).await
    }

    async fn save_for(&self, ticket: &SelectionTicket, value: &str) -> Result<Delivery> {
        let selection = ticket.selection();
        let field = selection.direction.fee_field(self.unlocking_field);
        let response = self
            .gateway
            .call(
                "update_foreign_fee",
                self.fees
                    .update_foreign_fee(selection.currency, field, value),
            )
            .await;
        match response {
            Ok(confirmed) => {
                let delivery = self.apply(ticket, |state| state.record.set_confirmed(confirmed));
                if delivery == Delivery::Applied {
                    info!(target: "fee_sync::sync", key = %ticket.key(), "fee saved");
                }
                trace_delivery(ticket, "update_foreign_fee", delivery);
                Ok(delivery)
            }
            Err(err) => {
                if !self.is_current(ticket) {
                    trace_delivery(ticket, "update_foreign_fee", Delivery::Discarded);
                    return Ok(Delivery::Discarded);
                }
                warn!(
                    target: "fee_sync::sync",
                    key = %ticket.key(),
                    error = %err,
                    "save failed; resynchronizing with the authority"
                );
                if let Err(resync) = self.fetch_authoritative_for(ticket).await {
                    warn!(target: "fee_sync::sync", key = %ticket.key(), error = %resync, "resync after failed save failed");
                }
                Err(err.into())
            }
        }
    }

    pub async fn publish(&self, value: &str) -> Result<Delivery> {
        let ticket = self.require_ticket()?;
        let identity = self
            .session
            .identity()
            .ok_or(Precondition::IdentityUnavailable)?;
        let data = encoding::to_transport(value);
        self.gateway
            .call(
                "publish_resource",
                self.store.publish(
                    &identity.registered_name,
                    &self.service_kind,
                    ticket.key().as_str(),
                    &data,
                ),
            )
            .await
            .map_err(|err| {
                warn!(target: "fee_sync::sync", key = %ticket.key(), error = %err, "publish failed");
                EngineError::from(err)
            })?;
        info!(
            target: "fee_sync::sync",
            key = %ticket.key(),
            name = %identity.registered_name,
            "fee published"
        );
        self.fetch_self_published_for(&ticket).await
    }

    pub async fn fetch_self_published(&self) -> Result<Delivery> {
        let ticket = self.require_ticket()?;
        self.fetch_self_published_for(&ticket).await
    }

    pub async fn fetch_self_published_for(&self, ticket: &SelectionTicket) -> Result<Delivery> {
        let Some(identity) = self.session.identity() else {
            self.apply(ticket, |state| state.record.published_self = None);
            return Err(Precondition::IdentityUnavailable.into());
        };
        match self.lookup(&identity.registered_name, ticket).await {
            Ok(found) => {
                let delivery = self.apply(ticket, |state| state.record.published_self = found);
                trace_delivery(ticket, "fetch_resource", delivery);
                Ok(delivery)
            }
            Err(err) => {
                let delivery = self.apply(ticket, |state| state.record.published_self = None);
                self.surface(ticket, delivery, err)
            }
        }
    }

    /// Look up what `name` published for the current selection.
    pub async fn fetch_other_published(&self, name: &str) -> Result<Delivery> {
        let name = name.trim().to_string();
        let ticket = self.update(|state| {
            let ticket = state.machine.current_ticket();
            state.record.published_other = None;
            state.other_name = match &ticket {
                Some(_) if !name.is_empty() => Some(name.clone()),
                _ => None,
            };
            ticket
        });
        let ticket = ticket.ok_or(Precondition::SelectionIncomplete)?;
        if name.is_empty() {
            return Err(Precondition::EmptyName.into());
        }
        let response = self.lookup(&name, &ticket).await;
        let outcome = response.as_ref().ok().cloned().flatten();
        let delivery = self.update(|state| {
            let current = state.machine.is_current(&ticket)
                && state.other_name.as_deref() == Some(name.as_str());
            if !current {
                return Delivery::Discarded;
            }
            state.record.published_other = outcome;
            Delivery::Applied
        });
        match response {
            Ok(_) => {
                trace_delivery(&ticket, "fetch_resource", delivery);
                Ok(delivery)
            }
            Err(err) => self.surface(&ticket, delivery, err),
        }
    }

    /// Copy a published value into the edit buffer. `savedValue` is untouched.
    pub fn match_from(&self, source: PublishedSource) -> Result<String> {
        self.update(|state| {
            if state.machine.selection().is_none() {
                return Err(Precondition::SelectionIncomplete.into());
            }
            let published = match source {
                PublishedSource::SelfPublished => state.record.published_self.clone(),
                PublishedSource::Other => state.record.published_other.clone(),
            };
            let value = published.ok_or(Precondition::NothingPublished)?;
            state.record.edit_value = Some(value.clone());
            Ok(value)
        })
    }

    /// Ask the node to sign every pending fee transaction. The signing status
    /// follows later through the heartbeat channel.
    pub async fn sign_all_unsigned(&self) -> Result<()> {
        self.gateway
            .call("sign_foreign_fees", self.obligations.sign_all())
            .await
            .map_err(|err| {
                warn!(target: "fee_sync::sync", error = %err, "signing request failed");
                EngineError::from(err)
            })?;
        info!(target: "fee_sync::sync", "signing requested for pending fee transactions");
        Ok(())
    }

    async fn lookup(
        &self,
        name: &str,
        ticket: &SelectionTicket,
    ) -> std::result::Result<Option<String>, GatewayError> {
        self.gateway
            .call(
                "fetch_resource",
                self.store
                    .fetch(name, &self.service_kind, ticket.key().as_str()),
            )
            .await
    }

    fn require_ticket(&self) -> Result<SelectionTicket> {
        self.current_ticket()
            .ok_or_else(|| Precondition::SelectionIncomplete.into())
    }

    fn transition(
        &self,
        choose: impl FnOnce(&mut SelectionMachine) -> Transition,
    ) -> Option<SelectionTicket> {
        self.update(|state| match choose(&mut state.machine) {
            Transition::Entered(ticket) => {
                state.record = FeeRecord::default();
                state.other_name = None;
                info!(
                    target: "fee_sync::sync",
                    key = %ticket.key(),
                    epoch = ticket.epoch(),
                    "selection changed"
                );
                Some(ticket)
            }
            Transition::Partial | Transition::Unchanged => None,
        })
    }

    fn apply(&self, ticket: &SelectionTicket, write: impl FnOnce(&mut SyncState)) -> Delivery {
        self.update(|state| {
            if state.machine.is_current(ticket) {
                write(state);
                Delivery::Applied
            } else {
                Delivery::Discarded
            }
        })
    }

    fn surface(
        &self,
        ticket: &SelectionTicket,
        delivery: Delivery,
        err: GatewayError,
    ) -> Result<Delivery> {
        match delivery {
            Delivery::Discarded => {
                trace_delivery(ticket, err.op(), delivery);
                Ok(Delivery::Discarded)
            }
            Delivery::Applied => {
                warn!(target: "fee_sync::sync", key = %ticket.key(), error = %err, "remote call failed");
                Err(err.into())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The view is published while the lock is held so watchers observe
    // updates in the order they were made.
    fn update<R>(&self, change: impl FnOnce(&mut SyncState) -> R) -> R {
        let mut state = self.lock();
        let out = change(&mut state);
        let view = state.view();
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
        out
    }
}

fn trace_delivery(ticket: &SelectionTicket, op: &'static str, delivery: Delivery) {
    if delivery == Delivery::Discarded {
        debug!(
            target: "fee_sync::sync",
            op,
            key = %ticket.key(),
            epoch = ticket.epoch(),
            "discarding response for a superseded selection"
        );
    }
}
