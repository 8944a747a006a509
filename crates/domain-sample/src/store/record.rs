//! # Record Trait
//!
//! The contract every stored model (User, Address, Order) implements to be managed by a
//! [`Table`](super::Table). Writing the table logic once against this trait gives every
//! model the same insert/update/delete/transition behaviour.
//!
//! Associated types keep the payloads apart: a `User` is created from a `UserCreate` and
//! can't be handed an `OrderCreate` by mistake. Both payloads are deserialized from
//! operation params, so they derive `Deserialize`.
//!
//! # Provided Methods (Hooks)
//! - [`Record::on_delete`]
//! - [`Record::may_transition`] / [`Record::transition`]
//!
//! The defaults allow deletion and refuse every transition.

use super::StoreError;
use domain_framework::{FieldErrors, Resource, Schema};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;

pub trait Record: Resource + Clone {
    /// Model name used in logs and in transition params.
    const MODEL: &'static str;

    /// Table name shown in query text.
    const TABLE: &'static str;

    /// Payload required to build a new record.
    type Create: DeserializeOwned + Debug;

    /// Partial payload applied by updates.
    type Update: DeserializeOwned + Debug;

    /// Assigned by the table on insert.
    fn id(&self) -> Option<u32>;

    fn assign_id(&mut self, id: u32);

    fn from_create_params(params: Self::Create) -> Self;

    fn on_update(&mut self, update: Self::Update);

    /// Validation rules of the record itself. An empty result means it can be saved.
    fn validate(&self) -> FieldErrors;

    /// Params accepted when creating the record.
    fn create_contract() -> Schema;

    /// Params accepted when updating the record, besides `id`.
    fn update_contract() -> Schema;

    /// Called before the record is removed. Returning an error keeps it.
    fn on_delete(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Whether `event` may fire now, given the attributes it would be applied with.
    fn may_transition(&self, _event: &str, _attrs: &Value) -> bool {
        false
    }

    /// Applies a state transition; only called after `may_transition` agreed.
    fn transition(&mut self, event: &str, _attrs: &Value) -> Result<(), StoreError> {
        Err(StoreError::Refused {
            model: Self::MODEL,
            event: event.to_string(),
        })
    }
}
