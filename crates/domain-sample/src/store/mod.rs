//! # Storage
//!
//! In-memory persistence for the sample application: the [`Record`] contract implemented by
//! every model and the generic [`Table`] that stores them.

mod record;
mod table;

pub use record::Record;
pub use table::Table;

use domain_framework::FieldErrors;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{model} {id} not found")]
    NotFound { model: &'static str, id: u32 },

    #[error("{model} is invalid: {}", .errors.to_sentence())]
    Invalid {
        model: &'static str,
        errors: FieldErrors,
    },

    #[error("{0} has not been saved yet")]
    NotPersisted(&'static str),

    #[error("{model} cannot {event}")]
    Refused { model: &'static str, event: String },

    #[error("{0} table lock poisoned")]
    LockPoisoned(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Order, OrderCreate, User, UserCreate, UserUpdate};
    use domain_framework::{Condition, Query};

    fn user(name: &str, email: Option<&str>) -> UserCreate {
        UserCreate {
            name: name.into(),
            email: email.map(str::to_string),
            phone_number: None,
            address_id: None,
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let users = Table::<User>::new();
        let ada = users.create(user("Ada", Some("ada@example.com"))).unwrap();
        let bob = users.create(user("Bob", None)).unwrap();
        assert_eq!(ada.id, Some(1));
        assert_eq!(bob.id, Some(2));
        assert_eq!(users.len().unwrap(), 2);
    }

    #[test]
    fn test_invalid_records_are_not_stored() {
        let users = Table::<User>::new();
        let error = users.create(user("", Some("not-an-email"))).unwrap_err();
        match error {
            StoreError::Invalid { errors, .. } => {
                assert_eq!(errors.get("name"), ["must be filled"]);
                assert_eq!(errors.get("email"), ["is invalid"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(users.is_empty().unwrap());
    }

    #[test]
    fn test_update_and_delete() {
        let users = Table::<User>::new();
        let ada = users.create(user("Ada", None)).unwrap();
        let id = ada.id.unwrap();
        let updated = users
            .update(
                id,
                UserUpdate {
                    name: Some("Ada L.".into()),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(users.get(id).unwrap().unwrap().name, "Ada L.");

        users.delete(id).unwrap();
        assert!(users.get(id).unwrap().is_none());
        assert!(matches!(
            users.delete(id),
            Err(StoreError::NotFound { model: "User", .. })
        ));
    }

    #[test]
    fn test_queries_see_later_writes_and_scopes() {
        let orders = Table::<Order>::new()
            .with_scope("pending", Condition::eq("state", "pending").into());
        let query = orders.query();
        assert_eq!(query.count().unwrap(), 0);

        orders
            .create(OrderCreate {
                user_id: 1,
                total: 1200,
            })
            .unwrap();
        let mut pending = orders.query();
        pending.scope("pending");
        assert_eq!(pending.count().unwrap(), 1);
        assert_eq!(orders.stats().executions(), 2);
    }
}
