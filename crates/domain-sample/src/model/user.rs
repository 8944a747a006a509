use crate::store::{Record, StoreError};
use domain_framework::{FieldErrors, Resource, Schema, Shape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Represents a customer account.
///
/// # Storage
/// This struct implements the [`Record`] trait, allowing it to be stored in a
/// [`Table`](crate::store::Table).
///
/// See [`impl Record for User`](#impl-Record-for-User) for details on:
/// - Creation parameters ([`UserCreate`])
/// - Update parameters ([`UserUpdate`])
/// - Transitions (`suspend`, `activate`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<u32>,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address_id: Option<u32>,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCreate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address_id: Option<u32>,
}

/// Payload for updating an existing user. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address_id: Option<u32>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: Some(email.into()),
            phone_number: None,
            address_id: None,
            status: UserStatus::Active,
        }
    }

    /// True when the user has a non-blank email address.
    pub fn email_present(&self) -> bool {
        self.email
            .as_deref()
            .is_some_and(|email| !email.trim().is_empty())
    }
}

impl Resource for User {
    fn model_name(&self) -> &'static str {
        Self::MODEL
    }

    fn key(&self) -> Option<Value> {
        self.id.map(Value::from)
    }

    fn read(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "email" => Some(json!(self.email)),
            "phone_number" => Some(json!(self.phone_number)),
            "address_id" => Some(json!(self.address_id)),
            "status" => Some(json!(self.status.as_str())),
            "email_present" => Some(json!(self.email_present())),
            _ => None,
        }
    }

    fn errors(&self) -> FieldErrors {
        self.validate()
    }
}

impl Record for User {
    const MODEL: &'static str = "User";
    const TABLE: &'static str = "users";

    type Create = UserCreate;
    type Update = UserUpdate;

    fn id(&self) -> Option<u32> {
        self.id
    }

    fn assign_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    fn from_create_params(params: UserCreate) -> Self {
        Self {
            id: None,
            name: params.name,
            email: params.email,
            phone_number: params.phone_number,
            address_id: params.address_id,
            status: UserStatus::Active,
        }
    }

    fn on_update(&mut self, update: UserUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
        if let Some(phone_number) = update.phone_number {
            self.phone_number = Some(phone_number);
        }
        if let Some(address_id) = update.address_id {
            self.address_id = Some(address_id);
        }
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "must be filled");
        }
        if self.email_present() && !self.email.as_deref().unwrap_or_default().contains('@') {
            errors.add("email", "is invalid");
        }
        errors
    }

    fn create_contract() -> Schema {
        Schema::new()
            .required("name", Shape::string().filled())
            .optional("email", Shape::string().maybe())
            .optional("phone_number", Shape::string().maybe())
            .optional("address_id", Shape::integer().maybe())
    }

    fn update_contract() -> Schema {
        Schema::new()
            .optional("name", Shape::string().filled())
            .optional("email", Shape::string())
            .optional("phone_number", Shape::string())
            .optional("address_id", Shape::integer())
    }

    fn may_transition(&self, event: &str, _attrs: &Value) -> bool {
        matches!(
            (event, self.status),
            ("suspend", UserStatus::Active) | ("activate", UserStatus::Suspended)
        )
    }

    fn transition(&mut self, event: &str, _attrs: &Value) -> Result<(), StoreError> {
        self.status = match event {
            "suspend" => UserStatus::Suspended,
            "activate" => UserStatus::Active,
            _ => {
                return Err(StoreError::Refused {
                    model: Self::MODEL,
                    event: event.to_string(),
                })
            }
        };
        Ok(())
    }
}
