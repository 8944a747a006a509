use crate::store::Record;
use domain_framework::{FieldErrors, Resource, Schema, Shape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A postal address a user can point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<u32>,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
}

/// Payload for creating a new address.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressCreate {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressUpdate {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl Resource for Address {
    fn model_name(&self) -> &'static str {
        Self::MODEL
    }

    fn key(&self) -> Option<Value> {
        self.id.map(Value::from)
    }

    fn read(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(json!(self.id)),
            "street" => Some(json!(self.street)),
            "city" => Some(json!(self.city)),
            "postal_code" => Some(json!(self.postal_code)),
            _ => None,
        }
    }

    fn errors(&self) -> FieldErrors {
        self.validate()
    }
}

impl Record for Address {
    const MODEL: &'static str = "Address";
    const TABLE: &'static str = "addresses";

    type Create = AddressCreate;
    type Update = AddressUpdate;

    fn id(&self) -> Option<u32> {
        self.id
    }

    fn assign_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    fn from_create_params(params: AddressCreate) -> Self {
        Self {
            id: None,
            street: params.street,
            city: params.city,
            postal_code: params.postal_code,
        }
    }

    fn on_update(&mut self, update: AddressUpdate) {
        if let Some(street) = update.street {
            self.street = street;
        }
        if let Some(city) = update.city {
            self.city = city;
        }
        if let Some(postal_code) = update.postal_code {
            self.postal_code = Some(postal_code);
        }
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.street.trim().is_empty() {
            errors.add("street", "must be filled");
        }
        if self.city.trim().is_empty() {
            errors.add("city", "must be filled");
        }
        errors
    }

    fn create_contract() -> Schema {
        Schema::new()
            .required("street", Shape::string().filled())
            .required("city", Shape::string().filled())
            .optional("postal_code", Shape::string().maybe())
    }

    fn update_contract() -> Schema {
        Schema::new()
            .optional("street", Shape::string().filled())
            .optional("city", Shape::string().filled())
            .optional("postal_code", Shape::string())
    }
}
