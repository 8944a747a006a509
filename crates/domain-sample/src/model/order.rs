use crate::store::{Record, StoreError};
use domain_framework::{FieldErrors, Resource, Schema, Shape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Represents a customer order.
///
/// Orders move through `pending -> paid -> shipped`; a pending order can also be
/// cancelled. Totals are kept in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<u32>,
    pub user_id: u32,
    pub total: i64,
    pub state: OrderState,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Paid,
    Shipped,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Paid => "paid",
            OrderState::Shipped => "shipped",
            OrderState::Cancelled => "cancelled",
        }
    }
}

/// Payload for creating a new order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderCreate {
    pub user_id: u32,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderUpdate {
    pub total: Option<i64>,
}

impl Resource for Order {
    fn model_name(&self) -> &'static str {
        Self::MODEL
    }

    fn key(&self) -> Option<Value> {
        self.id.map(Value::from)
    }

    fn read(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(json!(self.id)),
            "user_id" => Some(json!(self.user_id)),
            "total" => Some(json!(self.total)),
            "state" => Some(json!(self.state.as_str())),
            "tracking_number" => Some(json!(self.tracking_number)),
            _ => None,
        }
    }

    fn errors(&self) -> FieldErrors {
        self.validate()
    }
}

impl Record for Order {
    const MODEL: &'static str = "Order";
    const TABLE: &'static str = "orders";

    type Create = OrderCreate;
    type Update = OrderUpdate;

    fn id(&self) -> Option<u32> {
        self.id
    }

    fn assign_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    fn from_create_params(params: OrderCreate) -> Self {
        Self {
            id: None,
            user_id: params.user_id,
            total: params.total,
            state: OrderState::Pending,
            tracking_number: None,
        }
    }

    fn on_update(&mut self, update: OrderUpdate) {
        if let Some(total) = update.total {
            self.total = total;
        }
    }

    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.user_id == 0 {
            errors.add("user_id", "must be filled");
        }
        if self.total < 0 {
            errors.add("total", "must be greater than or equal to 0");
        }
        if self.state == OrderState::Shipped && self.tracking_number.is_none() {
            errors.add("tracking_number", "must be filled");
        }
        errors
    }

    fn create_contract() -> Schema {
        Schema::new()
            .required("user_id", Shape::integer().filled())
            .required("total", Shape::integer())
    }

    fn update_contract() -> Schema {
        Schema::new().optional("total", Shape::integer())
    }

    /// Paid and shipped orders are kept for accounting.
    fn on_delete(&self) -> Result<(), StoreError> {
        match self.state {
            OrderState::Pending | OrderState::Cancelled => Ok(()),
            OrderState::Paid | OrderState::Shipped => Err(StoreError::Refused {
                model: Self::MODEL,
                event: "delete".to_string(),
            }),
        }
    }

    /// Shipped and cancelled orders don't have outgoing transitions; paid orders can't
    /// be cancelled. Shipping needs a tracking number.
    fn may_transition(&self, event: &str, attrs: &Value) -> bool {
        match (event, self.state) {
            ("pay", OrderState::Pending) | ("cancel", OrderState::Pending) => true,
            ("ship", OrderState::Paid) => attrs
                .get("tracking_number")
                .and_then(Value::as_str)
                .is_some_and(|number| !number.trim().is_empty()),
            _ => false,
        }
    }

    fn transition(&mut self, event: &str, attrs: &Value) -> Result<(), StoreError> {
        match event {
            "pay" => self.state = OrderState::Paid,
            "cancel" => self.state = OrderState::Cancelled,
            "ship" => {
                self.tracking_number = attrs
                    .get("tracking_number")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.state = OrderState::Shipped;
            }
            _ => {
                return Err(StoreError::Refused {
                    model: Self::MODEL,
                    event: event.to_string(),
                })
            }
        }
        Ok(())
    }
}
