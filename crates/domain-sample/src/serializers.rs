//! # Serializers
//!
//! How each domain sees the stored models. The main (backoffice) domain sees contact details,
//! the address and the orders of a user. Partners only see a user's name and orders.
//!
//! References are resolved through the tables, so a view reads the current state of the
//! related rows when a reference accessor is called, not when the view is built.

use crate::model::{Address, Order, User};
use crate::store::{Record, Table};
use domain_framework::mock::MemoryQuery;
use domain_framework::{DomainSerializers, QueryError, Serializer, SerializerError, MAIN_DOMAIN};

pub const PARTNER_DOMAIN: &str = "partner";

/// Per-domain serializers of every model.
#[derive(Clone)]
pub struct Serializers {
    pub users: DomainSerializers<User>,
    pub orders: DomainSerializers<Order>,
    pub addresses: DomainSerializers<Address>,
}

impl Serializers {
    pub fn new(
        users: &Table<User>,
        orders: &Table<Order>,
        addresses: &Table<Address>,
    ) -> Result<Self, SerializerError> {
        let address = address_serializer()?;
        let user_summary = user_summary_serializer()?;
        let main_order = order_serializer(users, user_summary)?;
        let partner_order = partner_order_serializer()?;

        let main_user = Serializer::builder("UserSerializer")
            .attribute("id")
            .attribute("name")
            .attribute_if("email", User::email_present)
            .attribute("phone_number")
            .attribute("status")
            .references_one(
                "address",
                lookup(addresses, |user: &User| user.address_id),
                address.clone(),
            )
            .references_many("orders", orders_of(orders), main_order.clone())
            .build()?;
        let partner_user = Serializer::builder("PartnerUserSerializer")
            .attribute("id")
            .attribute("name")
            .references_many("orders", orders_of(orders), partner_order.clone())
            .build()?;

        Ok(Self {
            users: DomainSerializers::new(main_user.clone())
                .with(MAIN_DOMAIN, main_user)
                .with(PARTNER_DOMAIN, partner_user),
            orders: DomainSerializers::new(main_order.clone())
                .with(MAIN_DOMAIN, main_order)
                .with(PARTNER_DOMAIN, partner_order),
            addresses: DomainSerializers::new(address),
        })
    }
}

fn address_serializer() -> Result<Serializer<Address>, SerializerError> {
    Serializer::builder("AddressSerializer")
        .attribute("id")
        .attribute("street")
        .attribute("city")
        .attribute("postal_code")
        .build()
}

/// Users as seen from their orders. No references back, so views don't cycle.
fn user_summary_serializer() -> Result<Serializer<User>, SerializerError> {
    Serializer::builder("UserSummarySerializer")
        .attribute("id")
        .attribute("name")
        .build()
}

fn order_serializer(
    users: &Table<User>,
    user_summary: Serializer<User>,
) -> Result<Serializer<Order>, SerializerError> {
    Serializer::builder("OrderSerializer")
        .attribute("id")
        .attribute("total")
        .attribute("state")
        .attribute_if("tracking_number", |order: &Order| order.tracking_number.is_some())
        .references_one("user", lookup(users, |order: &Order| Some(order.user_id)), user_summary)
        .build()
}

fn partner_order_serializer() -> Result<Serializer<Order>, SerializerError> {
    Serializer::builder("PartnerOrderSerializer")
        .attribute("id")
        .attribute("total")
        .attribute("state")
        .build()
}

/// Fetches the row of `table` whose id `key` reads off the owner.
fn lookup<O, T>(
    table: &Table<T>,
    key: impl Fn(&O) -> Option<u32> + Send + Sync + 'static,
) -> impl Fn(&O) -> Result<Option<T>, QueryError> + Send + Sync + 'static
where
    O: 'static,
    T: Record,
{
    let table = table.clone();
    move |owner: &O| match key(owner) {
        Some(id) => table
            .get(id)
            .map_err(|e| QueryError::Storage(e.to_string())),
        None => Ok(None),
    }
}

fn orders_of(
    orders: &Table<Order>,
) -> impl Fn(&User) -> MemoryQuery<Order> + Send + Sync + 'static {
    let orders = orders.clone();
    move |user: &User| orders.query().where_eq("user_id", user.id)
}
