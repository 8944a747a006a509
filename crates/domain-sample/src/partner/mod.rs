//! # Partner Namespace
//!
//! Read access for partners plus order intake. These commands are public: any domain may call
//! them, and the calling domain picks the serializer.

use crate::lifecycle::Backoffice;
use crate::model::{Order, User};
use crate::operations::{Add, Find, Mount, QueryResources, Search};

/// The namespace owned by the partner domain.
pub const NAMESPACE: &str = module_path!();

fn users(system: &Backoffice) -> Mount<User> {
    Mount::public(
        NAMESPACE,
        system.users.clone(),
        system.serializers.users.clone(),
    )
}

fn orders(system: &Backoffice) -> Mount<Order> {
    Mount::public(
        NAMESPACE,
        system.orders.clone(),
        system.serializers.orders.clone(),
    )
}

pub fn find_user(system: &Backoffice) -> Find<User> {
    Find::new(users(system))
}

pub fn search_users(system: &Backoffice) -> Search<User> {
    Search::new(users(system))
}

pub fn query_users(system: &Backoffice) -> QueryResources<User> {
    QueryResources::new(users(system))
}

pub fn query_orders(system: &Backoffice) -> QueryResources<Order> {
    QueryResources::new(orders(system))
}

pub fn add_order(system: &Backoffice) -> Add<Order> {
    Add::new(orders(system))
}
