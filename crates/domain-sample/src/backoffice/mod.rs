//! # Backoffice Namespace
//!
//! Commands of the main domain. They are all internal: calling them from another domain fails
//! with `cross-domain-not-allowed`.

use crate::lifecycle::Backoffice;
use crate::model::{Address, Order, User};
use crate::operations::{Add, Find, Mount, QueryResources, Remove, Search, Transition, Update};

/// The namespace owned by the main domain.
pub const NAMESPACE: &str = module_path!();

fn users(system: &Backoffice) -> Mount<User> {
    Mount::internal(
        NAMESPACE,
        system.users.clone(),
        system.serializers.users.clone(),
    )
}

fn orders(system: &Backoffice) -> Mount<Order> {
    Mount::internal(
        NAMESPACE,
        system.orders.clone(),
        system.serializers.orders.clone(),
    )
}

fn addresses(system: &Backoffice) -> Mount<Address> {
    Mount::internal(
        NAMESPACE,
        system.addresses.clone(),
        system.serializers.addresses.clone(),
    )
}

pub fn find_user(system: &Backoffice) -> Find<User> {
    Find::new(users(system))
}

pub fn add_user(system: &Backoffice) -> Add<User> {
    Add::new(users(system))
}

pub fn update_user(system: &Backoffice) -> Update<User> {
    Update::new(users(system))
}

pub fn remove_user(system: &Backoffice) -> Remove<User> {
    Remove::new(users(system))
}

pub fn search_users(system: &Backoffice) -> Search<User> {
    Search::new(users(system))
}

pub fn query_users(system: &Backoffice) -> QueryResources<User> {
    QueryResources::new(users(system))
}

pub fn transition_user(system: &Backoffice) -> Transition<User> {
    Transition::new(users(system))
}

pub fn add_order(system: &Backoffice) -> Add<Order> {
    Add::new(orders(system))
}

pub fn remove_order(system: &Backoffice) -> Remove<Order> {
    Remove::new(orders(system))
}

pub fn query_orders(system: &Backoffice) -> QueryResources<Order> {
    QueryResources::new(orders(system))
}

pub fn transition_order(system: &Backoffice) -> Transition<Order> {
    Transition::new(orders(system))
}

pub fn add_address(system: &Backoffice) -> Add<Address> {
    Add::new(addresses(system))
}
