//! Stored models of the sample application.

mod address;
mod order;
mod user;

pub use address::{Address, AddressCreate, AddressUpdate};
pub use order::{Order, OrderCreate, OrderState, OrderUpdate};
pub use user::{User, UserCreate, UserStatus, UserUpdate};
