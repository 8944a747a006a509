use crate::model::{Address, Order, OrderState, User};
use crate::serializers::Serializers;
use crate::settings::Settings;
use crate::store::Table;
use domain_framework::{
    Command, Condition, DomainKey, DomainRegistry, Operation, Params, SerializerError,
};
use std::sync::Arc;
use tracing::info;

/// The sample application: registry, tables and serializers.
#[derive(Clone)]
pub struct Backoffice {
    registry: Arc<DomainRegistry>,
    pub users: Table<User>,
    pub orders: Table<Order>,
    pub addresses: Table<Address>,
    pub serializers: Serializers,
}

impl Backoffice {
    /// A system with the default domains.
    pub fn new() -> Result<Self, SerializerError> {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Result<Self, SerializerError> {
        let registry = Arc::new(settings.registry());
        let users = Table::new();
        let orders = Table::new()
            .with_scope(
                "pending",
                Condition::eq("state", OrderState::Pending.as_str()).into(),
            )
            .with_scope(
                "shipped",
                Condition::eq("state", OrderState::Shipped.as_str()).into(),
            );
        let addresses = Table::new();
        let serializers = Serializers::new(&users, &orders, &addresses)?;
        info!(domains = registry.len(), "Backoffice ready");
        Ok(Self {
            registry,
            users,
            orders,
            addresses,
            serializers,
        })
    }

    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    /// Wraps `command` into an operation called from `domain` with `params`.
    pub fn operation<C: Command>(
        &self,
        command: C,
        domain: Option<&str>,
        params: Params,
    ) -> Operation<C> {
        Operation::new(
            command,
            Arc::clone(&self.registry),
            domain.map(DomainKey::from),
            params,
        )
    }
}
