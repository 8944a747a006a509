use super::{
    rejected, table_id, Mount, NOT_FOUND, RESOURCE_NOT_FOUND, UNABLE_TO_TRANSITION,
};
use crate::store::{Record, StoreError};
use domain_framework::{
    Command, Context, Contract, DomainError, DomainKey, Fault, Outcome, Params, Schema,
    Serializer, Shape, ValueKind,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

fn id_schema() -> Schema {
    Schema::new().required("id", Shape::integer().filled())
}

fn relation_schema() -> Schema {
    Schema::new()
        .optional("query", Shape::hash())
        .optional("limit", Shape::hash())
        .optional("includes", Shape::array())
        .optional("order", Shape::string())
}

/// Deserializes a payload struct from the params of a request.
fn payload<P: DeserializeOwned>(params: Params) -> Result<P, Fault> {
    Ok(serde_json::from_value(Value::Object(params.into_map()))?)
}

macro_rules! mounted {
    () => {
        fn namespace(&self) -> &str {
            self.mount.namespace()
        }

        fn is_internal(&self) -> bool {
            self.mount.is_internal()
        }

        fn contract(&self) -> &dyn Contract {
            &self.contract
        }

        fn serializer(&self, domain: Option<&DomainKey>) -> Option<Serializer<T>> {
            self.mount.serializer(domain)
        }
    };
}

/// Finds one resource by `id`, optionally within a `limit` hash of equality conditions.
pub struct Find<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Find<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: id_schema().optional("limit", Shape::hash()),
        }
    }
}

impl<T: Record> Command for Find<T> {
    type Resource = T;
    const NAME: &'static str = "Find";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        match self.mount.find(ctx.params())? {
            Some(record) => Ok(Outcome::resource(record)),
            None => Err(DomainError::not_found(NOT_FOUND).into()),
        }
    }
}

/// Builds a record from the params and stores it.
pub struct Add<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Add<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: T::create_contract(),
        }
    }
}

impl<T: Record> Command for Add<T> {
    type Resource = T;
    const NAME: &'static str = "Add";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        let create: T::Create = payload(ctx.params().clone())?;
        debug!(model = T::MODEL, ?create, "Building record");
        let record = T::from_create_params(create);
        match self.mount.table().insert(record.clone()) {
            Ok(stored) => Ok(Outcome::resource(stored)),
            Err(e) => Err(rejected(ctx, record, e)),
        }
    }
}

/// Applies the params other than `id` to a stored record.
pub struct Update<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Update<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: id_schema().merge(T::update_contract()),
        }
    }
}

impl<T: Record> Command for Update<T> {
    type Resource = T;
    const NAME: &'static str = "Update";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        let params = ctx.params();
        let update: T::Update = payload(params.without(&["id"]))?;
        let table = self.mount.table();
        let Some(mut record) = table_id(params.integer("id")?)
            .map(|id| table.get(id))
            .transpose()?
            .flatten()
        else {
            return Err(DomainError::not_found(RESOURCE_NOT_FOUND).into());
        };
        record.on_update(update);
        match table.save(record.clone()) {
            Ok(stored) => Ok(Outcome::resource(stored)),
            Err(e) => Err(rejected(ctx, record, e)),
        }
    }
}

/// Deletes a stored record.
pub struct Remove<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Remove<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: id_schema(),
        }
    }
}

impl<T: Record> Command for Remove<T> {
    type Resource = T;
    const NAME: &'static str = "Remove";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        let table = self.mount.table();
        let Some(id) = table_id(ctx.params().integer("id")?) else {
            return Err(DomainError::not_found(RESOURCE_NOT_FOUND).into());
        };
        let Some(record) = table.get(id)? else {
            return Err(DomainError::not_found(RESOURCE_NOT_FOUND).into());
        };
        match table.delete(id) {
            Ok(_) => Ok(Outcome::value(true)),
            Err(e) => Err(rejected(ctx, record, e)),
        }
    }
}

/// One page of matching resources.
pub struct Search<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Search<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: relation_schema()
                .optional("page", Shape::integer())
                .optional("per", Shape::integer()),
        }
    }
}

impl<T: Record> Command for Search<T> {
    type Resource = T;
    const NAME: &'static str = "Search";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        let params = ctx.params();
        let page = optional_count(params, "page")?;
        let per = optional_count(params, "per")?;
        let page = self.mount.relation(ctx)?.paginate(page, per)?;
        let (total_count, total_pages) = (page.total_count, page.total_pages);
        Ok(Outcome::page(page)
            .with_meta("total_count", total_count)
            .with_meta("total_pages", total_pages))
    }
}

/// Reads a non-negative integer param, `0` when absent.
fn optional_count(params: &Params, key: &str) -> Result<usize, Fault> {
    if !params.contains_key(key) {
        return Ok(0);
    }
    Ok(usize::try_from(params.integer(key)?).unwrap_or(0))
}

/// A lazy relation over matching resources. Nothing is read until the caller materializes it.
pub struct QueryResources<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> QueryResources<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: relation_schema(),
        }
    }
}

impl<T: Record> Command for QueryResources<T> {
    type Resource = T;
    const NAME: &'static str = "QueryResources";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        Ok(Outcome::relation(self.mount.relation(ctx)?))
    }
}

/// Fires a state machine event on a stored record.
pub struct Transition<T> {
    mount: Mount<T>,
    contract: Schema,
}

impl<T: Record> Transition<T> {
    pub fn new(mount: Mount<T>) -> Self {
        Self {
            mount,
            contract: id_schema()
                .required("model_name", Shape::string().filled())
                .required("event", Shape::string())
                .optional(
                    "attrs",
                    Shape::of(&[ValueKind::Hash, ValueKind::Array]).maybe(),
                )
                .optional("limit", Shape::hash()),
        }
    }
}

impl<T: Record> Command for Transition<T> {
    type Resource = T;
    const NAME: &'static str = "Transition";

    mounted!();

    fn operate(&mut self, ctx: &Context<'_, T>) -> Result<Outcome<T>, Fault> {
        let params = ctx.params();
        if params.string("model_name")? != T::MODEL {
            return Err(DomainError::not_found(NOT_FOUND).into());
        }
        let Some(mut record) = self.mount.find(params)? else {
            return Err(DomainError::not_found(NOT_FOUND).into());
        };
        let event = params.string("event")?;
        let attrs = params.get("attrs").cloned().unwrap_or(Value::Null);
        if !record.may_transition(event, &attrs) {
            return Err(DomainError::refused(UNABLE_TO_TRANSITION)
                .with_data(ctx.serialize(record)?)
                .into());
        }
        let stored = record
            .transition(event, &attrs)
            .and_then(|()| self.mount.table().save(record.clone()));
        match stored {
            Ok(stored) => Ok(Outcome::resource(stored)),
            Err(StoreError::Invalid { .. } | StoreError::Refused { .. }) => {
                Err(DomainError::refused(UNABLE_TO_TRANSITION)
                    .with_data(ctx.serialize(record)?)
                    .into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
