//! # Operation Engine
//!
//! A [`Command`] is the body of one domain action: its contract, its serializer and its
//! `operate` step. An [`Operation`] wraps a command with the params and calling domain of a
//! single request and drives it through a fixed pipeline:
//!
//! 1. **Authorization.** Internal commands may only run from the domain that owns their
//!    namespace. A mismatch fails with `cross-domain-not-allowed` and leaves the operation
//!    unperformed, so it can be retried from the right domain.
//! 2. **At most once.** A performed operation answers `already-performed` and keeps its
//!    first result.
//! 3. **Validation.** The params are checked against the command contract; a rejection is
//!    terminal.
//! 4. **Execution.** `operate` runs under a guard that marks the operation performed however
//!    it exits. Errors and panics become failures; nothing escapes `perform()`.
//!
//! ```rust,ignore
//! let mut operation = Operation::new(FindUser::new(users), registry, Some("main".into()), params);
//! let result = operation.perform();
//! assert!(result.is_success());
//! ```

use crate::error::{Fault, OperationError};
use crate::page::Page;
use crate::params::Params;
use crate::registry::{DomainKey, DomainRegistry};
use crate::relation::Relation;
use crate::resource::Resource;
use crate::result::{Meta, OperationRef, OperationResult, Payload};
use crate::serializer::Serializer;
use crate::validator::{Contract, Validator};
use crate::view::View;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// The body of a domain action.
pub trait Command {
    /// The resource type this command returns.
    type Resource: Resource;

    /// Name used in logs, errors and serialized results.
    const NAME: &'static str;

    /// Namespace the command was defined under, compared against the registry for
    /// internal commands.
    fn namespace(&self) -> &str;

    /// Internal commands may only run from the domain owning their namespace.
    fn is_internal(&self) -> bool {
        false
    }

    fn contract(&self) -> &dyn Contract;

    /// Serializer for the calling domain. `None` when the command never returns resources.
    fn serializer(&self, domain: Option<&DomainKey>) -> Option<Serializer<Self::Resource>>;

    /// Runs the action. Only called with params that passed the contract.
    fn operate(&mut self, ctx: &Context<'_, Self::Resource>) -> Result<Outcome<Self::Resource>, Fault>;
}

/// What an action sees while it runs.
pub struct Context<'a, R> {
    params: &'a Params,
    domain: Option<&'a DomainKey>,
    serializer: Option<Serializer<R>>,
}

impl<'a, R: Resource> Context<'a, R> {
    pub fn params(&self) -> &'a Params {
        self.params
    }

    pub fn domain(&self) -> Option<&'a DomainKey> {
        self.domain
    }

    pub fn serializer(&self) -> Result<&Serializer<R>, OperationError> {
        self.serializer.as_ref().ok_or_else(|| {
            OperationError::unspecified_message(format!(
                "no serializer configured for domain {}",
                self.domain.map(DomainKey::as_str).unwrap_or("<none>")
            ))
        })
    }

    /// Serializes a resource with the serializer of the calling domain.
    pub fn serialize(&self, resource: impl Into<Arc<R>>) -> Result<View, OperationError> {
        Ok(self.serializer()?.serialize(resource))
    }

    /// A lazy relation over `query`, serialized for the calling domain.
    pub fn relation<Q>(&self, query: Q) -> Result<Relation, OperationError>
    where
        Q: crate::query::Query<R> + Send + Sync,
    {
        Ok(Relation::new(query, self.serializer()?.clone()))
    }
}

/// Value returned by an action before serialization.
pub enum Output<R> {
    Resource(R),
    Resources(Vec<R>),
    Value(Value),
    View(View),
    Relation(Relation),
    Page(Page),
    Map(Vec<(String, Output<R>)>),
    List(Vec<Output<R>>),
}

impl<R: Resource> Output<R> {
    /// Serializes resources through `serializer`, recursing into maps and lists.
    fn into_payload(self, serializer: Option<&Serializer<R>>) -> Result<Payload, OperationError> {
        let require = || {
            serializer.ok_or_else(|| {
                OperationError::unspecified_message("no serializer configured for resource output")
            })
        };
        Ok(match self {
            Output::Resource(resource) => Payload::View(require()?.serialize(resource)),
            Output::Resources(resources) => {
                let serializer = require()?;
                Payload::List(
                    resources
                        .into_iter()
                        .map(|resource| Payload::View(serializer.serialize(resource)))
                        .collect(),
                )
            }
            Output::Value(value) => Payload::Value(value),
            Output::View(view) => Payload::View(view),
            Output::Relation(relation) => Payload::Relation(relation),
            Output::Page(page) => Payload::Page(page),
            Output::Map(entries) => Payload::Map(
                entries
                    .into_iter()
                    .map(|(key, output)| {
                        output.into_payload(serializer).map(|payload| (key, payload))
                    })
                    .collect::<Result<_, OperationError>>()?,
            ),
            Output::List(items) => Payload::List(
                items
                    .into_iter()
                    .map(|output| output.into_payload(serializer))
                    .collect::<Result<_, OperationError>>()?,
            ),
        })
    }
}

/// A successful action: its output plus optional metadata.
pub struct Outcome<R> {
    pub output: Output<R>,
    pub meta: Option<Meta>,
}

impl<R> Outcome<R> {
    pub fn new(output: Output<R>) -> Self {
        Self { output, meta: None }
    }

    pub fn resource(resource: R) -> Self {
        Self::new(Output::Resource(resource))
    }

    pub fn resources(resources: Vec<R>) -> Self {
        Self::new(Output::Resources(resources))
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::new(Output::Value(value.into()))
    }

    pub fn view(view: View) -> Self {
        Self::new(Output::View(view))
    }

    pub fn relation(relation: Relation) -> Self {
        Self::new(Output::Relation(relation))
    }

    pub fn page(page: Page) -> Self {
        Self::new(Output::Page(page))
    }

    pub fn map(entries: Vec<(String, Output<R>)>) -> Self {
        Self::new(Output::Map(entries))
    }

    pub fn list(items: Vec<Output<R>>) -> Self {
        Self::new(Output::List(items))
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta
            .get_or_insert_with(Meta::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Sets the flag when dropped, so execution counts as attempted on every exit path.
struct PerformedGuard<'a>(&'a mut bool);

impl Drop for PerformedGuard<'_> {
    fn drop(&mut self) {
        *self.0 = true;
    }
}

/// One request against a command.
pub struct Operation<C: Command> {
    command: C,
    registry: Arc<DomainRegistry>,
    domain: Option<DomainKey>,
    params: Params,
    result: Option<OperationResult>,
    performed: bool,
}

impl<C: Command> Operation<C> {
    pub fn new(
        command: C,
        registry: Arc<DomainRegistry>,
        domain: Option<DomainKey>,
        params: Params,
    ) -> Self {
        Self {
            command,
            registry,
            domain,
            params,
            result: None,
            performed: false,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn domain(&self) -> Option<&DomainKey> {
        self.domain.as_ref()
    }

    pub fn performed(&self) -> bool {
        self.performed
    }

    /// The stored result, absent until the first `perform()`.
    pub fn result(&self) -> Option<&OperationResult> {
        self.result.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_some_and(OperationResult::is_success)
    }

    pub fn is_failure(&self) -> bool {
        self.result.as_ref().is_some_and(OperationResult::is_failure)
    }

    fn reference(&self) -> OperationRef {
        OperationRef {
            name: C::NAME,
            params: self.params.clone(),
            domain: self.domain.clone(),
        }
    }

    fn authorize(&self) -> Result<(), OperationError> {
        if !self.command.is_internal() {
            return Ok(());
        }
        let expected = self.registry.domain_for(self.command.namespace());
        if expected == self.domain.as_ref() {
            return Ok(());
        }
        Err(OperationError::CrossDomainNotAllowed {
            operation: C::NAME,
            domain: self.domain.clone(),
            expected: expected.cloned(),
        })
    }

    fn store(&mut self, result: OperationResult) -> OperationResult {
        self.result = Some(result.clone());
        result
    }

    /// Runs the pipeline and returns the result. Never panics and never executes the
    /// action twice.
    pub fn perform(&mut self) -> OperationResult {
        let span = info_span!(
            "perform",
            operation = C::NAME,
            domain = self.domain.as_ref().map(DomainKey::as_str).unwrap_or("<none>")
        );
        let _entered = span.enter();

        if let Err(error) = self.authorize() {
            warn!(error = %error, "Authorization failed");
            let result = OperationResult::failure(error, None, self.reference());
            return self.store(result);
        }

        if self.performed {
            warn!("Operation already performed");
            return OperationResult::failure(
                OperationError::AlreadyPerformed { operation: C::NAME },
                None,
                self.reference(),
            );
        }

        debug!(params = ?self.params, "Validating params");
        let validation = Validator::new(self.command.contract()).validate(&self.params);
        if let Err(field_errors) = validation.into_result() {
            self.performed = true;
            let error = OperationError::Validation(field_errors);
            warn!(error = %error, "Validation failed");
            let result = OperationResult::failure(error, None, self.reference());
            return self.store(result);
        }

        let result = self.execute();
        match &result {
            OperationResult::Success { .. } => info!("Operation succeeded"),
            OperationResult::Failure { error, .. } => {
                warn!(kind = %error.kind(), error = %error, "Operation failed")
            }
        }
        self.store(result)
    }

    fn execute(&mut self) -> OperationResult {
        let reference = self.reference();
        let Operation {
            command,
            domain,
            params,
            performed,
            ..
        } = self;
        let _guard = PerformedGuard(performed);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let ctx = Context {
                params,
                domain: domain.as_ref(),
                serializer: command.serializer(domain.as_ref()),
            };
            let outcome = command.operate(&ctx).map_err(OperationError::from_fault)?;
            let payload = outcome.output.into_payload(ctx.serializer.as_ref())?;
            Ok::<_, OperationError>((payload, outcome.meta))
        }));

        match outcome {
            Ok(Ok((payload, meta))) => OperationResult::success(payload, meta, reference),
            Ok(Err(error)) => OperationResult::failure(error, None, reference),
            Err(panic) => OperationResult::failure(
                OperationError::unspecified_message(panic_message(panic.as_ref())),
                None,
                reference,
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "action panicked".to_string()
    }
}

/// Two operations are equal when they run the same command with the same params.
impl<C: Command> PartialEq for Operation<C> {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl<C: Command> fmt::Debug for Operation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &C::NAME)
            .field("domain", &self.domain)
            .field("params", &self.params)
            .field("performed", &self.performed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, ErrorKind};
    use crate::registry::DomainConfig;
    use crate::validator::{Schema, Shape};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    struct Note {
        id: u32,
        body: String,
    }

    impl Resource for Note {
        fn model_name(&self) -> &'static str {
            "Note"
        }

        fn key(&self) -> Option<Value> {
            Some(json!(self.id))
        }

        fn read(&self, attribute: &str) -> Option<Value> {
            match attribute {
                "id" => Some(json!(self.id)),
                "body" => Some(json!(self.body)),
                _ => None,
            }
        }
    }

    enum Behaviour {
        Succeed,
        NotFound,
        Io,
        Panic,
    }

    struct ReadNote {
        behaviour: Behaviour,
        namespace: &'static str,
        internal: bool,
        calls: Rc<Cell<usize>>,
        schema: Schema,
    }

    impl ReadNote {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                namespace: "app::backoffice",
                internal: false,
                calls: Rc::new(Cell::new(0)),
                schema: Schema::new().required("id", Shape::integer().filled()),
            }
        }
    }

    impl Command for ReadNote {
        type Resource = Note;
        const NAME: &'static str = "ReadNote";

        fn namespace(&self) -> &str {
            self.namespace
        }

        fn is_internal(&self) -> bool {
            self.internal
        }

        fn contract(&self) -> &dyn Contract {
            &self.schema
        }

        fn serializer(&self, _domain: Option<&DomainKey>) -> Option<Serializer<Note>> {
            Serializer::builder("NoteSerializer")
                .attribute("id")
                .attribute("body")
                .build()
                .ok()
        }

        fn operate(&mut self, ctx: &Context<'_, Note>) -> Result<Outcome<Note>, Fault> {
            self.calls.set(self.calls.get() + 1);
            let id = ctx.params().integer("id")? as u32;
            match self.behaviour {
                Behaviour::Succeed => Ok(Outcome::resource(Note {
                    id,
                    body: "hello".into(),
                })
                .with_meta("source", "memory")),
                Behaviour::NotFound => Err(DomainError::not_found("Not found").into()),
                Behaviour::Io => Err(std::io::Error::other("disk unplugged").into()),
                Behaviour::Panic => panic!("boom"),
            }
        }
    }

    fn registry() -> Arc<DomainRegistry> {
        Arc::new(
            DomainRegistry::new()
                .with(DomainConfig::new("main", Some("app::backoffice")))
                .with(DomainConfig::new("partner", Some("app::partner"))),
        )
    }

    fn operation(command: ReadNote, domain: Option<&str>, params: Value) -> Operation<ReadNote> {
        Operation::new(
            command,
            registry(),
            domain.map(DomainKey::from),
            Params::try_from(params).unwrap(),
        )
    }

    #[test]
    fn test_success_serializes_resource_and_keeps_meta() {
        let mut op = operation(ReadNote::new(Behaviour::Succeed), None, json!({ "id": 3 }));
        assert!(!op.is_success() && !op.is_failure());
        let result = op.perform();
        assert!(result.is_success());
        let view = result.value().and_then(Payload::as_view).unwrap();
        assert_eq!(view.to_json(), json!({ "id": 3, "body": "hello" }));
        assert_eq!(result.meta().unwrap()["source"], json!("memory"));
        assert!(op.performed());
        assert!(op.is_success());
    }

    #[test]
    fn test_second_perform_does_not_reexecute() {
        let command = ReadNote::new(Behaviour::Succeed);
        let calls = Rc::clone(&command.calls);
        let mut op = operation(command, None, json!({ "id": 3 }));
        assert!(op.perform().is_success());
        let second = op.perform();
        assert_eq!(second.error().unwrap().kind(), ErrorKind::AlreadyPerformed);
        assert_eq!(calls.get(), 1);
        assert!(op.result().unwrap().is_success());
    }

    #[test]
    fn test_validation_failure_is_terminal() {
        let command = ReadNote::new(Behaviour::Succeed);
        let calls = Rc::clone(&command.calls);
        let mut op = operation(command, None, json!({}));
        let result = op.perform();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Validation);
        assert_eq!(
            result.error().unwrap().field_errors().unwrap().get("id"),
            ["is missing"]
        );
        assert!(op.performed());
        assert_eq!(calls.get(), 0);
        assert_eq!(
            op.perform().error().unwrap().kind(),
            ErrorKind::AlreadyPerformed
        );
    }

    #[test]
    fn test_internal_command_checks_domain() {
        let mut command = ReadNote::new(Behaviour::Succeed);
        command.internal = true;
        let mut op = operation(command, Some("partner"), json!({ "id": 1 }));
        let result = op.perform();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::CrossDomainNotAllowed);
        assert!(!op.performed());
        assert!(op.is_failure());

        let mut command = ReadNote::new(Behaviour::Succeed);
        command.internal = true;
        let mut op = operation(command, Some("main"), json!({ "id": 1 }));
        assert!(op.perform().is_success());
    }

    #[test]
    fn test_faults_are_converted() {
        let mut op = operation(ReadNote::new(Behaviour::NotFound), None, json!({ "id": 1 }));
        let result = op.perform();
        assert_eq!(result.error().unwrap().to_string(), "Not found");

        let mut op = operation(ReadNote::new(Behaviour::Io), None, json!({ "id": 1 }));
        let result = op.perform();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Unspecified);
        assert!(result.error().unwrap().to_string().contains("disk unplugged"));
        assert!(op.performed());
    }

    #[test]
    fn test_panic_becomes_unspecified_failure() {
        let mut op = operation(ReadNote::new(Behaviour::Panic), None, json!({ "id": 1 }));
        let result = op.perform();
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Unspecified);
        assert_eq!(result.error().unwrap().to_string(), "unspecified error: boom");
        assert!(op.performed());
    }

    #[test]
    fn test_equality_compares_params() {
        let a = operation(ReadNote::new(Behaviour::Succeed), None, json!({ "id": 1 }));
        let b = operation(ReadNote::new(Behaviour::Io), Some("main"), json!({ "id": 1 }));
        let c = operation(ReadNote::new(Behaviour::Succeed), None, json!({ "id": 2 }));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
