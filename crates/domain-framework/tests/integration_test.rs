use domain_framework::mock::{MemoryQuery, QueryStats};
use domain_framework::{
    Command, Condition, Context, Contract, DomainConfig, DomainError, DomainKey, DomainRegistry,
    ErrorKind, Fault, Operation, Outcome, Params, Query, Resource, Schema, Serializer, Shape,
};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};

const BACKOFFICE: &str = "shop::backoffice";
const PARTNER: &str = "shop::partner";

#[derive(Debug, Clone)]
struct Customer {
    id: u32,
    name: String,
    email: String,
}

impl Resource for Customer {
    fn model_name(&self) -> &'static str {
        "Customer"
    }

    fn key(&self) -> Option<Value> {
        Some(json!(self.id))
    }

    fn read(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "email" => Some(json!(self.email)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Invoice {
    id: u32,
    customer_id: u32,
    total: i64,
}

impl Resource for Invoice {
    fn model_name(&self) -> &'static str {
        "Invoice"
    }

    fn key(&self) -> Option<Value> {
        Some(json!(self.id))
    }

    fn read(&self, attribute: &str) -> Option<Value> {
        match attribute {
            "id" => Some(json!(self.id)),
            "customer_id" => Some(json!(self.customer_id)),
            "total" => Some(json!(self.total)),
            _ => None,
        }
    }
}

struct Fixture {
    customers: Arc<RwLock<Vec<Customer>>>,
    invoices: Vec<Invoice>,
    invoice_stats: QueryStats,
}

impl Fixture {
    fn new() -> Self {
        Self {
            customers: Arc::new(RwLock::new(vec![
                Customer {
                    id: 1,
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                },
                Customer {
                    id: 2,
                    name: "Brian".into(),
                    email: String::new(),
                },
            ])),
            invoices: (1..=6)
                .map(|id| Invoice {
                    id,
                    customer_id: if id <= 4 { 1 } else { 2 },
                    total: i64::from(id) * 100,
                })
                .collect(),
            invoice_stats: QueryStats::new(),
        }
    }

    fn customers(&self) -> MemoryQuery<Customer> {
        let customers = Arc::clone(&self.customers);
        MemoryQuery::from_source("customers", move || {
            Ok(customers.read().map(|rows| rows.clone()).unwrap_or_default())
        })
    }

    fn invoice_serializer(&self) -> Serializer<Invoice> {
        Serializer::builder("InvoiceSerializer")
            .attribute("id")
            .attribute("total")
            .build()
            .unwrap()
    }

    fn customer_serializer(&self) -> Serializer<Customer> {
        let invoices = self.invoices.clone();
        let stats = self.invoice_stats.clone();
        Serializer::builder("CustomerSerializer")
            .attribute("id")
            .attribute("name")
            .attribute_if("email", |customer: &Customer| !customer.email.trim().is_empty())
            .references_many(
                "invoices",
                move |customer: &Customer| {
                    MemoryQuery::new("invoices", invoices.clone())
                        .with_stats(stats.clone())
                        .where_eq("customer_id", customer.id)
                },
                self.invoice_serializer(),
            )
            .build()
            .unwrap()
    }
}

fn registry() -> Arc<DomainRegistry> {
    Arc::new(
        DomainRegistry::new()
            .with(DomainConfig::new("main", Some(BACKOFFICE)))
            .with(DomainConfig::new("partner", Some(PARTNER))),
    )
}

struct FindCustomer {
    customers: MemoryQuery<Customer>,
    serializer: Serializer<Customer>,
    contract: Schema,
}

impl FindCustomer {
    fn new(fixture: &Fixture) -> Self {
        Self {
            customers: fixture.customers(),
            serializer: fixture.customer_serializer(),
            contract: Schema::new()
                .required("id", Shape::integer().filled())
                .required("query", Shape::hash()),
        }
    }
}

impl Command for FindCustomer {
    type Resource = Customer;
    const NAME: &'static str = "FindCustomer";

    fn namespace(&self) -> &str {
        BACKOFFICE
    }

    fn is_internal(&self) -> bool {
        true
    }

    fn contract(&self) -> &dyn Contract {
        &self.contract
    }

    fn serializer(&self, _domain: Option<&DomainKey>) -> Option<Serializer<Customer>> {
        Some(self.serializer.clone())
    }

    fn operate(&mut self, ctx: &Context<'_, Customer>) -> Result<Outcome<Customer>, Fault> {
        let id = ctx.params().integer("id")?;
        match self.customers.find(&json!(id))? {
            Some(customer) => Ok(Outcome::resource(customer)),
            None => Err(DomainError::not_found("Not found").into()),
        }
    }
}

fn find(fixture: &Fixture, domain: &str, params: Value) -> Operation<FindCustomer> {
    Operation::new(
        FindCustomer::new(fixture),
        registry(),
        Some(DomainKey::from(domain)),
        Params::try_from(params).unwrap(),
    )
}

#[test]
fn test_internal_find_from_owning_domain() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "main", json!({ "id": 1, "query": {} }));
    let result = operation.perform();

    assert!(result.is_success());
    let view = result.value().and_then(|payload| payload.as_view()).unwrap();
    assert_eq!(view.get("name"), Some(&json!("Ada")));
    assert_eq!(view.key(), Some(json!(1)));
    assert!(view.is_persisted());
    assert!(view.is_valid());
}

#[test]
fn test_internal_find_from_other_domain_is_refused_and_retryable() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "partner", json!({ "id": 1, "query": {} }));
    let result = operation.perform();

    assert_eq!(result.error().unwrap().kind(), ErrorKind::CrossDomainNotAllowed);
    assert_eq!(result.error().unwrap().kind().tag(), "cross-domain-not-allowed");
    assert!(!operation.performed());
    assert!(operation.is_failure());
}

#[test]
fn test_missing_id_fails_validation() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "main", json!({ "query": {} }));
    let result = operation.perform();

    let error = result.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(error.field_errors().unwrap().contains("id"));
    assert!(operation.performed());
}

#[test]
fn test_second_perform_keeps_first_result() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "main", json!({ "id": 1, "query": {} }));
    assert!(operation.perform().is_success());

    let second = operation.perform();
    assert_eq!(second.error().unwrap().kind(), ErrorKind::AlreadyPerformed);
    assert!(operation.result().unwrap().is_success());
}

#[test]
fn test_unknown_id_is_not_found() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "main", json!({ "id": 99, "query": {} }));
    let result = operation.perform();
    assert_eq!(result.error().unwrap().kind().tag(), "not-found");
    assert_eq!(result.error().unwrap().to_string(), "Not found");
}

#[test]
fn test_conditional_attribute_is_absent_not_null() {
    let fixture = Fixture::new();
    let serializer = fixture.customer_serializer();
    let customers = fixture.customers().load().unwrap();

    let with_email = serializer.serialize(customers[0].clone());
    assert_eq!(with_email.get("email"), Some(&json!("ada@example.com")));

    let blank = serializer.serialize(customers[1].clone());
    assert!(!blank.has_field("email"));
    assert_eq!(blank.to_json(), json!({ "id": 2, "name": "Brian" }));
}

#[test]
fn test_output_follows_declaration_order() {
    let fixture = Fixture::new();
    let serializer = fixture.customer_serializer();
    let customer = fixture.customers().first().unwrap().unwrap();
    let first = serde_json::to_string(&serializer.serialize(customer.clone())).unwrap();
    let again = serde_json::to_string(&serializer.serialize(customer)).unwrap();
    assert_eq!(first, r#"{"id":1,"name":"Ada","email":"ada@example.com"}"#);
    assert_eq!(first, again);
}

#[test]
fn test_scalars_are_snapshots() {
    let fixture = Fixture::new();
    let serializer = fixture.customer_serializer();
    let customer = fixture.customers().first().unwrap().unwrap();
    let view = serializer.serialize(customer);

    fixture.customers.write().unwrap()[0].name = "Augusta".into();

    assert_eq!(view.get("name"), Some(&json!("Ada")));
    let reloaded = fixture.customers().first().unwrap().unwrap();
    assert_eq!(reloaded.name, "Augusta");
}

#[test]
fn test_reference_many_is_lazy() {
    let fixture = Fixture::new();
    let serializer = fixture.customer_serializer();
    let customer = fixture.customers().first().unwrap().unwrap();
    let view = serializer.serialize(customer);

    let invoices = view
        .many("invoices")
        .unwrap()
        .filter(Condition::new("total", domain_framework::Op::Gt, 100))
        .order("total desc")
        .limit(2);
    assert_eq!(fixture.invoice_stats.executions(), 0);

    let totals = invoices
        .map(|invoice| invoice.get("total").cloned().unwrap())
        .unwrap();
    assert_eq!(totals, vec![json!(400), json!(300)]);
    assert_eq!(fixture.invoice_stats.executions(), 1);

    assert_eq!(view.many("invoices").unwrap().count().unwrap(), 4);
    assert_eq!(fixture.invoice_stats.executions(), 2);
}

#[test]
fn test_views_compare_structurally() {
    let fixture = Fixture::new();
    let serializer = fixture.customer_serializer();
    let customer = fixture.customers().first().unwrap().unwrap();
    let a = serializer.serialize(customer.clone());
    let b = serializer.serialize(customer);
    assert_eq!(a, b);
    let rendered = format!("{a:?}");
    assert!(rendered.starts_with("Customer"));
    assert!(rendered.contains("invoices(many)"));
}

#[test]
fn test_result_transport_shape() {
    let fixture = Fixture::new();
    let mut operation = find(&fixture, "main", json!({ "id": 2, "query": {} }));
    let result = operation.perform();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "result": "success",
            "value": { "id": 2, "name": "Brian" },
            "meta": null,
            "operation": { "name": "FindCustomer", "params": { "id": 2, "query": {} } }
        })
    );
}
