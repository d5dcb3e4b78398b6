use std::sync::Arc;
use uow_domain::aggregate::{Aggregate, AggregateType, EventSource};
use uow_domain::describe::{Describe, DetailProperty, DetailValue};
use uow_domain::domain_event::{DomainEvent, Phase, PhaseMarkers};
use uow_domain::entity::Entity;
use uow_domain::event_log::{DetailNode, EventLogFlattener};
use uow_macros::{Describe, aggregate, domain_event};

#[aggregate(name = "customer", debug = false)]
#[derive(Clone, PartialEq)]
struct Customer {
    email: String,
    // id 声明在后面，宏会把它移到最前
    id: u64,
}

impl std::fmt::Debug for Customer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Customer#{}", self.id)
    }
}

#[aggregate]
struct Ticket {
    title: String,
}

#[derive(Debug, Clone, PartialEq, Describe)]
struct Address {
    city: String,
    #[describe(rename = "zip")]
    postal_code: Option<String>,
    #[describe(skip)]
    internal_note: String,
}

#[derive(Debug, Clone, PartialEq, Describe)]
struct Sku(String);

#[derive(Debug, Clone, PartialEq, Describe)]
enum Priority {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Describe)]
enum Payment {
    Cash,
    Card { last4: String },
    Voucher(u32, String),
}

#[domain_event(description = "customer moved")]
struct CustomerMoved {
    customer: Arc<Customer>,
    to: Address,
    sku: Sku,
    priority: Priority,
    #[describe(skip)]
    secret: String,
}

#[domain_event(name = "ticket.opened", pre_commit)]
struct TicketOpened;

#[domain_event(pre_commit, post_commit)]
enum TicketEvent {
    #[event(name = "ticket.closed", description = "closed by owner")]
    Closed { reason: String },
    Reopened,
    Paid(Payment),
}

#[test]
fn aggregate_fields_and_traits_are_generated() {
    let mut customer = Customer::new(7);
    customer.email = "a@example.com".into();

    assert_eq!(*customer.id(), 7);
    assert_eq!(Customer::TYPE, "customer");
    assert_eq!(Ticket::TYPE, "Ticket");
    assert_eq!(customer.aggregate_key(), "7");
    assert_eq!(customer.aggregate_type(), AggregateType::of::<Customer>());
    assert_eq!(format!("{customer:?}"), "Customer#7");

    // id 在最前，事件记录不参与序列化
    customer.record_event(TicketOpened);
    let json = serde_json::to_string(&customer).unwrap();
    assert_eq!(json, r#"{"id":7,"email":"a@example.com"}"#);
    assert_eq!(customer.unpublished_events().len(), 1);

    let back: Customer = serde_json::from_str(&json).unwrap();
    assert!(back.recorder().is_empty());

    let ticket = Ticket::new("t-1".to_string());
    assert_eq!(ticket.title, "");
    assert!(format!("{ticket:?}").contains("t-1"));
}

#[test]
fn aggregates_describe_as_a_key_only() {
    let customer = Customer::new(42);
    assert_eq!(
        customer.describe(),
        DetailValue::Aggregate {
            type_name: "Customer".into(),
            key: "42".into(),
        }
    );
}

#[test]
fn derived_describe_follows_field_options() {
    let address = Address {
        city: "Lyon".into(),
        postal_code: None,
        internal_note: "hidden".into(),
    };
    assert_eq!(
        address.describe(),
        DetailValue::object(
            "Address",
            vec![
                DetailProperty::new("city", DetailValue::simple("String", "Lyon")),
                DetailProperty::new(
                    "zip",
                    DetailValue::Null {
                        type_name: "String".into()
                    }
                ),
            ]
        )
    );

    assert_eq!(Sku("A-1".into()).describe(), DetailValue::simple("String", "A-1"));
    assert_eq!(Priority::High.describe(), DetailValue::simple("Priority", "High"));
    assert_eq!(
        Payment::Card {
            last4: "4242".into()
        }
        .describe(),
        DetailValue::object(
            "Payment::Card",
            vec![DetailProperty::new("last4", DetailValue::simple("String", "4242"))]
        )
    );
    assert_eq!(Payment::Cash.describe(), DetailValue::simple("Payment", "Cash"));
    match Payment::Voucher(5, "spring".into()).describe() {
        DetailValue::Object { properties, .. } => {
            let names: Vec<_> = properties.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, vec!["0", "1"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn event_names_descriptions_and_phases() {
    let opened = TicketOpened;
    assert_eq!(opened.event_type(), "ticket.opened");
    assert_eq!(opened.description(), "ticket.opened");
    assert_eq!(opened.phase_markers(), PhaseMarkers::PRE_COMMIT);
    assert!(!opened.phase_markers().includes(Phase::PostCommit));

    let closed = TicketEvent::Closed {
        reason: "done".into(),
    };
    assert_eq!(closed.event_type(), "ticket.closed");
    assert_eq!(closed.description(), "closed by owner");
    assert_eq!(closed.phase_markers(), PhaseMarkers::BOTH);

    let reopened = TicketEvent::Reopened;
    assert_eq!(reopened.event_type(), "TicketEvent.Reopened");
    assert_eq!(reopened.description(), "TicketEvent.Reopened");
    assert_eq!(
        TicketEvent::Paid(Payment::Cash).event_type(),
        "TicketEvent.Paid"
    );

    assert_eq!(
        closed.describe(),
        DetailValue::object(
            "TicketEvent::Closed",
            vec![DetailProperty::new("reason", DetailValue::simple("String", "done"))]
        )
    );
}

#[test]
fn flattening_an_event_stops_at_referenced_aggregates() {
    let mut customer = Customer::new(9);
    customer.email = "c@example.com".into();

    let event = CustomerMoved {
        customer: Arc::new(customer),
        to: Address {
            city: "Nantes".into(),
            postal_code: Some("44000".into()),
            internal_note: String::new(),
        },
        sku: Sku("B-2".into()),
        priority: Priority::Low,
        secret: "s".into(),
    };
    assert_eq!(event.description(), "customer moved");
    assert_eq!(event.phase_markers(), PhaseMarkers::POST_COMMIT);

    let nodes = EventLogFlattener.flatten(&event);
    assert_eq!(
        nodes,
        vec![
            DetailNode::leaf("customer", "Customer", "9"),
            DetailNode::branch(
                "to",
                "Address",
                vec![
                    DetailNode::leaf("city", "String", "Nantes"),
                    DetailNode::leaf("zip", "String", "44000"),
                ]
            ),
            DetailNode::leaf("sku", "String", "B-2"),
            DetailNode::leaf("priority", "Priority", "Low"),
        ]
    );
}
