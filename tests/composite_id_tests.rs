use std::sync::Arc;

use rustrelmap::Value;
use rustrelmap::prelude::advanced::StatementKind;
use rustrelmap::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WrappedPk {
    id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Simple {
    wrapped_pk: WrappedPk,
    name: String,
    tags: Vec<Tag>,
}

impl Aggregate for Simple {
    const ENTITY: &'static str = "Simple";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tag {
    label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ShipmentPk {
    region: String,
    number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shipment {
    pk: ShipmentPk,
    lines: Vec<Line>,
}

impl Aggregate for Shipment {
    const ENTITY: &'static str = "Shipment";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Line {
    sku: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    pk: ShipmentPk,
    value: f64,
}

impl Aggregate for Reading {
    const ENTITY: &'static str = "Reading";
}

fn template() -> AggregateTemplate<InMemoryDataAccessStrategy> {
    let context = Arc::new(
        MappingContext::builder()
            .register(
                EntityDescriptor::new("Simple")
                    .embedded_id("wrapped_pk", "WrappedPk")
                    .property("name", SqlType::Text)
                    .list("tags", "Tag"),
            )
            .register(EntityDescriptor::new("WrappedPk").property("id", SqlType::Integer))
            .register(EntityDescriptor::new("Tag").property("label", SqlType::Text))
            .register(
                EntityDescriptor::new("Shipment")
                    .embedded_id("pk", "ShipmentPk")
                    .list("lines", "Line"),
            )
            .register(
                EntityDescriptor::new("ShipmentPk")
                    .property("region", SqlType::Text)
                    .property("number", SqlType::Integer),
            )
            .register(EntityDescriptor::new("Line").property("sku", SqlType::Text))
            .register(
                EntityDescriptor::new("Reading")
                    .embedded_id("pk", "ShipmentPk")
                    .property("value", SqlType::Float),
            )
            .build()
            .unwrap(),
    );
    let store = InMemoryDataAccessStrategy::for_context(&context);
    AggregateTemplate::new(context, store)
}

fn simple(id: i64, name: &str, tags: &[&str]) -> Simple {
    Simple {
        wrapped_pk: WrappedPk { id },
        name: name.into(),
        tags: tags.iter().map(|t| Tag { label: t.to_string() }).collect(),
    }
}

#[test]
fn test_single_property_embedded_id_round_trips() {
    let template = template();
    let saved = template.insert(simple(23, "alpha", &["x", "y"])).unwrap();

    let root = &template.strategy().rows("simple").unwrap()[0];
    assert_eq!(root["id"], Value::Integer(23));

    let tags = template.strategy().rows("tag").unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[1]["simple"], Value::Integer(23));
    assert_eq!(tags[1]["simple_key"], Value::Integer(1));

    let loaded: Option<Simple> = template.find_by_id(&WrappedPk { id: 23 }).unwrap();
    assert_eq!(loaded, Some(saved));
}

#[test]
fn test_single_property_embedded_id_update_and_delete() {
    let template = template();
    let mut saved = template.insert(simple(23, "alpha", &["x"])).unwrap();

    saved.name = "beta".into();
    saved.tags = vec![Tag { label: "z".into() }, Tag { label: "w".into() }];
    template.update(saved.clone()).unwrap();

    let loaded: Simple = template.find_by_id(&WrappedPk { id: 23 }).unwrap().unwrap();
    assert_eq!(loaded, saved);

    template.delete(&loaded).unwrap();
    assert!(template.strategy().rows("simple").unwrap().is_empty());
    assert!(template.strategy().rows("tag").unwrap().is_empty());
}

#[test]
fn test_composite_id_with_children_fails_before_any_statement() {
    let template = template();
    let shipment = Shipment {
        pk: ShipmentPk {
            region: "eu".into(),
            number: 7,
        },
        lines: vec![Line { sku: "A-1".into() }],
    };

    let result = template.insert(shipment);
    assert!(matches!(result, Err(DbError::MappingError(_))));
    assert!(template.strategy().journal().unwrap().is_empty());
}

#[test]
fn test_composite_id_root_with_child_tables_is_rejected_even_when_empty() {
    let template = template();
    let pk = ShipmentPk {
        region: "eu".into(),
        number: 7,
    };
    let shipment = Shipment {
        pk: pk.clone(),
        lines: vec![],
    };

    let inserted = template.insert(shipment.clone());
    assert!(matches!(inserted, Err(DbError::MappingError(_))));

    let updated = template.update(shipment);
    assert!(matches!(updated, Err(DbError::MappingError(_))));

    let deleted = template.delete_by_id::<Shipment>(&pk);
    assert!(matches!(deleted, Err(DbError::MappingError(_))));

    let found = template.find_by_id::<Shipment>(&pk);
    assert!(matches!(found, Err(DbError::MappingError(_))));

    assert!(template.strategy().journal().unwrap().is_empty());
    assert!(template.strategy().rows("shipment").unwrap().is_empty());
}

#[test]
fn test_composite_id_lookup_uses_tuple_in() {
    let template = template();
    for (region, number, value) in [("eu", 1, 0.5), ("eu", 2, 1.5), ("us", 1, 2.5)] {
        template
            .insert(Reading {
                pk: ShipmentPk {
                    region: region.into(),
                    number,
                },
                value,
            })
            .unwrap();
    }
    template.strategy().clear_journal().unwrap();

    let ids = [
        ShipmentPk {
            region: "eu".into(),
            number: 2,
        },
        ShipmentPk {
            region: "us".into(),
            number: 1,
        },
    ];
    let found: Vec<Reading> = template.find_all_by_id(&ids).unwrap();
    assert_eq!(
        found.iter().map(|r| r.value).collect::<Vec<_>>(),
        vec![1.5, 2.5]
    );

    let select = template
        .strategy()
        .journal()
        .unwrap()
        .into_iter()
        .find(|entry| entry.kind == StatementKind::Select)
        .unwrap();
    assert_eq!(
        select.sql,
        "SELECT * FROM reading WHERE (region, number) IN ((:region0, :number0), (:region1, :number1))"
    );
}

#[test]
fn test_composite_id_duplicate_is_rejected() {
    let template = template();
    let reading = Reading {
        pk: ShipmentPk {
            region: "eu".into(),
            number: 1,
        },
        value: 1.0,
    };
    template.insert(reading.clone()).unwrap();

    let result = template.insert(reading);
    assert!(matches!(result, Err(DbError::ConstraintViolation(_))));
    assert_eq!(template.count::<Reading>().unwrap(), 1);
}

#[test]
fn test_composite_id_part_cannot_be_null() {
    let template = template();
    let result =
        template.find_document_by_id("Reading", &serde_json::json!({ "region": "eu", "number": null }));
    assert!(matches!(result, Err(DbError::InvalidArgument(_))));
}
