use super::entry::{DetailNode, EventLogEntry};
use crate::describe::{Describe, DetailProperty, DetailValue};
use crate::event_queue::EventQueueItem;
use chrono::Utc;
use std::collections::HashMap;
use ulid::Ulid;

/// 非对象根值使用的属性名
const ROOT_VALUE_NAME: &str = "Value";

/// 把可描述值展开为明细树
#[derive(Debug, Clone, Copy, Default)]
pub struct EventLogFlattener;

impl EventLogFlattener {
    /// 根为对象时每个属性一个根节点，否则只有一个 `Value` 节点
    pub fn flatten(&self, value: &dyn Describe) -> Vec<DetailNode> {
        self.flatten_detail(value.describe())
    }

    pub fn flatten_detail(&self, value: DetailValue) -> Vec<DetailNode> {
        match value {
            DetailValue::Object { properties, .. } => flatten_properties(properties),
            other => vec![flatten_value(ROOT_VALUE_NAME.to_string(), other)],
        }
    }

    /// 为一条已分发的队列条目生成日志
    pub fn build_entry(&self, item: &EventQueueItem) -> EventLogEntry {
        let event = item.event();
        EventLogEntry::builder()
            .lookup_key(Ulid::new().to_string())
            .aggregate_key(item.aggregate_key().to_string())
            .aggregate_type_name(item.aggregate_type().name().to_string())
            .event_type_name(event.event_type().to_string())
            .event_description(event.description())
            .date_created(Utc::now())
            .details(self.flatten_detail(event.describe()))
            .build()
    }
}

fn flatten_properties(properties: Vec<DetailProperty>) -> Vec<DetailNode> {
    let nodes = properties
        .into_iter()
        .map(|p| flatten_value(p.name, p.value))
        .collect();
    disambiguate(nodes)
}

fn flatten_value(name: String, value: DetailValue) -> DetailNode {
    match value {
        DetailValue::Null { type_name } => DetailNode::leaf(name, type_name, ""),
        DetailValue::Simple { type_name, value } => DetailNode::leaf(name, type_name, value),
        // 聚合只记录键，不再深入
        DetailValue::Aggregate { type_name, key } => DetailNode::leaf(name, type_name, key),
        DetailValue::Strings { type_name, items } => {
            let children = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| DetailNode::leaf(format!("{name}[{i}]"), "String", item))
                .collect();
            DetailNode::branch(name, type_name, disambiguate(children))
        }
        DetailValue::Collection { type_name, items } => {
            let children = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| flatten_value(format!("{name}[{i}]"), item))
                .collect();
            DetailNode::branch(name, type_name, disambiguate(children))
        }
        DetailValue::Object {
            type_name,
            properties,
        } => DetailNode::branch(name, type_name, flatten_properties(properties)),
    }
}

/// 同级重名时依产生顺序改名为 `{name}[0]`、`{name}[1]`…，直到没有重名
fn disambiguate(mut nodes: Vec<DetailNode>) -> Vec<DetailNode> {
    loop {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in &nodes {
            *counts.entry(node.property_name.as_str()).or_default() += 1;
        }
        let duplicated: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect();
        if duplicated.is_empty() {
            return nodes;
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for node in nodes.iter_mut() {
            if duplicated.contains(&node.property_name) {
                let index = seen.entry(node.property_name.clone()).or_default();
                node.property_name = format!("{}[{}]", node.property_name, index);
                *index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged {
        tags: Vec<String>,
    }

    impl Describe for Tagged {
        fn describe(&self) -> DetailValue {
            DetailValue::object(
                "Tagged",
                vec![DetailProperty::new("Tags", self.tags.describe())],
            )
        }
    }

    struct Line {
        sku: String,
        qty: u32,
    }

    impl Describe for Line {
        fn describe(&self) -> DetailValue {
            DetailValue::object(
                "Line",
                vec![
                    DetailProperty::new("sku", self.sku.describe()),
                    DetailProperty::new("qty", self.qty.describe()),
                ],
            )
        }
    }

    struct Placed {
        customer_key: String,
        lines: Vec<Line>,
        note: Option<String>,
    }

    impl Describe for Placed {
        fn describe(&self) -> DetailValue {
            DetailValue::object(
                "Placed",
                vec![
                    // 引用另一个聚合：只保留键
                    DetailProperty::new(
                        "customer",
                        DetailValue::Aggregate {
                            type_name: "Customer".into(),
                            key: self.customer_key.clone(),
                        },
                    ),
                    DetailProperty::new("lines", self.lines.describe()),
                    DetailProperty::new("note", self.note.describe()),
                ],
            )
        }
    }

    fn names(nodes: &[DetailNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.property_name.as_str()).collect()
    }

    #[test]
    fn string_collections_expand_to_indexed_leaves() {
        let event = Tagged {
            tags: vec!["a".into(), "b".into()],
        };
        let nodes = EventLogFlattener.flatten(&event);

        assert_eq!(names(&nodes), vec!["Tags"]);
        let tags = &nodes[0];
        assert_eq!(tags.property_type_name, "Vec<String>");
        assert_eq!(
            tags.children,
            vec![
                DetailNode::leaf("Tags[0]", "String", "a"),
                DetailNode::leaf("Tags[1]", "String", "b"),
            ]
        );
    }

    #[test]
    fn flattening_is_deterministic_and_stops_at_aggregates() {
        let event = Placed {
            customer_key: "c-7".into(),
            lines: vec![Line {
                sku: "A-1".into(),
                qty: 2,
            }],
            note: None,
        };

        let first = EventLogFlattener.flatten(&event);
        assert_eq!(first, EventLogFlattener.flatten(&event));

        assert_eq!(names(&first), vec!["customer", "lines", "note"]);
        assert_eq!(first[0], DetailNode::leaf("customer", "Customer", "c-7"));
        assert!(first[0].children.is_empty());

        let line = &first[1].children[0];
        assert_eq!(line.property_name, "lines[0]");
        assert_eq!(line.property_type_name, "Line");
        assert_eq!(
            line.children,
            vec![
                DetailNode::leaf("sku", "String", "A-1"),
                DetailNode::leaf("qty", "u32", "2"),
            ]
        );

        assert_eq!(first[2], DetailNode::leaf("note", "String", ""));
    }

    #[test]
    fn same_named_siblings_are_indexed_instead_of_overwritten() {
        let nodes = EventLogFlattener.flatten_detail(DetailValue::object(
            "Dup",
            vec![
                DetailProperty::new("code", DetailValue::simple("String", "x")),
                DetailProperty::new("other", DetailValue::simple("u8", 1)),
                DetailProperty::new("code", DetailValue::simple("String", "y")),
            ],
        ));
        assert_eq!(names(&nodes), vec!["code[0]", "other", "code[1]"]);
        assert_eq!(nodes[0].string_value, "x");
        assert_eq!(nodes[2].string_value, "y");
    }

    #[test]
    fn renaming_repeats_until_names_are_unique() {
        let nodes = disambiguate(vec![
            DetailNode::leaf("a", "u8", "1"),
            DetailNode::leaf("a[0]", "u8", "2"),
            DetailNode::leaf("a", "u8", "3"),
        ]);
        let mut unique = names(&nodes);
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
        assert_eq!(nodes[2].property_name, "a[1]");
    }

    #[test]
    fn non_object_roots_become_a_single_value_node() {
        let nodes = EventLogFlattener.flatten(&42_u64);
        assert_eq!(nodes, vec![DetailNode::leaf("Value", "u64", "42")]);
    }
}
