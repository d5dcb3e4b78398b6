use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件日志的一条明细（树形）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailNode {
    pub property_name: String,
    pub property_type_name: String,
    pub string_value: String,
    pub children: Vec<DetailNode>,
}

impl DetailNode {
    pub fn leaf(
        property_name: impl Into<String>,
        property_type_name: impl Into<String>,
        string_value: impl Into<String>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            property_type_name: property_type_name.into(),
            string_value: string_value.into(),
            children: Vec::new(),
        }
    }

    pub fn branch(
        property_name: impl Into<String>,
        property_type_name: impl Into<String>,
        children: Vec<DetailNode>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            property_type_name: property_type_name.into(),
            string_value: String::new(),
            children,
        }
    }

    /// 按属性名查找直接子节点
    pub fn child(&self, property_name: &str) -> Option<&DetailNode> {
        self.children.iter().find(|c| c.property_name == property_name)
    }

    /// 以自身为根的树深度（叶子为 1）
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(DetailNode::depth).max().unwrap_or(0)
    }
}

/// 明细树按先序展开后的行形态，`parent_id` 指向父行，便于写入关系型存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub id: usize,
    pub parent_id: Option<usize>,
    pub property_name: String,
    pub property_type_name: String,
    pub string_value: String,
}

/// 一条已分发事件的审计日志
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// 日志查找键（ULID，按时间有序）
    lookup_key: String,
    /// 事件来源聚合的键
    aggregate_key: String,
    /// 事件来源聚合的类型名
    aggregate_type_name: String,
    /// 事件类型名
    event_type_name: String,
    /// 事件描述
    event_description: String,
    /// 日志创建时间
    date_created: DateTime<Utc>,
    /// 事件载荷展开后的明细
    #[builder(default)]
    details: Vec<DetailNode>,
}

impl EventLogEntry {
    pub fn lookup_key(&self) -> &str {
        &self.lookup_key
    }

    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    pub fn aggregate_type_name(&self) -> &str {
        &self.aggregate_type_name
    }

    pub fn event_type_name(&self) -> &str {
        &self.event_type_name
    }

    pub fn event_description(&self) -> &str {
        &self.event_description
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn details(&self) -> &[DetailNode] {
        &self.details
    }

    /// 按根级属性名查找明细
    pub fn detail(&self, property_name: &str) -> Option<&DetailNode> {
        self.details.iter().find(|d| d.property_name == property_name)
    }

    pub fn detail_rows(&self) -> Vec<DetailRow> {
        let mut rows = Vec::new();
        for node in &self.details {
            push_rows(node, None, &mut rows);
        }
        rows
    }
}

fn push_rows(node: &DetailNode, parent_id: Option<usize>, rows: &mut Vec<DetailRow>) {
    let id = rows.len();
    rows.push(DetailRow {
        id,
        parent_id,
        property_name: node.property_name.clone(),
        property_type_name: node.property_type_name.clone(),
        string_value: node.string_value.clone(),
    });
    for child in &node.children {
        push_rows(child, Some(id), rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_rows_are_preorder_with_parent_links() {
        let entry = EventLogEntry::builder()
            .lookup_key("01HX".into())
            .aggregate_key("o-1".into())
            .aggregate_type_name("order".into())
            .event_type_name("OrderPlaced".into())
            .event_description("OrderPlaced".into())
            .date_created(Utc::now())
            .details(vec![
                DetailNode::branch(
                    "lines",
                    "Vec<Line>",
                    vec![DetailNode::branch(
                        "lines[0]",
                        "Line",
                        vec![DetailNode::leaf("sku", "String", "A-1")],
                    )],
                ),
                DetailNode::leaf("total", "u64", "12"),
            ])
            .build();

        let rows = entry.detail_rows();
        let shape: Vec<_> = rows
            .iter()
            .map(|r| (r.id, r.parent_id, r.property_name.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0, None, "lines"),
                (1, Some(0), "lines[0]"),
                (2, Some(1), "sku"),
                (3, None, "total"),
            ]
        );
        assert_eq!(entry.detail("lines").map(DetailNode::depth), Some(3));
        assert_eq!(
            entry.detail("lines").and_then(|n| n.child("lines[0]")).and_then(|n| n.child("sku")).map(|n| n.string_value.as_str()),
            Some("A-1")
        );
    }
}
