//! 可描述值（Describe）
//!
//! 以显式的值模型代替运行时反射：每个类型通过 `Describe` 把自身转换为
//! `DetailValue`，事件日志展开器（`EventLogFlattener`）再据此生成明细树。
//!
//! - 基础类型、字符串、日期时间 → `Simple`
//! - 聚合 → `Aggregate`（只记录键，不再深入）
//! - 字符串集合 → `Strings`；其他集合 → `Collection`
//! - 结构体/带字段的枚举变体 → `Object`
//!
//! 结构体与枚举通常通过 `#[derive(Describe)]` 或 `#[domain_event]` 生成实现。
//!
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::sync::Arc;

/// 类型擦除后的值模型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailValue {
    Null {
        type_name: String,
    },
    Simple {
        type_name: String,
        value: String,
    },
    Aggregate {
        type_name: String,
        key: String,
    },
    Strings {
        type_name: String,
        items: Vec<String>,
    },
    Collection {
        type_name: String,
        items: Vec<DetailValue>,
    },
    Object {
        type_name: String,
        properties: Vec<DetailProperty>,
    },
}

impl DetailValue {
    pub fn simple(type_name: impl Into<String>, value: impl Display) -> Self {
        DetailValue::Simple {
            type_name: type_name.into(),
            value: value.to_string(),
        }
    }

    pub fn object(type_name: impl Into<String>, properties: Vec<DetailProperty>) -> Self {
        DetailValue::Object {
            type_name: type_name.into(),
            properties,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            DetailValue::Null { type_name }
            | DetailValue::Simple { type_name, .. }
            | DetailValue::Aggregate { type_name, .. }
            | DetailValue::Strings { type_name, .. }
            | DetailValue::Collection { type_name, .. }
            | DetailValue::Object { type_name, .. } => type_name,
        }
    }
}

/// 对象的一个可读属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailProperty {
    pub name: String,
    pub value: DetailValue,
}

impl DetailProperty {
    pub fn new(name: impl Into<String>, value: DetailValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// 可被事件日志展开的值
pub trait Describe {
    fn describe(&self) -> DetailValue;

    /// 值缺失（如 `None`）时记录的类型名
    fn type_label() -> String
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }

    /// 描述同构集合；字符串类型覆写为 `Strings`
    fn describe_many<'a, I>(type_name: String, items: I) -> DetailValue
    where
        Self: Sized + 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        DetailValue::Collection {
            type_name,
            items: items.into_iter().map(Describe::describe).collect(),
        }
    }
}

/// 去掉模块路径的类型名，例如 `alloc::vec::Vec<alloc::string::String>` → `Vec<String>`
pub fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}

macro_rules! describe_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe(&self) -> DetailValue {
                    DetailValue::simple(stringify!($ty), self)
                }
            }
        )*
    };
}

describe_display!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char
);

impl Describe for String {
    fn describe(&self) -> DetailValue {
        DetailValue::simple("String", self)
    }

    fn type_label() -> String {
        "String".to_string()
    }

    fn describe_many<'a, I>(type_name: String, items: I) -> DetailValue
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        DetailValue::Strings {
            type_name,
            items: items.into_iter().cloned().collect(),
        }
    }
}

impl Describe for str {
    fn describe(&self) -> DetailValue {
        DetailValue::simple("String", self)
    }
}

impl Describe for &str {
    fn describe(&self) -> DetailValue {
        DetailValue::simple("String", self)
    }

    fn type_label() -> String {
        "String".to_string()
    }

    fn describe_many<'a, I>(type_name: String, items: I) -> DetailValue
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        DetailValue::Strings {
            type_name,
            items: items.into_iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Describe for () {
    fn describe(&self) -> DetailValue {
        DetailValue::Null {
            type_name: "()".to_string(),
        }
    }
}

// 日期时间直接使用 Display，不做本地化转换
impl<Tz> Describe for DateTime<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    fn describe(&self) -> DetailValue {
        DetailValue::simple("DateTime", self)
    }

    fn type_label() -> String {
        "DateTime".to_string()
    }
}

describe_display!(NaiveDate, NaiveDateTime, NaiveTime);

impl<T: Describe> Describe for Option<T> {
    fn describe(&self) -> DetailValue {
        match self {
            Some(value) => value.describe(),
            None => DetailValue::Null {
                type_name: T::type_label(),
            },
        }
    }

    fn type_label() -> String {
        T::type_label()
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn describe(&self) -> DetailValue {
        (**self).describe()
    }
}

impl<T: Describe + ?Sized> Describe for Arc<T> {
    fn describe(&self) -> DetailValue {
        (**self).describe()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe(&self) -> DetailValue {
        T::describe_many(format!("Vec<{}>", T::type_label()), self.iter())
    }
}

impl<T: Describe> Describe for [T] {
    fn describe(&self) -> DetailValue {
        T::describe_many(format!("[{}]", T::type_label()), self.iter())
    }
}

impl<T: Describe> Describe for VecDeque<T> {
    fn describe(&self) -> DetailValue {
        T::describe_many(format!("VecDeque<{}>", T::type_label()), self.iter())
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn describe(&self) -> DetailValue {
        T::describe_many(format!("BTreeSet<{}>", T::type_label()), self.iter())
    }
}

impl<K: Display, V: Describe> Describe for BTreeMap<K, V> {
    fn describe(&self) -> DetailValue {
        DetailValue::Object {
            type_name: format!("BTreeMap<{}>", V::type_label()),
            properties: self
                .iter()
                .map(|(k, v)| DetailProperty::new(k.to_string(), v.describe()))
                .collect(),
        }
    }
}

// 哈希集合按元素排序，保证多次展开结果一致
impl<T: Describe + Ord, S> Describe for HashSet<T, S> {
    fn describe(&self) -> DetailValue {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort();
        T::describe_many(format!("HashSet<{}>", T::type_label()), items)
    }
}

impl<K: Display, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe(&self) -> DetailValue {
        let mut properties: Vec<DetailProperty> = self
            .iter()
            .map(|(k, v)| DetailProperty::new(k.to_string(), v.describe()))
            .collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        DetailValue::Object {
            type_name: format!("HashMap<{}>", V::type_label()),
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn short_type_name_strips_paths() {
        assert_eq!(short_type_name::<Vec<String>>(), "Vec<String>");
        assert_eq!(short_type_name::<Option<u32>>(), "Option<u32>");
        assert_eq!(
            short_type_name::<BTreeMap<String, Vec<i64>>>(),
            "BTreeMap<String, Vec<i64>>"
        );
    }

    #[test]
    fn string_collections_become_strings() {
        let tags = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            tags.describe(),
            DetailValue::Strings {
                type_name: "Vec<String>".into(),
                items: vec!["a".into(), "b".into()],
            }
        );

        let nums = vec![1_u32, 2];
        match nums.describe() {
            DetailValue::Collection { type_name, items } => {
                assert_eq!(type_name, "Vec<u32>");
                assert_eq!(items, vec![DetailValue::simple("u32", 1), DetailValue::simple("u32", 2)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn none_keeps_declared_type() {
        let missing: Option<String> = None;
        assert_eq!(
            missing.describe(),
            DetailValue::Null {
                type_name: "String".into()
            }
        );
        assert_eq!(Some(7_i32).describe(), DetailValue::simple("i32", 7));
    }

    #[test]
    fn hash_collections_are_sorted() {
        let tags: HashSet<String> = ["b", "c", "a"].into_iter().map(String::from).collect();
        assert_eq!(
            tags.describe(),
            DetailValue::Strings {
                type_name: "HashSet<String>".into(),
                items: vec!["a".into(), "b".into(), "c".into()],
            }
        );

        let stock: HashMap<&str, u32> = [("sku-2", 5), ("sku-1", 3)].into_iter().collect();
        assert_eq!(
            stock.describe(),
            DetailValue::object(
                "HashMap<u32>",
                vec![
                    DetailProperty::new("sku-1", DetailValue::simple("u32", 3)),
                    DetailProperty::new("sku-2", DetailValue::simple("u32", 5)),
                ],
            )
        );
    }

    #[test]
    fn dates_use_display() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(
            at.describe(),
            DetailValue::simple("DateTime", "2024-05-01 08:30:00 UTC")
        );
    }
}
