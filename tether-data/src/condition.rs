use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator for a [`WhereCondition`].
///
/// A closed set: an operator the dialects cannot render is unrepresentable,
/// rather than rejected at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "in")]
    In,
}

impl Operator {
    /// The SQL rendering of this operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
        }
    }
}

/// A single `field <op> value` filter.
///
/// Conditions on a query are AND-combined. For [`Operator::In`] the value
/// must be a non-empty array; one placeholder is emitted per element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhereCondition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl WhereCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Ge, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, Operator::Like, Value::String(pattern.into()))
    }

    pub fn is_in(
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(field, Operator::In, Value::Array(values))
    }
}

/// Sort direction for an [`OrderBy`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort key. Earlier entries in a query's order list take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A dialect-neutral description of a query: filters, ordering, and paging.
///
/// Pure data with no connection state; constructed per call and immutable
/// thereafter. Omitting `limit`/`offset` means "no limit"/"no offset", and
/// an empty condition list means "match all rows".
///
/// # Example
///
/// ```ignore
/// let options = QueryOptions::new()
///     .and_where(WhereCondition::eq("status", "active"))
///     .and_where(WhereCondition::is_in("role", ["admin", "user"]))
///     .order_by("id", SortDirection::Asc)
///     .limit(10);
/// let users = store.find_many("users", &options).await?;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    #[serde(rename = "where")]
    pub conditions: Vec<WhereCondition>,
    #[serde(rename = "orderBy")]
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and_where(mut self, condition: WhereCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_wire_names() {
        let op: Operator = serde_json::from_value(json!("!=")).unwrap();
        assert_eq!(op, Operator::Ne);
        let op: Operator = serde_json::from_value(json!("in")).unwrap();
        assert_eq!(op, Operator::In);
        assert_eq!(serde_json::to_value(Operator::Le).unwrap(), json!("<="));
    }

    #[test]
    fn options_from_wire_shape() {
        let options: QueryOptions = serde_json::from_value(json!({
            "where": [
                { "field": "status", "operator": "=", "value": "active" },
                { "field": "age", "operator": ">=", "value": 18 }
            ],
            "orderBy": [{ "field": "id", "direction": "desc" }],
            "limit": 5
        }))
        .unwrap();

        assert_eq!(options.conditions.len(), 2);
        assert_eq!(options.conditions[1].operator, Operator::Ge);
        assert_eq!(options.order[0].direction, SortDirection::Desc);
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.offset, None);
    }

    #[test]
    fn builder_accumulates_in_order() {
        let options = QueryOptions::new()
            .and_where(WhereCondition::eq("a", 1))
            .and_where(WhereCondition::like("b", "%x%"))
            .order_by("a", SortDirection::Asc)
            .order_by("b", SortDirection::Desc)
            .limit(10)
            .offset(20);

        assert_eq!(options.conditions[0].field, "a");
        assert_eq!(options.conditions[1].operator, Operator::Like);
        assert_eq!(options.order[1].direction, SortDirection::Desc);
        assert_eq!((options.limit, options.offset), (Some(10), Some(20)));
    }

    #[test]
    fn is_in_collects_values() {
        let cond = WhereCondition::is_in("role", ["admin", "user"]);
        assert_eq!(cond.value, json!(["admin", "user"]));
    }
}
