/// SQL composition for analytics queries
///
/// A query is a caller-supplied base statement plus optional WHERE, GROUP BY,
/// HAVING, ORDER BY and LIMIT clauses appended in that fixed order. Filter and
/// HAVING values are always bound as positional parameters. Identifiers that
/// end up in the SQL text (filter columns, grouping and ordering columns) must
/// be known schema columns or aliases the call site declared with
/// [`QueryBuilder::allow`].

use std::fmt;

pub use rusqlite::types::Value as SqlValue;

use crate::domain::AnalyticsError;
use crate::storage::schema;

/// Conversion of plain Rust scalars into bindable SQL values
pub trait IntoSqlValue {
    fn into_sql(self) -> SqlValue;
}

impl IntoSqlValue for SqlValue {
    fn into_sql(self) -> SqlValue {
        self
    }
}

impl IntoSqlValue for &str {
    fn into_sql(self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl IntoSqlValue for String {
    fn into_sql(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl IntoSqlValue for &String {
    fn into_sql(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl IntoSqlValue for i64 {
    fn into_sql(self) -> SqlValue {
        SqlValue::Integer(self)
    }
}

impl IntoSqlValue for i32 {
    fn into_sql(self) -> SqlValue {
        SqlValue::Integer(i64::from(self))
    }
}

impl IntoSqlValue for u32 {
    fn into_sql(self) -> SqlValue {
        SqlValue::Integer(i64::from(self))
    }
}

impl IntoSqlValue for f64 {
    fn into_sql(self) -> SqlValue {
        SqlValue::Real(self)
    }
}

impl IntoSqlValue for bool {
    fn into_sql(self) -> SqlValue {
        SqlValue::Integer(i64::from(self))
    }
}

/// Value side of one filter map entry
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Absent value; no predicate is emitted
    Null,
    /// `column = ?`
    Scalar(SqlValue),
    /// `column IN (?, ?, ...)`, bound in sequence order
    List(Vec<SqlValue>),
    /// `column BETWEEN ? AND ?`, inclusive
    Range(SqlValue, SqlValue),
}

impl FilterValue {
    pub fn equals(value: impl IntoSqlValue) -> Self {
        FilterValue::Scalar(value.into_sql())
    }

    pub fn list<T: IntoSqlValue>(values: impl IntoIterator<Item = T>) -> Self {
        FilterValue::List(values.into_iter().map(IntoSqlValue::into_sql).collect())
    }

    pub fn range(low: impl IntoSqlValue, high: impl IntoSqlValue) -> Self {
        FilterValue::Range(low.into_sql(), high.into_sql())
    }

    /// Inclusive date range where either end may be open
    ///
    /// Open ends fall back to sentinel dates so the predicate stays a single
    /// BETWEEN. Both ends absent yields [`FilterValue::Null`].
    pub fn date_range(start: Option<&str>, end: Option<&str>) -> Self {
        match (start, end) {
            (None, None) => FilterValue::Null,
            (start, end) => FilterValue::range(
                start.unwrap_or("1900-01-01"),
                end.unwrap_or("9999-12-31"),
            ),
        }
    }
}

macro_rules! scalar_filter_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FilterValue {
                fn from(value: $t) -> Self {
                    FilterValue::Scalar(value.into_sql())
                }
            }
        )*
    };
}

scalar_filter_from!(&str, String, &String, i64, i32, u32, f64, bool, SqlValue);

impl<T: IntoSqlValue> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FilterValue::Scalar(value.into_sql()),
            None => FilterValue::Null,
        }
    }
}

impl<T: IntoSqlValue> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::list(values)
    }
}

impl<A: IntoSqlValue, B: IntoSqlValue> From<(A, B)> for FilterValue {
    fn from((low, high): (A, B)) -> Self {
        FilterValue::range(low, high)
    }
}

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Typed aggregate expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Sum(String),
    Avg(String),
    /// `COUNT(*)`
    Count,
    CountDistinct(String),
    Min(String),
    Max(String),
}

impl Aggregate {
    pub fn sum(column: &str) -> Self {
        Aggregate::Sum(column.to_string())
    }

    pub fn avg(column: &str) -> Self {
        Aggregate::Avg(column.to_string())
    }

    pub fn count_distinct(column: &str) -> Self {
        Aggregate::CountDistinct(column.to_string())
    }

    pub fn min(column: &str) -> Self {
        Aggregate::Min(column.to_string())
    }

    pub fn max(column: &str) -> Self {
        Aggregate::Max(column.to_string())
    }

    fn column(&self) -> Option<&str> {
        match self {
            Aggregate::Count => None,
            Aggregate::Sum(c)
            | Aggregate::Avg(c)
            | Aggregate::CountDistinct(c)
            | Aggregate::Min(c)
            | Aggregate::Max(c) => Some(c),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Sum(c) => write!(f, "SUM({})", c),
            Aggregate::Avg(c) => write!(f, "AVG({})", c),
            Aggregate::Count => f.write_str("COUNT(*)"),
            Aggregate::CountDistinct(c) => write!(f, "COUNT(DISTINCT {})", c),
            Aggregate::Min(c) => write!(f, "MIN({})", c),
            Aggregate::Max(c) => write!(f, "MAX({})", c),
        }
    }
}

/// Comparison used by HAVING predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Having {
    aggregate: Aggregate,
    comparison: Comparison,
    value: SqlValue,
}

/// A composed statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Subject to the executor's row cap. Grouped aggregates that feed
    /// totals and rankings are not.
    pub capped: bool,
}

impl BuiltQuery {
    /// A statement with no generated clauses
    pub fn raw(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            capped: true,
        }
    }

    /// Fetch every row regardless of the executor's row cap
    pub fn uncapped(mut self) -> Self {
        self.capped = false;
        self
    }
}

/// Builder for analytics queries
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base_query: String,
    aliases: Vec<String>,
    continue_where: bool,
    filters: Vec<(String, FilterValue)>,
    group_by: Vec<String>,
    having: Vec<Having>,
    order_by: Vec<(String, SortOrder)>,
    limit: Option<u32>,
    uncapped: bool,
}

impl QueryBuilder {
    pub fn new(base_query: impl Into<String>) -> Self {
        Self {
            base_query: base_query.into(),
            aliases: Vec::new(),
            continue_where: false,
            filters: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            uncapped: false,
        }
    }

    /// Start from `SELECT <fields>, <AGG> AS <alias>, ... FROM <table>`
    ///
    /// Every alias is allowed in later clauses. The result is exempt from the
    /// executor's row cap.
    pub fn aggregation(
        table: &str,
        select_fields: &[&str],
        aggregations: &[(&str, Aggregate)],
    ) -> Result<Self, AnalyticsError> {
        if !schema::is_known_table(table) {
            return Err(AnalyticsError::invalid("table", format!("Unknown table '{}'", table)));
        }

        let mut select_parts = Vec::with_capacity(select_fields.len() + aggregations.len());
        for field in select_fields {
            check_identifier(field, &[])?;
            select_parts.push(field.to_string());
        }

        let mut aliases = Vec::with_capacity(aggregations.len());
        for (alias, aggregate) in aggregations {
            if !is_simple_identifier(alias) {
                return Err(AnalyticsError::invalid("alias", format!("Invalid alias '{}'", alias)));
            }
            if let Some(column) = aggregate.column() {
                check_identifier(column, &[])?;
            }
            select_parts.push(format!("{} AS {}", aggregate, alias));
            aliases.push(alias.to_string());
        }

        let base_query = format!("SELECT {} FROM {}", select_parts.join(", "), table);
        Ok(Self::new(base_query).allow(aliases).uncapped())
    }

    /// Exempt the built query from the executor's row cap
    pub fn uncapped(mut self) -> Self {
        self.uncapped = true;
        self
    }

    /// Declare call-site aliases that may appear in generated clauses
    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(names.into_iter().map(Into::into));
        self
    }

    /// The base query already has a WHERE clause; filters extend it with AND
    pub fn continue_where(mut self) -> Self {
        self.continue_where = true;
        self
    }

    pub fn filter(mut self, column: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn filters<I, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<FilterValue>,
    {
        for (column, value) in filters {
            self.filters.push((column.to_string(), value.into()));
        }
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(mut self, aggregate: Aggregate, comparison: Comparison, value: impl IntoSqlValue) -> Self {
        self.having.push(Having {
            aggregate,
            comparison,
            value: value.into_sql(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by.push((column.to_string(), order));
        self
    }

    /// `None` or `Some(0)` leaves the LIMIT clause out
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Compose the final statement
    pub fn build(self) -> Result<BuiltQuery, AnalyticsError> {
        let mut parts = vec![self.base_query.trim().to_string()];
        let mut params = Vec::new();

        let mut conditions = Vec::new();
        for (column, value) in &self.filters {
            if matches!(value, FilterValue::Null) {
                continue;
            }
            check_identifier(column, &self.aliases)?;

            match value {
                FilterValue::Null => {}
                FilterValue::Scalar(v) => {
                    conditions.push(format!("{} = ?", column));
                    params.push(v.clone());
                }
                FilterValue::List(values) => {
                    let placeholders = vec!["?"; values.len()].join(",");
                    conditions.push(format!("{} IN ({})", column, placeholders));
                    params.extend(values.iter().cloned());
                }
                FilterValue::Range(low, high) => {
                    conditions.push(format!("{} BETWEEN ? AND ?", column));
                    params.push(low.clone());
                    params.push(high.clone());
                }
            }
        }

        if !conditions.is_empty() {
            let keyword = if self.continue_where { "AND" } else { "WHERE" };
            parts.push(format!("{} {}", keyword, conditions.join(" AND ")));
        }

        if !self.group_by.is_empty() {
            for column in &self.group_by {
                check_identifier(column, &self.aliases)?;
            }
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.having.is_empty() {
            let mut predicates = Vec::with_capacity(self.having.len());
            for having in &self.having {
                if let Some(column) = having.aggregate.column() {
                    check_identifier(column, &self.aliases)?;
                }
                predicates.push(format!("{} {} ?", having.aggregate, having.comparison.as_sql()));
                params.push(having.value.clone());
            }
            parts.push(format!("HAVING {}", predicates.join(" AND ")));
        }

        if !self.order_by.is_empty() {
            let mut terms = Vec::with_capacity(self.order_by.len());
            for (column, order) in &self.order_by {
                check_identifier(column, &self.aliases)?;
                terms.push(format!("{} {}", column, order.as_sql()));
            }
            parts.push(format!("ORDER BY {}", terms.join(", ")));
        }

        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            parts.push(format!("LIMIT {}", limit));
        }

        Ok(BuiltQuery {
            sql: parts.join(" "),
            params,
            capped: !self.uncapped,
        })
    }
}

/// Compose a query against the known schema
///
/// Convenience form of [`QueryBuilder`] for call sites that only reference
/// schema columns.
pub fn build_query(
    base_query: &str,
    filters: Vec<(&'static str, FilterValue)>,
    group_by: Option<&[&str]>,
    order_by: Option<&[(&str, SortOrder)]>,
    limit: Option<u32>,
) -> Result<BuiltQuery, AnalyticsError> {
    let mut builder = QueryBuilder::new(base_query).filters(filters).limit(limit);
    if let Some(columns) = group_by {
        builder = builder.group_by(columns.iter().copied());
    }
    if let Some(terms) = order_by {
        for (column, order) in terms {
            builder = builder.order_by(column, *order);
        }
    }
    builder.build()
}

/// Compose `SELECT <fields>, <AGG> AS <alias>, ... FROM <table>` with the
/// usual optional clauses; aliases may be used for ordering
pub fn build_aggregation(
    table: &str,
    select_fields: &[&str],
    group_by: &[&str],
    aggregations: &[(&str, Aggregate)],
    filters: Vec<(&'static str, FilterValue)>,
    order_by: &[(&str, SortOrder)],
    limit: Option<u32>,
) -> Result<BuiltQuery, AnalyticsError> {
    let mut builder = QueryBuilder::aggregation(table, select_fields, aggregations)?
        .filters(filters)
        .group_by(group_by.iter().copied())
        .limit(limit);
    for (column, order) in order_by {
        builder = builder.order_by(column, *order);
    }
    builder.build()
}

fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn check_identifier(name: &str, aliases: &[String]) -> Result<(), AnalyticsError> {
    let allowed = |column: &str| schema::is_known_column(column) || aliases.iter().any(|a| a == column);

    let valid = match name.split_once('.') {
        Some((qualifier, column)) => is_simple_identifier(qualifier) && allowed(column),
        None => allowed(name),
    };

    if valid {
        Ok(())
    } else {
        Err(AnalyticsError::invalid(
            "column",
            format!("'{}' is not a permitted column identifier", name),
        ))
    }
}
