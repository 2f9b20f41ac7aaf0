//! Query DSL.

use serde_json::{Map, Value, json};
use std::fmt;

/// A read query, rendered to the engine's JSON DSL by [`Query::to_json`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Query {
    /// Match all documents.
    #[default]
    MatchAll,
    /// Full-text match query.
    Match(MatchQuery),
    /// Term query for exact matches.
    Term(TermQuery),
    /// Terms query for multiple exact matches.
    Terms(TermsQuery),
    /// Range query.
    Range(RangeQuery),
    /// Fuzzy (edit distance) query.
    Fuzzy(FuzzyQuery),
    /// Documents with the given ids.
    Ids(Vec<String>),
    /// Bool query for combining queries.
    Bool(BoolQuery),
    /// Query string query.
    QueryString(QueryStringQuery),
    /// Prefix query.
    Prefix(PrefixQuery),
    /// Wildcard query.
    Wildcard(WildcardQuery),
    /// Exists query.
    Exists(ExistsQuery),
    /// Nested query.
    Nested(NestedQuery),
    /// Raw JSON query.
    Raw(Value),
}

impl Query {
    /// Full-text match on one field.
    pub fn match_query(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Query::Match(MatchQuery::new(field, query))
    }

    /// Exact term match.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term(TermQuery::new(field, value))
    }

    /// Match any of several exact values.
    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Terms(TermsQuery::new(field, values))
    }

    /// Fuzzy match with automatic edit distance.
    pub fn fuzzy(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Fuzzy(FuzzyQuery::new(field, value))
    }

    /// Documents with the given ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Documents having a value for `field`.
    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists(ExistsQuery {
            field: field.into(),
        })
    }

    /// Prefix match.
    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Prefix(PrefixQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Wildcard match (`*`, `?`).
    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard(WildcardQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Query-string syntax query.
    pub fn query_string(query: impl Into<String>) -> Self {
        Query::QueryString(QueryStringQuery::new(query))
    }

    /// Query over nested objects at `path`, scoring parents with `score_mode`.
    pub fn nested(path: impl Into<String>, query: Query, score_mode: ChildScoreMode) -> Self {
        Query::Nested(NestedQuery::new(path, query).score_mode(score_mode))
    }

    /// Start a bool query.
    pub fn bool() -> BoolQueryBuilder {
        BoolQueryBuilder::new()
    }

    /// Convert query to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match(m) => m.to_json(),
            Query::Term(t) => t.to_json(),
            Query::Terms(t) => t.to_json(),
            Query::Range(r) => r.to_json(),
            Query::Fuzzy(f) => f.to_json(),
            Query::Ids(ids) => json!({ "ids": { "values": ids } }),
            Query::Bool(b) => b.to_json(),
            Query::QueryString(q) => q.to_json(),
            Query::Prefix(p) => p.to_json(),
            Query::Wildcard(w) => w.to_json(),
            Query::Exists(e) => e.to_json(),
            Query::Nested(n) => n.to_json(),
            Query::Raw(v) => v.clone(),
        }
    }
}

impl From<RangeQuery> for Query {
    fn from(range: RangeQuery) -> Self {
        Query::Range(range)
    }
}

impl From<MatchQuery> for Query {
    fn from(query: MatchQuery) -> Self {
        Query::Match(query)
    }
}

impl From<FuzzyQuery> for Query {
    fn from(query: FuzzyQuery) -> Self {
        Query::Fuzzy(query)
    }
}

impl From<NestedQuery> for Query {
    fn from(query: NestedQuery) -> Self {
        Query::Nested(query)
    }
}

impl From<BoolQueryBuilder> for Query {
    fn from(builder: BoolQueryBuilder) -> Self {
        builder.build()
    }
}

/// Match query for full-text search.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    /// Field to search.
    pub field: String,
    /// Search query; text, number or boolean.
    pub query: Value,
    /// Operator (and/or).
    pub operator: Option<String>,
    /// Fuzziness for typo tolerance.
    pub fuzziness: Option<String>,
}

impl MatchQuery {
    /// Create a new match query.
    pub fn new(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            operator: None,
            fuzziness: None,
        }
    }

    /// Set the operator.
    pub fn operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    /// Set fuzziness.
    pub fn fuzziness(mut self, fuzz: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzz.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut query = json!({ "query": self.query });

        if let Some(op) = &self.operator {
            query["operator"] = json!(op);
        }
        if let Some(fuzz) = &self.fuzziness {
            query["fuzziness"] = json!(fuzz);
        }

        json!({ "match": { &self.field: query } })
    }
}

/// Term query for exact matching.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// Field name.
    pub field: String,
    /// Exact value to match.
    pub value: Value,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn to_json(&self) -> Value {
        json!({ "term": { &self.field: self.value } })
    }
}

/// Terms query for matching multiple values.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsQuery {
    /// Field name.
    pub field: String,
    /// Values to match.
    pub values: Vec<Value>,
}

impl TermsQuery {
    /// Create a new terms query.
    pub fn new(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    fn to_json(&self) -> Value {
        json!({ "terms": { &self.field: self.values } })
    }
}

/// Range query for numeric/date ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    /// Field name.
    pub field: String,
    /// Greater than.
    pub gt: Option<Value>,
    /// Greater than or equal.
    pub gte: Option<Value>,
    /// Less than.
    pub lt: Option<Value>,
    /// Less than or equal.
    pub lte: Option<Value>,
    /// Date format (for date fields).
    pub format: Option<String>,
}

impl RangeQuery {
    /// Create a new range query.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            format: None,
        }
    }

    /// Set greater than.
    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    /// Set greater than or equal.
    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    /// Set less than.
    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    /// Set less than or equal.
    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    /// Set date format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut range = Map::new();

        if let Some(v) = &self.gt {
            range.insert("gt".to_string(), v.clone());
        }
        if let Some(v) = &self.gte {
            range.insert("gte".to_string(), v.clone());
        }
        if let Some(v) = &self.lt {
            range.insert("lt".to_string(), v.clone());
        }
        if let Some(v) = &self.lte {
            range.insert("lte".to_string(), v.clone());
        }
        if let Some(v) = &self.format {
            range.insert("format".to_string(), json!(v));
        }

        json!({ "range": { &self.field: range } })
    }
}

/// Fuzzy query; matches terms within an edit distance of `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    /// Field name.
    pub field: String,
    /// Term to approximate.
    pub value: String,
    /// Edit distance (`AUTO`, `0`, `1`, `2`); the engine default is `AUTO`.
    pub fuzziness: Option<String>,
    /// Leading characters that must match exactly.
    pub prefix_length: Option<u32>,
    /// Maximum number of variations considered.
    pub max_expansions: Option<u32>,
    /// Whether a swap of two adjacent characters counts as one edit.
    pub transpositions: Option<bool>,
}

impl FuzzyQuery {
    /// Create a new fuzzy query.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            fuzziness: None,
            prefix_length: None,
            max_expansions: None,
            transpositions: None,
        }
    }

    /// Set fuzziness.
    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }

    /// Set prefix length.
    pub fn prefix_length(mut self, length: u32) -> Self {
        self.prefix_length = Some(length);
        self
    }

    /// Set max expansions.
    pub fn max_expansions(mut self, max: u32) -> Self {
        self.max_expansions = Some(max);
        self
    }

    /// Allow or forbid transpositions.
    pub fn transpositions(mut self, allow: bool) -> Self {
        self.transpositions = Some(allow);
        self
    }

    fn to_json(&self) -> Value {
        let mut fuzzy = json!({ "value": self.value });

        if let Some(f) = &self.fuzziness {
            fuzzy["fuzziness"] = json!(f);
        }
        if let Some(p) = self.prefix_length {
            fuzzy["prefix_length"] = json!(p);
        }
        if let Some(m) = self.max_expansions {
            fuzzy["max_expansions"] = json!(m);
        }
        if let Some(t) = self.transpositions {
            fuzzy["transpositions"] = json!(t);
        }

        json!({ "fuzzy": { &self.field: fuzzy } })
    }
}

/// Bool query for combining multiple queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Must match (AND).
    pub must: Vec<Query>,
    /// Should match (OR).
    pub should: Vec<Query>,
    /// Must not match (NOT).
    pub must_not: Vec<Query>,
    /// Filter (non-scoring).
    pub filter: Vec<Query>,
    /// Minimum should match.
    pub minimum_should_match: Option<i32>,
}

impl BoolQuery {
    /// Create a new bool query.
    pub fn new() -> Self {
        Self::default()
    }

    fn to_json(&self) -> Value {
        let mut bool_query = Map::new();

        let clauses = [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
            ("filter", &self.filter),
        ];
        for (name, queries) in clauses {
            if !queries.is_empty() {
                bool_query.insert(
                    name.to_string(),
                    Value::Array(queries.iter().map(Query::to_json).collect()),
                );
            }
        }

        if let Some(min) = self.minimum_should_match {
            bool_query.insert("minimum_should_match".to_string(), json!(min));
        }

        json!({ "bool": bool_query })
    }
}

/// Builder for bool queries.
#[derive(Debug, Clone, Default)]
pub struct BoolQueryBuilder {
    query: BoolQuery,
}

impl BoolQueryBuilder {
    /// Create a new bool query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must clause.
    pub fn must(mut self, query: impl Into<Query>) -> Self {
        self.query.must.push(query.into());
        self
    }

    /// Add a should clause.
    pub fn should(mut self, query: impl Into<Query>) -> Self {
        self.query.should.push(query.into());
        self
    }

    /// Add a must_not clause.
    pub fn must_not(mut self, query: impl Into<Query>) -> Self {
        self.query.must_not.push(query.into());
        self
    }

    /// Add a filter clause.
    pub fn filter(mut self, query: impl Into<Query>) -> Self {
        self.query.filter.push(query.into());
        self
    }

    /// Set minimum should match.
    pub fn minimum_should_match(mut self, min: i32) -> Self {
        self.query.minimum_should_match = Some(min);
        self
    }

    /// Build the query.
    pub fn build(self) -> Query {
        Query::Bool(self.query)
    }
}

/// Query string query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStringQuery {
    /// Query string.
    pub query: String,
    /// Default field.
    pub default_field: Option<String>,
    /// Fields to search.
    pub fields: Option<Vec<String>>,
}

impl QueryStringQuery {
    /// Create a new query string query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            default_field: None,
            fields: None,
        }
    }

    /// Set the default field.
    pub fn default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    /// Restrict the fields searched.
    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    fn to_json(&self) -> Value {
        let mut qs = json!({ "query": self.query });

        if let Some(df) = &self.default_field {
            qs["default_field"] = json!(df);
        }
        if let Some(fields) = &self.fields {
            qs["fields"] = json!(fields);
        }

        json!({ "query_string": qs })
    }
}

/// Prefix query.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    /// Field name.
    pub field: String,
    /// Prefix value.
    pub value: String,
}

impl PrefixQuery {
    fn to_json(&self) -> Value {
        json!({ "prefix": { &self.field: self.value } })
    }
}

/// Wildcard query.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    /// Field name.
    pub field: String,
    /// Wildcard pattern.
    pub value: String,
}

impl WildcardQuery {
    fn to_json(&self) -> Value {
        json!({ "wildcard": { &self.field: self.value } })
    }
}

/// Exists query.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsQuery {
    /// Field name.
    pub field: String,
}

impl ExistsQuery {
    fn to_json(&self) -> Value {
        json!({ "exists": { "field": self.field } })
    }
}

/// How matching nested children contribute to the parent's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildScoreMode {
    /// Children do not affect the score.
    #[default]
    None,
    /// Average of child scores.
    Avg,
    /// Highest child score.
    Max,
    /// Sum of child scores.
    Sum,
    /// Lowest child score.
    Min,
}

impl ChildScoreMode {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildScoreMode::None => "none",
            ChildScoreMode::Avg => "avg",
            ChildScoreMode::Max => "max",
            ChildScoreMode::Sum => "sum",
            ChildScoreMode::Min => "min",
        }
    }
}

impl fmt::Display for ChildScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nested query.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedQuery {
    /// Path to nested field.
    pub path: String,
    /// Inner query.
    pub query: Box<Query>,
    /// Score mode.
    pub score_mode: Option<ChildScoreMode>,
    /// Match nothing instead of failing when `path` is not mapped.
    pub ignore_unmapped: Option<bool>,
}

impl NestedQuery {
    /// Create a new nested query.
    pub fn new(path: impl Into<String>, query: Query) -> Self {
        Self {
            path: path.into(),
            query: Box::new(query),
            score_mode: None,
            ignore_unmapped: None,
        }
    }

    /// Set score mode.
    pub fn score_mode(mut self, mode: ChildScoreMode) -> Self {
        self.score_mode = Some(mode);
        self
    }

    /// Set ignore_unmapped.
    pub fn ignore_unmapped(mut self, ignore: bool) -> Self {
        self.ignore_unmapped = Some(ignore);
        self
    }

    fn to_json(&self) -> Value {
        let mut nested = json!({
            "path": self.path,
            "query": self.query.to_json()
        });

        if let Some(mode) = &self.score_mode {
            nested["score_mode"] = json!(mode.as_str());
        }
        if let Some(ignore) = self.ignore_unmapped {
            nested["ignore_unmapped"] = json!(ignore);
        }

        json!({ "nested": nested })
    }
}
