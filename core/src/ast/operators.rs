use serde::{Deserialize, Serialize};

/// What a [`crate::Command`] does to `table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Get,
    Set,
    Del,
    Add,
    Make,
    Drop,
    Alter,
    AlterDrop,
    Mod,
    Index,
    DropIndex,
    Truncate,
    Begin,
    Commit,
    Rollback,
    Savepoint,
    Release,
    RollbackTo,
    Listen,
    Notify,
    Unlisten,
    Raw,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Get => "GET",
            Action::Set => "SET",
            Action::Del => "DEL",
            Action::Add => "ADD",
            Action::Make => "MAKE",
            Action::Drop => "DROP",
            Action::Alter => "ALTER",
            Action::AlterDrop => "ALTER_DROP",
            Action::Mod => "MOD",
            Action::Index => "INDEX",
            Action::DropIndex => "DROP_INDEX",
            Action::Truncate => "TRUNCATE",
            Action::Begin => "BEGIN",
            Action::Commit => "COMMIT",
            Action::Rollback => "ROLLBACK",
            Action::Savepoint => "SAVEPOINT",
            Action::Release => "RELEASE",
            Action::RollbackTo => "ROLLBACK_TO",
            Action::Listen => "LISTEN",
            Action::Notify => "NOTIFY",
            Action::Unlisten => "UNLISTEN",
            Action::Raw => "RAW",
        };
        write!(f, "{s}")
    }
}

/// Logical connector chaining one where-clause to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    NotLike,
    NotILike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    Regex,
    RegexI,
    SimilarTo,
    Contains,
    Overlaps,
    KeyExists,
}

impl Operator {
    /// SQL rendering for operators that are a plain infix symbol or keyword.
    /// `Between`/`NotBetween`/`In`/`NotIn` need extra structure and are
    /// handled separately by the encoder; `IsNull`/`IsNotNull` take no value.
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::NotILike => "NOT ILIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Regex => "~",
            Operator::RegexI => "~*",
            Operator::SimilarTo => "SIMILAR TO",
            Operator::Contains => "@>",
            Operator::Overlaps => "&&",
            Operator::KeyExists => "?",
        }
    }

    /// `IS NULL` / `IS NOT NULL` are the only operators with no right-hand value.
    pub fn needs_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    pub fn is_simple_binary(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Gt
                | Operator::Gte
                | Operator::Lt
                | Operator::Lte
                | Operator::Like
                | Operator::NotLike
                | Operator::ILike
                | Operator::NotILike
                | Operator::Regex
                | Operator::RegexI
                | Operator::SimilarTo
                | Operator::Contains
                | Operator::Overlaps
                | Operator::KeyExists
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    ArrayAgg,
    StringAgg,
    JsonAgg,
    JsonbAgg,
    BoolAnd,
    BoolOr,
}

impl std::fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::ArrayAgg => "ARRAY_AGG",
            AggregateFunc::StringAgg => "STRING_AGG",
            AggregateFunc::JsonAgg => "JSON_AGG",
            AggregateFunc::JsonbAgg => "JSONB_AGG",
            AggregateFunc::BoolAnd => "BOOL_AND",
            AggregateFunc::BoolOr => "BOOL_OR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// ADD or DROP, for the `col_mod` expression variant (`ALTER TABLE ... ADD/DROP COLUMN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModKind {
    Add,
    Drop,
}
