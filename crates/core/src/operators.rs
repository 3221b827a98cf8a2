//! The closed WebQL operator set and its two classification tables.
//!
//! `category` and `arity` are total pure lookups over the enum; an
//! operator key outside the string mapping never becomes an `Operator`
//! in the first place (the AST builder rejects it as
//! `SemanticError::UnknownOperator`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    // relational
    Equals,
    NotEquals,
    Greater,
    GreaterEquals,
    Less,
    LessEquals,
    // arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    // string-relational
    Like,
    StartsWith,
    EndsWith,
    // logical
    And,
    Or,
    Not,
    // collection manipulation
    Filter,
    Select,
    Limit,
    Skip,
    // collection aggregation
    Count,
    Sum,
    Min,
    Max,
    Average,
    Any,
    All,
    // semantic
    Source,
    As,
    /// Grouping of several members inside one object literal. Never
    /// written by a query author; produced by the AST builder and
    /// resolved away by the desugar pass (or kept as a record
    /// constructor inside a projection).
    ObjectScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Arithmetic,
    Relational,
    StringRelational,
    Logical,
    CollectionManipulation,
    CollectionAggregation,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Nullary,
    Unary,
    Binary,
    Ternary,
}

impl Operator {
    /// Map a `$`-prefixed object key to an operator. `None` for keys
    /// outside the closed set.
    pub fn from_key(key: &str) -> Option<Operator> {
        use Operator::*;
        Some(match key {
            "$equals" => Equals,
            "$notEquals" => NotEquals,
            "$greater" => Greater,
            "$greaterEquals" => GreaterEquals,
            "$less" => Less,
            "$lessEquals" => LessEquals,
            "$add" => Add,
            "$subtract" => Subtract,
            "$multiply" => Multiply,
            "$divide" => Divide,
            "$modulo" => Modulo,
            "$negate" => Negate,
            "$like" => Like,
            "$startsWith" => StartsWith,
            "$endsWith" => EndsWith,
            "$and" => And,
            "$or" => Or,
            "$not" => Not,
            "$filter" | "$where" => Filter,
            "$select" | "$project" => Select,
            "$limit" => Limit,
            "$skip" => Skip,
            "$count" => Count,
            "$sum" => Sum,
            "$min" => Min,
            "$max" => Max,
            "$average" => Average,
            "$any" => Any,
            "$all" => All,
            "$source" => Source,
            "$as" => As,
            _ => return None,
        })
    }

    /// Canonical key (aliases render as their canonical form).
    pub fn key(&self) -> &'static str {
        use Operator::*;
        match self {
            Equals => "$equals",
            NotEquals => "$notEquals",
            Greater => "$greater",
            GreaterEquals => "$greaterEquals",
            Less => "$less",
            LessEquals => "$lessEquals",
            Add => "$add",
            Subtract => "$subtract",
            Multiply => "$multiply",
            Divide => "$divide",
            Modulo => "$modulo",
            Negate => "$negate",
            Like => "$like",
            StartsWith => "$startsWith",
            EndsWith => "$endsWith",
            And => "$and",
            Or => "$or",
            Not => "$not",
            Filter => "$filter",
            Select => "$select",
            Limit => "$limit",
            Skip => "$skip",
            Count => "$count",
            Sum => "$sum",
            Min => "$min",
            Max => "$max",
            Average => "$average",
            Any => "$any",
            All => "$all",
            Source => "$source",
            As => "$as",
            ObjectScope => "{}",
        }
    }

    pub fn category(&self) -> Category {
        use Operator::*;
        match self {
            Add | Subtract | Multiply | Divide | Modulo | Negate => Category::Arithmetic,
            Equals | NotEquals | Greater | GreaterEquals | Less | LessEquals => {
                Category::Relational
            }
            Like | StartsWith | EndsWith => Category::StringRelational,
            And | Or | Not => Category::Logical,
            Filter | Select | Limit | Skip => Category::CollectionManipulation,
            Count | Sum | Min | Max | Average | Any | All => Category::CollectionAggregation,
            Source | As | ObjectScope => Category::Semantic,
        }
    }

    /// Declared operand count. `And`/`Or` and `ObjectScope` accept any
    /// number of operands at or above the declared arity; the analyzer
    /// treats Binary as "at least two" for those three.
    pub fn arity(&self) -> Arity {
        use Operator::*;
        match self {
            Source => Arity::Nullary,
            Negate | Not | Count | ObjectScope => Arity::Unary,
            Equals | NotEquals | Greater | GreaterEquals | Less | LessEquals | Add | Subtract
            | Multiply | Divide | Modulo | Like | StartsWith | EndsWith | And | Or | Filter
            | Select | Limit | Skip | Sum | Min | Max | Average | Any | All | As => Arity::Binary,
        }
    }

    /// Operators whose second operand is a lambda over the element
    /// binding `$item`.
    pub fn is_iterator(&self) -> bool {
        use Operator::*;
        matches!(self, Filter | Select | Any | All | Sum | Min | Max | Average)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_operators() {
        assert_eq!(Operator::from_key("$where"), Some(Operator::Filter));
        assert_eq!(Operator::from_key("$project"), Some(Operator::Select));
        assert_eq!(Operator::from_key("$filter"), Some(Operator::Filter));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert_eq!(Operator::from_key("$frobnicate"), None);
        assert_eq!(Operator::from_key("equals"), None);
    }

    #[test]
    fn classification_is_total() {
        // Every operator answers both lookups without panicking.
        use Operator::*;
        let all = [
            Equals, NotEquals, Greater, GreaterEquals, Less, LessEquals, Add, Subtract,
            Multiply, Divide, Modulo, Negate, Like, StartsWith, EndsWith, And, Or, Not, Filter,
            Select, Limit, Skip, Count, Sum, Min, Max, Average, Any, All, Source, As,
            ObjectScope,
        ];
        for op in all {
            let _ = op.category();
            let _ = op.arity();
            let _ = op.key();
        }
    }

    #[test]
    fn source_is_the_only_nullary() {
        assert_eq!(Operator::Source.arity(), Arity::Nullary);
        assert_eq!(Operator::Filter.arity(), Arity::Binary);
        assert_eq!(Operator::Not.arity(), Arity::Unary);
    }

    #[test]
    fn categories_match_operator_families() {
        assert_eq!(Operator::Like.category(), Category::StringRelational);
        assert_eq!(Operator::Filter.category(), Category::CollectionManipulation);
        assert_eq!(Operator::Average.category(), Category::CollectionAggregation);
        assert_eq!(Operator::ObjectScope.category(), Category::Semantic);
    }
}
