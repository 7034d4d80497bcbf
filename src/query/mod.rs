//! Declarative read queries
//!
//! A [`Query`] captures everything a single store round trip needs: the base
//! table, the projection (including embedded relations), the predicates and
//! an optional single-column sort. Backends either encode it into PostgREST
//! URL parameters ([`Query::to_params`]) or evaluate it locally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Read query against one base table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    #[serde(default)]
    pub select: Select,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

impl Query {
    /// Start a query selecting every column of `table`
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Select::default(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select(mut self, select: Select) -> Self {
        self.select = select;
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(column, FilterOp::Lte, value)
    }

    /// Case-insensitive `LIKE`; `%` and `_` in `pattern` are wildcards
    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(column, FilterOp::ILike, pattern)
    }

    pub fn filter(
        mut self,
        column: impl Into<String>,
        op: FilterOp,
        value: impl Into<String>,
    ) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Encode as PostgREST query-string parameters (unescaped)
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        params.push(("select".to_string(), self.select.to_string()));

        for filter in &self.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), filter.value),
            ));
        }

        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.to_string()));
        }

        params
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?", self.table)?;
        let params = self.to_params();
        for (i, (key, value)) in params.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Projection: plain columns plus embedded relations
///
/// No columns and no relations selects `*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Select {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            relations: Vec::new(),
        }
    }

    pub fn embed(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn is_all(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    pub fn relation(&self, table: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.table == table)
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("*");
        }

        let mut first = true;
        for column in &self.columns {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(column)?;
            first = false;
        }
        for relation in &self.relations {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", relation)?;
            first = false;
        }
        Ok(())
    }
}

/// Related table embedded into each base row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub table: String,
    /// Empty means every column
    #[serde(default)]
    pub columns: Vec<String>,
    /// Inner join: base rows without a matching related row are dropped
    #[serde(default)]
    pub inner: bool,
}

impl Relation {
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            inner: false,
        }
    }

    /// Embed every column of `table`
    pub fn all(table: impl Into<String>) -> Self {
        Self::new(table, Vec::<String>::new())
    }

    pub fn inner(mut self) -> Self {
        self.inner = true;
        self
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)?;
        if self.inner {
            f.write_str("!inner")?;
        }
        if self.columns.is_empty() {
            f.write_str("(*)")
        } else {
            write!(f, "({})", self.columns.join(","))
        }
    }
}

/// Predicate on a base column or on `relation.column`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    /// Split `relation.column` into its parts; `None` for base columns
    pub fn relation_path(&self) -> Option<(&str, &str)> {
        self.column.split_once('.')
    }
}

/// Filter operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    ILike,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::ILike => "ilike",
        }
    }
}

/// Single-column sort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{}.{}", self.column, direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_listing_selects_star() {
        let query = Query::table("seasons");
        assert_eq!(
            query.to_params(),
            vec![("select".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn test_inner_join_range_encoding() {
        let query = Query::table("races")
            .select(
                Select::columns(["raceId", "year"])
                    .embed(Relation::new("circuits", ["circuitRef", "name"]).inner()),
            )
            .eq("circuits.circuitRef", "monza")
            .gte("year", "2015")
            .lte("year", "2020")
            .order("year", false);

        let params = query.to_params();
        assert_eq!(params[0].1, "raceId,year,circuits!inner(circuitRef,name)");
        assert_eq!(
            params[1],
            ("circuits.circuitRef".to_string(), "eq.monza".to_string())
        );
        assert_eq!(params[2], ("year".to_string(), "gte.2015".to_string()));
        assert_eq!(params[3], ("year".to_string(), "lte.2020".to_string()));
        assert_eq!(params[4], ("order".to_string(), "year.desc".to_string()));
    }

    #[test]
    fn test_relation_only_projection() {
        let select = Select::default().embed(Relation::all("circuits"));
        assert_eq!(select.to_string(), "circuits(*)");
        assert!(!select.is_all());
    }

    #[test]
    fn test_display_for_logging() {
        let query = Query::table("drivers")
            .ilike("driverRef", "sch%")
            .order("driverRef", true);
        assert_eq!(
            query.to_string(),
            "drivers?select=*&driverRef=ilike.sch%&order=driverRef.asc"
        );
    }

    #[test]
    fn test_relation_path() {
        let filter = Filter {
            column: "drivers.driverRef".into(),
            op: FilterOp::Eq,
            value: "hamilton".into(),
        };
        assert_eq!(filter.relation_path(), Some(("drivers", "driverRef")));
    }
}
