//! In-memory tabular engine used by every pipeline stage.
//!
//! A [`Table`] is an ordered header list plus rows of nullable [`Value`]
//! cells. It offers the handful of relational primitives the pipeline needs:
//! projection, exact-row distinct, single-column sort, positional union and
//! the equi inner join in "join using" layout.

use std::collections::{HashMap, HashSet};

use crate::{
    data::{ComparableValue, Value},
    error::{MartError, Result},
};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Counts produced by [`Table::inner_join`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub left_rows: usize,
    pub output_rows: usize,
    pub unmatched_left: usize,
    pub null_keys: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from already-shaped rows. Rows are padded or truncated
    /// to the header width.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| MartError::missing_column(&self.name, name))
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&Value>> {
        self.rows.iter().map(move |row| row.get(index).and_then(Option::as_ref))
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    /// Keeps the listed columns in the listed order.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Ok(Table {
            name: self.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Removes rows equal to an earlier row across every column. Nulls
    /// compare equal to nulls.
    pub fn distinct(&self) -> Table {
        let mut seen: HashSet<&Row> = HashSet::with_capacity(self.rows.len());
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(*row))
            .cloned()
            .collect();
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Stable ascending sort on one column, nulls first.
    pub fn sort_by_column(&mut self, index: usize) -> Result<()> {
        if index >= self.columns.len() {
            return Err(MartError::ColumnAccess {
                table: self.name.clone(),
            });
        }
        self.rows.sort_by(|left, right| {
            ComparableValue(left[index].as_ref()).cmp(&ComparableValue(right[index].as_ref()))
        });
        Ok(())
    }

    /// Positional union: appends `other`'s rows after this table's rows.
    pub fn union(&self, other: &Table, position: usize) -> Result<Table> {
        if self.columns != other.columns {
            return Err(MartError::SchemaMismatch {
                table: self.name.clone(),
                position,
                expected: self.columns.clone(),
                found: other.columns.clone(),
            });
        }
        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        rows.extend(self.rows.iter().cloned());
        rows.extend(other.rows.iter().cloned());
        Ok(Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Inner equi-join on a column both tables carry.
    ///
    /// Output layout is the key column, then this table's other columns, then
    /// the right table's other columns. A right column whose name clashes with
    /// an output column is renamed `right_{name}_{n}`. Null keys never match.
    pub fn inner_join(&self, right: &Table, key: &str) -> Result<(Table, JoinStats)> {
        let left_key = self.require_column(key)?;
        let right_key = right.require_column(key)?;

        let mut lookup: HashMap<&Value, Vec<&Row>> = HashMap::new();
        for row in &right.rows {
            if let Some(value) = row[right_key].as_ref() {
                lookup.entry(value).or_default().push(row);
            }
        }

        let left_rest = (0..self.columns.len())
            .filter(|idx| *idx != left_key)
            .collect::<Vec<_>>();
        let right_rest = (0..right.columns.len())
            .filter(|idx| *idx != right_key)
            .collect::<Vec<_>>();
        let columns = join_headers(
            key,
            left_rest.iter().map(|idx| &self.columns[*idx]),
            right_rest.iter().map(|idx| &right.columns[*idx]),
        );

        let mut stats = JoinStats {
            left_rows: self.rows.len(),
            ..JoinStats::default()
        };
        let mut rows = Vec::new();
        for row in &self.rows {
            let Some(value) = row[left_key].as_ref() else {
                stats.null_keys += 1;
                stats.unmatched_left += 1;
                continue;
            };
            let Some(matches) = lookup.get(value) else {
                stats.unmatched_left += 1;
                continue;
            };
            for matched in matches {
                let mut combined = Vec::with_capacity(columns.len());
                combined.push(Some(value.clone()));
                combined.extend(left_rest.iter().map(|idx| row[*idx].clone()));
                combined.extend(right_rest.iter().map(|idx| matched[*idx].clone()));
                rows.push(combined);
            }
        }
        stats.output_rows = rows.len();

        let table = Table {
            name: format!("{}_{}", self.name, right.name),
            columns,
            rows,
        };
        Ok((table, stats))
    }
}

fn join_headers<'a>(
    key: &str,
    left: impl Iterator<Item = &'a String>,
    right: impl Iterator<Item = &'a String>,
) -> Vec<String> {
    let mut headers = vec![key.to_string()];
    headers.extend(left.cloned());
    let mut seen: HashSet<String> = headers.iter().cloned().collect();
    for name in right {
        let mut candidate = name.clone();
        let mut counter = 1usize;
        while seen.contains(&candidate) {
            candidate = format!("right_{name}_{counter}");
            counter += 1;
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Row {
        values
            .iter()
            .map(|v| crate::data::parse_cell(v))
            .collect()
    }

    fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter().map(|r| cells(r)).collect(),
        )
    }

    #[test]
    fn from_rows_pads_short_rows_with_nulls() {
        let t = table("t", &["a", "b", "c"], &[&["1"]]);
        assert_eq!(t.rows()[0], vec![Some(Value::from("1")), None, None]);
    }

    #[test]
    fn distinct_keeps_first_occurrence_and_treats_nulls_equal() {
        let t = table("t", &["a", "b"], &[&["1", ""], &["2", "x"], &["1", ""]]);
        let d = t.distinct();
        assert_eq!(d.row_count(), 2);
        assert_eq!(d.rows()[0], cells(&["1", ""]));
    }

    #[test]
    fn sort_by_column_places_nulls_first_and_is_stable() {
        let mut t = table("t", &["k", "v"], &[&["b", "1"], &["", "2"], &["a", "3"], &["b", "0"]]);
        t.sort_by_column(0).unwrap();
        let firsts = t.column_values(1).map(|v| v.unwrap().as_display()).collect::<Vec<_>>();
        assert_eq!(firsts, vec!["2", "3", "1", "0"]);
    }

    #[test]
    fn union_rejects_reordered_columns() {
        let left = table("t", &["a", "b"], &[&["1", "2"]]);
        let right = table("t", &["b", "a"], &[&["2", "1"]]);
        let err = left.union(&right, 1).unwrap_err();
        assert!(matches!(err, MartError::SchemaMismatch { position: 1, .. }));
    }

    #[test]
    fn select_reports_missing_column() {
        let t = table("items", &["item_id"], &[]);
        let err = t.select(&["item_id", "item_status"]).unwrap_err();
        assert!(matches!(
            err,
            MartError::MissingColumn { ref column, .. } if column == "item_status"
        ));
    }

    #[test]
    fn inner_join_uses_key_first_layout_and_drops_null_keys() {
        let lines = table("lines", &["order_id", "qty"], &[&["1", "5"], &["", "7"], &["9", "1"]]);
        let headers = table("headers", &["order_id", "number"], &[&["1", "A"], &["1", "B"]]);
        let (joined, stats) = lines.inner_join(&headers, "order_id").unwrap();
        assert_eq!(joined.columns(), ["order_id", "qty", "number"]);
        assert_eq!(joined.row_count(), 2);
        assert_eq!(stats.null_keys, 1);
        assert_eq!(stats.unmatched_left, 2);
        assert_eq!(stats.output_rows, 2);
    }

    #[test]
    fn inner_join_renames_clashing_right_columns() {
        let left = table("l", &["id", "name"], &[&["1", "x"]]);
        let right = table("r", &["id", "name"], &[&["1", "y"]]);
        let (joined, _) = left.inner_join(&right, "id").unwrap();
        assert_eq!(joined.columns(), ["id", "name", "right_name_1"]);
    }
}
