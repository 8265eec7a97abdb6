use log::debug;

use crate::{
    error::{MartError, Result},
    frame::Table,
};

/// Unions the per-snapshot tables of one entity into a single table.
///
/// Inputs are folded left to right, each step chaining onto the running
/// result, so N inputs yield every row of all N. Columns must match the first
/// input positionally; a mismatch reports the offending input's position.
pub fn union_all(tables: &[Table]) -> Result<Table> {
    let (first, rest) = tables.split_first().ok_or(MartError::EmptyUnion)?;
    let combined = rest
        .iter()
        .enumerate()
        .try_fold(first.clone(), |running, (idx, next)| {
            running.union(next, idx + 1)
        })?;
    debug!(
        "Unioned {} table(s) of '{}' into {} row(s)",
        tables.len(),
        first.name(),
        combined.row_count()
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_cell;

    fn snapshot(columns: &[&str], ids: &[&str]) -> Table {
        Table::from_rows(
            "items",
            columns.iter().map(|c| c.to_string()).collect(),
            ids.iter().map(|id| vec![parse_cell(id)]).collect(),
        )
    }

    #[test]
    fn union_all_requires_an_input() {
        assert!(matches!(union_all(&[]), Err(MartError::EmptyUnion)));
    }

    #[test]
    fn union_all_of_one_is_identity() {
        let only = snapshot(&["item_id"], &["1", "2"]);
        assert_eq!(union_all(std::slice::from_ref(&only)).unwrap(), only);
    }

    #[test]
    fn union_all_keeps_rows_from_every_input() {
        let tables = vec![
            snapshot(&["item_id"], &["1", "2"]),
            snapshot(&["item_id"], &["3"]),
            snapshot(&["item_id"], &["4", "5", "6"]),
        ];
        let combined = union_all(&tables).unwrap();
        assert_eq!(combined.row_count(), 6);
        assert_eq!(combined.rows()[0][0], parse_cell("1"));
        assert_eq!(combined.rows()[5][0], parse_cell("6"));
    }

    #[test]
    fn union_all_names_the_mismatching_input() {
        let tables = vec![
            snapshot(&["item_id"], &["1"]),
            snapshot(&["item_id"], &["2"]),
            snapshot(&["id"], &["3"]),
        ];
        match union_all(&tables) {
            Err(MartError::SchemaMismatch { position, found, .. }) => {
                assert_eq!(position, 2);
                assert_eq!(found, vec!["id".to_string()]);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }
}
