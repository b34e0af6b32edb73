//! Database-assigned row identifiers.

use super::navigable::{NavigableRole, QueryResult};
use super::table::Column;
use crate::error::{Error, Result};

/// Row id of the root table. Used internally to address rows on update,
/// delete and lock; never part of a domain query's results.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIdDescriptor {
    pub role: NavigableRole,
    pub column: Column,
}

impl RowIdDescriptor {
    pub fn column_name(&self) -> &str {
        &self.column.name
    }

    pub fn create_query_result(&self, _alias: &str) -> Result<QueryResult> {
        Err(Error::modeling(format!(
            "row id {} cannot be selected in a domain query",
            self.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::navigable::ROW_ID_NAME;
    use crate::model::table::ROW_ID_COLUMN;
    use crate::types::{DomainType, SqlExpressableType, SqlTypeCode};

    #[test]
    fn test_row_id_is_never_selectable() {
        let row_id = RowIdDescriptor {
            role: NavigableRole::new("Person").append(ROW_ID_NAME),
            column: Column::derived(
                "person",
                ROW_ID_COLUMN,
                SqlExpressableType::new(DomainType::String, SqlTypeCode::RowId),
            ),
        };
        assert_eq!(row_id.column_name(), "ROW_ID");
        assert!(matches!(row_id.create_query_result("p1_0"), Err(Error::Modeling(_))));
    }
}
