//! Dirty checking of state arrays.

use super::EntityPersister;
use crate::error::Result;
use crate::model::Attribute;
use crate::types::Value;

/// Positions whose value changed between `previous` and `current`, or
/// `None` when nothing did.
///
/// An unfetched current value is never dirty. An unfetched previous value
/// counts as dirty, since there is nothing to compare against. Otherwise
/// only attributes taking part in dirty checking are compared.
pub fn find_dirty(attributes: &[Attribute], previous: &[Value], current: &[Value]) -> Option<Vec<usize>> {
    let dirty: Vec<usize> = attributes
        .iter()
        .zip(previous.iter().zip(current))
        .enumerate()
        .filter(|(_, (attribute, (old, new)))| {
            !new.is_unfetched()
                && (old.is_unfetched()
                    || (attribute.include_in_dirty_check && attribute.is_dirty(old, new)))
        })
        .map(|(i, _)| i)
        .collect();
    if dirty.is_empty() {
        None
    } else {
        tracing::trace!(?dirty, "dirty attributes found");
        Some(dirty)
    }
}

impl EntityPersister {
    pub fn find_dirty(&self, previous: &[Value], current: &[Value]) -> Result<Option<Vec<usize>>> {
        self.descriptor.check_state(previous)?;
        self.descriptor.check_state(current)?;
        Ok(find_dirty(self.descriptor.attributes(), previous, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, NavigableRole};
    use crate::types::{DomainType, SqlExpressableType};
    use proptest::prelude::*;

    fn attributes(n: usize) -> Vec<Attribute> {
        (0..n)
            .map(|i| {
                let name = format!("a{i}");
                Attribute::basic(
                    NavigableRole::new("Person").append(&name),
                    i,
                    Column::new("person", name, SqlExpressableType::of(DomainType::Long)),
                )
            })
            .collect()
    }

    fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Unfetched),
            Just(Value::Null),
            (0i64..3).prop_map(Value::Long),
        ]
    }

    #[test]
    fn test_unchanged_state_is_clean() {
        let attrs = attributes(2);
        let state = vec![Value::Long(1), Value::Null];
        assert_eq!(find_dirty(&attrs, &state, &state), None);
    }

    #[test]
    fn test_excluded_attributes_are_not_compared() {
        let mut attrs = attributes(2);
        attrs[0].include_in_dirty_check = false;
        let dirty = find_dirty(
            &attrs,
            &[Value::Long(1), Value::Long(1)],
            &[Value::Long(2), Value::Long(2)],
        );
        assert_eq!(dirty, Some(vec![1]));
    }

    #[test]
    fn test_unfetched_values() {
        let attrs = attributes(2);
        let dirty = find_dirty(
            &attrs,
            &[Value::Unfetched, Value::Long(1)],
            &[Value::Long(1), Value::Unfetched],
        );
        assert_eq!(dirty, Some(vec![0]));
    }

    #[test]
    fn test_persister_checks_state_length() {
        let persister = &super::super::tests::build(&super::super::tests::person())[0];
        assert!(persister.find_dirty(&[], &[Value::Null]).is_err());
        assert_eq!(
            persister.find_dirty(&[Value::text("Ann")], &[Value::text("Bob")]).unwrap(),
            Some(vec![0])
        );
    }

    proptest! {
        #[test]
        fn prop_dirty_positions_match_rule(
            pairs in proptest::collection::vec((value(), value()), 0..8)
        ) {
            let attrs = attributes(pairs.len());
            let previous: Vec<Value> = pairs.iter().map(|(p, _)| p.clone()).collect();
            let current: Vec<Value> = pairs.iter().map(|(_, c)| c.clone()).collect();
            let expected: Vec<usize> = pairs
                .iter()
                .enumerate()
                .filter(|(_, (p, c))| !c.is_unfetched() && (p.is_unfetched() || p != c))
                .map(|(i, _)| i)
                .collect();
            let found = find_dirty(&attrs, &previous, &current).unwrap_or_default();
            prop_assert_eq!(found, expected);
        }
    }
}
