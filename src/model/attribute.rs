//! State-array attributes: columns, dehydration and dirty checking.
//!
//! Values come in two forms. The *domain* form may hold
//! [`Value::Embeddable`] instances and [`Value::EntityRef`] references; the
//! *unresolved* form replaces them with [`Value::Composite`] parts and the
//! referenced identifier. [`Attribute::unresolve`] maps domain to unresolved
//! and is idempotent; [`Attribute::resolve`] goes the other way.
//! Dehydration turns an unresolved value into one JDBC value per column.

use super::navigable::{NavigableRole, QueryResult};
use super::table::Column;
use crate::error::{Error, Result};
use crate::sql::ColumnReference;
use crate::types::{DomainType, SqlExpressableType, SqlTypeCode, Value};

/// The statement clause a value is being dehydrated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Insert,
    Update,
    Where,
    Delete,
    Select,
}

/// One column-level value produced by dehydration.
#[derive(Debug, Clone, PartialEq)]
pub struct JdbcValue<'a> {
    pub value: Value,
    pub column: &'a Column,
}

impl JdbcValue<'_> {
    pub fn ty(&self) -> &SqlExpressableType {
        &self.column.expressable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPrecision {
    Date,
    Time,
    Timestamp,
}

impl TemporalPrecision {
    fn sql_type(self) -> SqlTypeCode {
        match self {
            Self::Date => SqlTypeCode::Date,
            Self::Time => SqlTypeCode::Time,
            Self::Timestamp => SqlTypeCode::Timestamp,
        }
    }
}

/// An embeddable (component) type: an ordered group of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddableType {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl EmbeddableType {
    pub fn columns(&self) -> Vec<&Column> {
        self.attributes.iter().flat_map(Attribute::columns).collect()
    }

    pub fn jdbc_type_count(&self) -> usize {
        self.attributes.iter().map(Attribute::jdbc_type_count).sum()
    }

    /// Extracts the parts of an embeddable instance and unresolves each one
    /// through its own attribute. An all-null result collapses to `Null`.
    pub fn unresolve(&self, value: &Value) -> Result<Value> {
        let parts = match value {
            Value::Null | Value::Unfetched => return Ok(value.clone()),
            Value::Embeddable(e) if e.type_name == self.name => &e.values,
            Value::Composite(parts) => parts,
            other => {
                return Err(Error::modeling(format!(
                    "cannot unresolve [{}] as embeddable {}",
                    other.loggable(),
                    self.name
                )));
            }
        };
        self.check_arity(parts.len())?;
        let unresolved = self
            .attributes
            .iter()
            .zip(parts)
            .map(|(attribute, part)| attribute.unresolve(part))
            .collect::<Result<Vec<_>>>()?;
        if unresolved.iter().all(Value::is_null) {
            return Ok(Value::Null);
        }
        Ok(Value::Composite(unresolved))
    }

    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::Composite(parts) if parts.iter().all(Value::is_null_like) => Value::Null,
            Value::Composite(parts) => Value::embeddable(
                self.name.clone(),
                self.attributes
                    .iter()
                    .zip(parts)
                    .map(|(attribute, part)| attribute.resolve(part))
                    .collect(),
            ),
            Value::Embeddable(e) => Value::embeddable(
                e.type_name.clone(),
                self.attributes
                    .iter()
                    .zip(&e.values)
                    .map(|(attribute, part)| attribute.resolve(part))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn dehydrate<'a>(
        &'a self,
        value: &Value,
        clause: Clause,
        out: &mut Vec<JdbcValue<'a>>,
    ) -> Result<()> {
        match value {
            Value::Null | Value::Unfetched => {
                for attribute in &self.attributes {
                    attribute.dehydrate(&Value::Null, clause, out)?;
                }
                Ok(())
            }
            Value::Composite(parts) => {
                self.check_arity(parts.len())?;
                for (attribute, part) in self.attributes.iter().zip(parts) {
                    attribute.dehydrate(part, clause, out)?;
                }
                Ok(())
            }
            Value::Embeddable(_) => self.dehydrate(&self.unresolve(value)?, clause, out),
            other => Err(Error::modeling(format!(
                "cannot dehydrate [{}] as embeddable {}",
                other.loggable(),
                self.name
            ))),
        }
    }

    /// Builds the embeddable from its flat, extracted column values.
    pub fn hydrate(&self, row: &[Value]) -> Result<Value> {
        if row.len() != self.jdbc_type_count() {
            return Err(Error::modeling(format!(
                "embeddable {} expects {} column values, got {}",
                self.name,
                self.jdbc_type_count(),
                row.len()
            )));
        }
        if row.iter().all(Value::is_null) {
            return Ok(Value::Null);
        }
        let mut values = Vec::with_capacity(self.attributes.len());
        let mut offset = 0;
        for attribute in &self.attributes {
            let span = attribute.jdbc_type_count();
            values.push(attribute.hydrate(&row[offset..offset + span])?);
            offset += span;
        }
        Ok(Value::embeddable(self.name.clone(), values))
    }

    pub fn is_dirty(&self, old: &Value, new: &Value) -> bool {
        match (self.unresolve(old), self.unresolve(new)) {
            (Ok(Value::Composite(a)), Ok(Value::Composite(b))) => self
                .attributes
                .iter()
                .zip(a.iter().zip(&b))
                .any(|(attribute, (x, y))| attribute.is_dirty(x, y)),
            (Ok(a), Ok(b)) => a != b,
            _ => true,
        }
    }

    pub fn rebind(&self, from_table: &str, to_table: &str) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self
                .attributes
                .iter()
                .map(|a| a.rebind(from_table, to_table))
                .collect(),
        }
    }

    fn check_arity(&self, parts: usize) -> Result<()> {
        if parts != self.attributes.len() {
            return Err(Error::modeling(format!(
                "embeddable {} has {} attributes, value has {} parts",
                self.name,
                self.attributes.len(),
                parts
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Basic {
        column: Column,
    },
    Embedded(EmbeddableType),
    /// Many-to-one / one-to-one owning side; the columns hold the target id.
    ToOne {
        target_entity: String,
        columns: Vec<Column>,
    },
    /// Plural attribute. Owns no columns on the entity's tables.
    Collection {
        role: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub role: NavigableRole,
    /// Slot in the owning state array (or embeddable value list).
    pub position: usize,
    pub kind: AttributeKind,
    pub insertable: bool,
    pub updatable: bool,
    pub include_in_dirty_check: bool,
    /// Participates in optimistic locking.
    pub versionable: bool,
    pub natural_id: bool,
    pub lazy: bool,
    pub nullable: bool,
}

impl Attribute {
    pub fn new(role: NavigableRole, position: usize, kind: AttributeKind) -> Self {
        Self {
            name: role.navigable_name().to_string(),
            role,
            position,
            kind,
            insertable: true,
            updatable: true,
            include_in_dirty_check: true,
            versionable: true,
            natural_id: false,
            lazy: false,
            nullable: true,
        }
    }

    pub fn basic(role: NavigableRole, position: usize, column: Column) -> Self {
        Self::new(role, position, AttributeKind::Basic { column })
    }

    pub fn is_singular(&self) -> bool {
        !matches!(self.kind, AttributeKind::Collection { .. })
    }

    pub fn is_collection(&self) -> bool {
        !self.is_singular()
    }

    pub fn columns(&self) -> Vec<&Column> {
        match &self.kind {
            AttributeKind::Basic { column } => vec![column],
            AttributeKind::Embedded(embeddable) => embeddable.columns(),
            AttributeKind::ToOne { columns, .. } => columns.iter().collect(),
            AttributeKind::Collection { .. } => Vec::new(),
        }
    }

    pub fn jdbc_type_count(&self) -> usize {
        match &self.kind {
            AttributeKind::Basic { .. } => 1,
            AttributeKind::Embedded(embeddable) => embeddable.jdbc_type_count(),
            AttributeKind::ToOne { columns, .. } => columns.len(),
            AttributeKind::Collection { .. } => 0,
        }
    }

    pub fn has_column_in(&self, table: &str) -> bool {
        self.columns().iter().any(|c| c.belongs_to(table))
    }

    pub fn domain_type(&self) -> DomainType {
        match &self.kind {
            AttributeKind::Basic { column } => column.expressable.domain_type().clone(),
            AttributeKind::Embedded(embeddable) => DomainType::Embeddable(embeddable.name.clone()),
            AttributeKind::ToOne { target_entity, .. } => DomainType::Entity(target_entity.clone()),
            AttributeKind::Collection { role } => DomainType::Embeddable(role.clone()),
        }
    }

    /// Normalizes a domain value into its persistable form.
    pub fn unresolve(&self, value: &Value) -> Result<Value> {
        match (&self.kind, value) {
            (_, Value::Null | Value::Unfetched) => Ok(value.clone()),
            (AttributeKind::Embedded(embeddable), _) => embeddable.unresolve(value),
            (AttributeKind::ToOne { .. }, Value::EntityRef(reference)) => Ok((*reference.id).clone()),
            (AttributeKind::Collection { .. }, _) => Ok(Value::Null),
            _ => Ok(value.clone()),
        }
    }

    /// Inverse of [`unresolve`](Self::unresolve).
    pub fn resolve(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (_, Value::Null | Value::Unfetched) => value.clone(),
            (AttributeKind::Embedded(embeddable), _) => embeddable.resolve(value),
            (AttributeKind::ToOne { .. }, Value::EntityRef(_)) => value.clone(),
            (AttributeKind::ToOne { target_entity, .. }, id) => {
                Value::entity_ref(target_entity.clone(), id.clone())
            }
            _ => value.clone(),
        }
    }

    /// Appends one [`JdbcValue`] per owned column that applies to `clause`.
    ///
    /// `value` should be unresolved; domain forms are unresolved first.
    pub fn dehydrate<'a>(
        &'a self,
        value: &Value,
        clause: Clause,
        out: &mut Vec<JdbcValue<'a>>,
    ) -> Result<()> {
        match clause {
            Clause::Insert if !self.insertable => return Ok(()),
            Clause::Update if !self.updatable => return Ok(()),
            _ => {}
        }
        let writes = matches!(clause, Clause::Insert | Clause::Update);
        match &self.kind {
            AttributeKind::Basic { column } => {
                if !(writes && column.is_derived()) {
                    out.push(JdbcValue {
                        value: plain(value),
                        column,
                    });
                }
                Ok(())
            }
            AttributeKind::Embedded(embeddable) => embeddable.dehydrate(value, clause, out),
            AttributeKind::ToOne { target_entity, columns } => {
                let unresolved = self.unresolve(value)?;
                let parts = match (&unresolved, columns.len()) {
                    (Value::Null | Value::Unfetched, n) => vec![Value::Null; n],
                    (Value::Composite(parts), n) if parts.len() == n => parts.clone(),
                    (Value::Composite(_), _) => {
                        return Err(Error::modeling(format!(
                            "identifier of {target_entity} does not match the {} columns of {}",
                            columns.len(),
                            self.role
                        )));
                    }
                    (single, 1) => vec![single.clone()],
                    (single, _) => {
                        return Err(Error::modeling(format!(
                            "[{}] cannot be spread over the {} columns of {}",
                            single.loggable(),
                            columns.len(),
                            self.role
                        )));
                    }
                };
                for (column, part) in columns.iter().zip(parts) {
                    if !(writes && column.is_derived()) {
                        out.push(JdbcValue { value: part, column });
                    }
                }
                Ok(())
            }
            AttributeKind::Collection { .. } => Ok(()),
        }
    }

    /// Builds the domain value from this attribute's slice of a row.
    pub fn hydrate(&self, row: &[Value]) -> Result<Value> {
        if row.len() != self.jdbc_type_count() {
            return Err(Error::modeling(format!(
                "{} expects {} column values, got {}",
                self.role,
                self.jdbc_type_count(),
                row.len()
            )));
        }
        match &self.kind {
            AttributeKind::Basic { .. } => Ok(row[0].clone()),
            AttributeKind::Embedded(embeddable) => embeddable.hydrate(row),
            AttributeKind::ToOne { target_entity, .. } => {
                if row.iter().all(Value::is_null) {
                    Ok(Value::Null)
                } else if row.len() == 1 {
                    Ok(Value::entity_ref(target_entity.clone(), row[0].clone()))
                } else {
                    Ok(Value::entity_ref(target_entity.clone(), Value::Composite(row.to_vec())))
                }
            }
            AttributeKind::Collection { .. } => Ok(Value::Unfetched),
        }
    }

    /// Whether `old` and `new` differ for dirty-checking purposes.
    pub fn is_dirty(&self, old: &Value, new: &Value) -> bool {
        match &self.kind {
            AttributeKind::Basic { column } => {
                !column.expressable.domain_type().are_equal(old, new)
            }
            AttributeKind::Embedded(embeddable) => embeddable.is_dirty(old, new),
            AttributeKind::ToOne { .. } => match (self.unresolve(old), self.unresolve(new)) {
                (Ok(a), Ok(b)) => a != b,
                _ => true,
            },
            // collection dirtiness is tracked by the collection itself
            AttributeKind::Collection { .. } => false,
        }
    }

    pub fn create_query_result(&self, alias: &str) -> Result<QueryResult> {
        if self.is_collection() {
            return Err(Error::modeling(format!(
                "plural attribute {} cannot be selected as a column result",
                self.role
            )));
        }
        Ok(QueryResult {
            role: self.role.clone(),
            columns: self
                .columns()
                .into_iter()
                .map(|c| ColumnReference::new(alias, c.name.clone()))
                .collect(),
        })
    }

    /// The parameter type to use when this attribute is bound with an
    /// explicit temporal precision. Only basic temporal attributes qualify.
    pub fn resolve_temporal_precision(
        &self,
        precision: TemporalPrecision,
    ) -> Result<SqlExpressableType> {
        match &self.kind {
            AttributeKind::Basic { column } if column.expressable.domain_type().is_temporal() => {
                Ok(SqlExpressableType::new(
                    column.expressable.domain_type().clone(),
                    precision.sql_type(),
                ))
            }
            _ => Err(Error::modeling(format!(
                "{} is not a basic temporal attribute; cannot apply temporal precision",
                self.role
            ))),
        }
    }

    /// Copy with every column of `from_table` moved to `to_table`.
    pub fn rebind(&self, from_table: &str, to_table: &str) -> Self {
        let move_column = |c: &Column| {
            if c.belongs_to(from_table) {
                c.rebind(to_table)
            } else {
                c.clone()
            }
        };
        let kind = match &self.kind {
            AttributeKind::Basic { column } => AttributeKind::Basic {
                column: move_column(column),
            },
            AttributeKind::Embedded(embeddable) => {
                AttributeKind::Embedded(embeddable.rebind(from_table, to_table))
            }
            AttributeKind::ToOne { target_entity, columns } => AttributeKind::ToOne {
                target_entity: target_entity.clone(),
                columns: columns.iter().map(move_column).collect(),
            },
            AttributeKind::Collection { role } => AttributeKind::Collection { role: role.clone() },
        };
        Self {
            kind,
            ..self.clone()
        }
    }
}

fn plain(value: &Value) -> Value {
    match value {
        Value::Unfetched => Value::Null,
        other => other.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn column(table: &str, name: &str, domain: DomainType) -> Column {
        Column::new(table, name, SqlExpressableType::of(domain))
    }

    pub(crate) fn basic(owner: &str, name: &str, position: usize, domain: DomainType) -> Attribute {
        Attribute::basic(
            NavigableRole::new(owner).append(name),
            position,
            column(&owner.to_lowercase(), name, domain),
        )
    }

    pub(crate) fn address(position: usize) -> Attribute {
        let role = NavigableRole::new("Person").append("address");
        let embeddable = EmbeddableType {
            name: "Address".to_string(),
            attributes: vec![
                Attribute::basic(role.append("street"), 0, column("person", "street", DomainType::String)),
                Attribute::basic(role.append("city"), 1, column("person", "city", DomainType::String)),
            ],
        };
        Attribute::new(role, position, AttributeKind::Embedded(embeddable))
    }

    fn employer(position: usize) -> Attribute {
        Attribute::new(
            NavigableRole::new("Person").append("employer"),
            position,
            AttributeKind::ToOne {
                target_entity: "Company".to_string(),
                columns: vec![column("person", "employer_id", DomainType::Long)],
            },
        )
    }

    #[test]
    fn test_embedded_unresolve_and_dehydrate() {
        let attribute = address(0);
        let value = Value::embeddable("Address", vec![Value::text("Main St"), Value::Null]);
        let unresolved = attribute.unresolve(&value).unwrap();
        assert_eq!(unresolved, Value::Composite(vec![Value::text("Main St"), Value::Null]));

        let mut out = Vec::new();
        attribute.dehydrate(&unresolved, Clause::Insert, &mut out).unwrap();
        let names: Vec<&str> = out.iter().map(|v| v.column.name.as_str()).collect();
        assert_eq!(names, vec!["street", "city"]);
        assert_eq!(out[1].value, Value::Null);
    }

    #[test]
    fn test_all_null_embeddable_unresolves_to_null() {
        let attribute = address(0);
        let value = Value::embeddable("Address", vec![Value::Null, Value::Null]);
        assert_eq!(attribute.unresolve(&value).unwrap(), Value::Null);

        let mut out = Vec::new();
        attribute.dehydrate(&Value::Null, Clause::Where, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.value.is_null()));
    }

    #[test]
    fn test_embedded_arity_mismatch() {
        let attribute = address(0);
        let mut out = Vec::new();
        let err = attribute
            .dehydrate(&Value::Composite(vec![Value::Null]), Clause::Insert, &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::Modeling(_)));
    }

    #[test]
    fn test_to_one_unresolves_to_id() {
        let attribute = employer(1);
        let reference = Value::entity_ref("Company", Value::Long(9));
        assert_eq!(attribute.unresolve(&reference).unwrap(), Value::Long(9));
        assert_eq!(attribute.resolve(&Value::Long(9)), reference);
        assert_eq!(attribute.hydrate(&[Value::Long(9)]).unwrap(), reference);
        assert_eq!(attribute.hydrate(&[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_clause_filtering() {
        let mut attribute = basic("Person", "created", 0, DomainType::Timestamp);
        attribute.updatable = false;
        let mut out = Vec::new();
        attribute.dehydrate(&Value::Timestamp(1), Clause::Update, &mut out).unwrap();
        assert!(out.is_empty());
        attribute.dehydrate(&Value::Timestamp(1), Clause::Insert, &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_derived_column_not_written() {
        let role = NavigableRole::new("Person").append("upper_name");
        let attribute = Attribute::basic(
            role,
            0,
            Column::derived("person", "upper(name)", SqlExpressableType::of(DomainType::String)),
        );
        let mut out = Vec::new();
        attribute.dehydrate(&Value::text("A"), Clause::Insert, &mut out).unwrap();
        assert!(out.is_empty());
        attribute.dehydrate(&Value::text("A"), Clause::Where, &mut out).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_hydrate_embeddable() {
        let attribute = address(0);
        assert_eq!(
            attribute.hydrate(&[Value::text("a"), Value::text("b")]).unwrap(),
            Value::embeddable("Address", vec![Value::text("a"), Value::text("b")])
        );
        assert_eq!(attribute.hydrate(&[Value::Null, Value::Null]).unwrap(), Value::Null);
        assert!(attribute.hydrate(&[Value::Null]).is_err());
    }

    #[test]
    fn test_temporal_precision() {
        let attribute = basic("Person", "born", 0, DomainType::Date);
        let ty = attribute
            .resolve_temporal_precision(TemporalPrecision::Timestamp)
            .unwrap();
        assert_eq!(ty.sql_type(), SqlTypeCode::Timestamp);
        assert!(address(1)
            .resolve_temporal_precision(TemporalPrecision::Date)
            .is_err());
    }

    #[test]
    fn test_embedded_dirty_check() {
        let attribute = address(0);
        let a = Value::embeddable("Address", vec![Value::text("x"), Value::text("y")]);
        let b = Value::embeddable("Address", vec![Value::text("x"), Value::text("z")]);
        assert!(attribute.is_dirty(&a, &b));
        assert!(!attribute.is_dirty(&a, &a.clone()));
        assert!(!attribute.is_dirty(&Value::Null, &Value::embeddable("Address", vec![Value::Null, Value::Null])));
    }

    fn text_or_null() -> impl Strategy<Value = Value> {
        prop_oneof![Just(Value::Null), "[a-z]{0,4}".prop_map(Value::Text)]
    }

    fn address_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            (text_or_null(), text_or_null())
                .prop_map(|(a, b)| Value::embeddable("Address", vec![a, b])),
            (text_or_null(), text_or_null()).prop_map(|(a, b)| Value::Composite(vec![a, b])),
        ]
    }

    proptest! {
        #[test]
        fn test_embedded_unresolve_is_idempotent(value in address_value()) {
            let attribute = address(0);
            let once = attribute.unresolve(&value).unwrap();
            prop_assert_eq!(attribute.unresolve(&once).unwrap(), once.clone());
            prop_assert_eq!(attribute.unresolve(&attribute.resolve(&value)).unwrap(), once);
        }

        #[test]
        fn test_to_one_round_trip(id in proptest::option::of(any::<i64>())) {
            let attribute = employer(0);
            let value = Value::from(id);
            let unresolved = attribute.unresolve(&value).unwrap();
            prop_assert_eq!(attribute.unresolve(&attribute.resolve(&value)).unwrap(), unresolved);
        }
    }
}
