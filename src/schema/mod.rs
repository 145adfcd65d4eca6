// schema/mod.rs - The schema catalog
//
// A Catalog is the fixed set of tables a test suite knows about, kept in
// dependency order: every table comes after all tables it references through
// a foreign key. Both creation (forward order) and cleanup (reverse order)
// lean on that ordering, so it is computed once, when the catalog is built.

mod dialect;

pub use dialect::Dialect;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{FixtureError, Result};

/// Column types a fixture value can be stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub not_null: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
            not_null: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// `columns` of the owning table reference `referenced_columns` of `references`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references: String,
    pub referenced_columns: Vec<String>,
}

/// One table definition: columns plus outgoing foreign keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Single-column foreign key, the common case
    pub fn foreign_key(
        self,
        column: impl Into<String>,
        references: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_key_columns(vec![column.into()], references, vec![referenced_column.into()])
    }

    pub fn foreign_key_columns(
        mut self,
        columns: Vec<String>,
        references: impl Into<String>,
        referenced_columns: Vec<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            columns,
            references: references.into(),
            referenced_columns,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Tables this one must be created after (self-references excluded)
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references.as_str())
            .filter(move |name| *name != self.name)
    }

    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", dialect.quote(&c.name), dialect.column_type(c.ty));
                if c.not_null {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        let primary: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| dialect.quote(&c.name))
            .collect();
        if !primary.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }

        let quote_all = |names: &[String]| {
            names
                .iter()
                .map(|n| dialect.quote(n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        for fk in &self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_all(&fk.columns),
                dialect.quote(&fk.references),
                quote_all(&fk.referenced_columns)
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote(&self.name),
            parts.join(", ")
        )
    }
}

/// All known tables, held in dependency order
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableDef>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Validate the definitions and sort them into dependency order.
    ///
    /// Tables may be declared in any order. Among tables whose dependencies
    /// are already placed, declaration order is kept, so the result is
    /// deterministic.
    pub fn new(tables: Vec<TableDef>) -> Result<Self> {
        validate(&tables)?;

        let mut pending = tables;
        let mut sorted: Vec<TableDef> = Vec::with_capacity(pending.len());
        let mut placed: HashSet<String> = HashSet::new();

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|t| t.dependencies().all(|dep| placed.contains(dep)));

            match ready {
                Some(index) => {
                    let table = pending.remove(index);
                    placed.insert(table.name.clone());
                    sorted.push(table);
                }
                None => {
                    let names: Vec<&str> = pending.iter().map(|t| t.name()).collect();
                    return Err(FixtureError::InvalidCatalog(format!(
                        "foreign key cycle among tables: {}",
                        names.join(", ")
                    )));
                }
            }
        }

        let by_name = sorted
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        Ok(Self {
            tables: sorted,
            by_name,
        })
    }

    /// Every table, dependencies first
    pub fn all_tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The catalog order restricted to `names`.
    ///
    /// Fails with `UnknownTable` for the first (alphabetically) name the
    /// catalog does not define.
    pub fn plan<I, S>(&self, names: I) -> Result<Vec<&TableDef>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();

        if let Some(unknown) = wanted.iter().find(|name| !self.contains(name)) {
            return Err(FixtureError::UnknownTable(unknown.clone()));
        }

        Ok(self
            .tables
            .iter()
            .filter(|t| wanted.contains(t.name()))
            .collect())
    }
}

fn validate(tables: &[TableDef]) -> Result<()> {
    let mut seen: HashMap<&str, &TableDef> = HashMap::new();
    for table in tables {
        if seen.insert(table.name(), table).is_some() {
            return Err(FixtureError::InvalidCatalog(format!(
                "table `{}` is defined twice",
                table.name()
            )));
        }

        let mut columns = HashSet::new();
        for column in table.columns() {
            if !columns.insert(column.name.as_str()) {
                return Err(FixtureError::InvalidCatalog(format!(
                    "column `{}.{}` is defined twice",
                    table.name(),
                    column.name
                )));
            }
        }
    }

    for table in tables {
        for fk in table.foreign_keys() {
            if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                return Err(FixtureError::InvalidCatalog(format!(
                    "foreign key on `{}` has mismatched column lists",
                    table.name()
                )));
            }

            if let Some(missing) = fk.columns.iter().find(|c| table.column_named(c).is_none()) {
                return Err(FixtureError::InvalidCatalog(format!(
                    "foreign key column `{}.{}` does not exist",
                    table.name(),
                    missing
                )));
            }

            let target = seen.get(fk.references.as_str()).ok_or_else(|| {
                FixtureError::InvalidCatalog(format!(
                    "table `{}` references unknown table `{}`",
                    table.name(),
                    fk.references
                ))
            })?;

            if let Some(missing) = fk
                .referenced_columns
                .iter()
                .find(|c| target.column_named(c).is_none())
            {
                return Err(FixtureError::InvalidCatalog(format!(
                    "table `{}` references unknown column `{}.{}`",
                    table.name(),
                    fk.references,
                    missing
                )));
            }
        }
    }

    Ok(())
}
