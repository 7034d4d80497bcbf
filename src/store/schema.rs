//! Foreign keys of the F1 history schema
//!
//! The hosted store resolves embedded relations itself; the memory backend
//! needs this map to do the same.

/// Many-to-one reference from `table.column` to `references.referenced_column`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub references: &'static str,
    pub referenced_column: &'static str,
}

const fn fk(
    table: &'static str,
    column: &'static str,
    references: &'static str,
    referenced_column: &'static str,
) -> ForeignKey {
    ForeignKey {
        table,
        column,
        references,
        referenced_column,
    }
}

pub const F1_FOREIGN_KEYS: &[ForeignKey] = &[
    fk("races", "circuitId", "circuits", "circuitId"),
    fk("races", "year", "seasons", "year"),
    fk("results", "raceId", "races", "raceId"),
    fk("results", "driverId", "drivers", "driverId"),
    fk("results", "constructorId", "constructors", "constructorId"),
    fk("qualifying", "raceId", "races", "raceId"),
    fk("qualifying", "driverId", "drivers", "driverId"),
    fk("qualifying", "constructorId", "constructors", "constructorId"),
    fk("driver_standings", "raceId", "races", "raceId"),
    fk("driver_standings", "driverId", "drivers", "driverId"),
    fk("constructor_standings", "raceId", "races", "raceId"),
    fk("constructor_standings", "constructorId", "constructors", "constructorId"),
];

/// Find the key that lets `table` embed `relation`
pub fn foreign_key<'a>(
    keys: &'a [ForeignKey],
    table: &str,
    relation: &str,
) -> Option<&'a ForeignKey> {
    keys.iter()
        .find(|key| key.table == table && key.references == relation)
}
