use super::*;
use std::hash::{Hash, Hasher};

#[test]
fn dedups_equal_values_to_the_same_hash() {
    let mut table: HashConsTable<String> = HashConsTable::new("primitives");
    let h1 = table.intern("a".to_string()).unwrap();
    let h2 = table.intern("a".to_string()).unwrap();
    let h3 = table.intern("b".to_string()).unwrap();
    assert_eq!(h1, h2);
    assert_ne!(h1, h3);
    assert_eq!(table.len(), 2);
}

#[test]
fn iteration_order_is_insertion_order() {
    let mut table: HashConsTable<i64> = HashConsTable::new("ints");
    table.intern(3).unwrap();
    table.intern(1).unwrap();
    table.intern(2).unwrap();
    table.intern(1).unwrap(); // repeat, no reorder
    assert_eq!(table.into_vec(), vec![3, 1, 2]);
}

#[test]
fn index_of_matches_iteration_position() {
    let mut table: HashConsTable<&'static str> = HashConsTable::new("primitives");
    let ha = table.intern("a").unwrap();
    let hb = table.intern("b").unwrap();
    assert_eq!(table.index_of(ha), Some(0));
    assert_eq!(table.index_of(hb), Some(1));
}

/// A type whose `Hash` impl ignores its payload, so two unequal values
/// always collide — used to exercise the `IntegrityError` path without
/// relying on finding a real FNV-1a collision.
#[derive(Clone, PartialEq)]
struct AlwaysCollides(u8);

impl Hash for AlwaysCollides {
    fn hash<H: Hasher>(&self, state: &mut H) {
        0u8.hash(state);
    }
}

#[test]
fn colliding_hash_with_different_value_is_integrity_error() {
    let mut table: HashConsTable<AlwaysCollides> = HashConsTable::new("primitives");
    table.intern(AlwaysCollides(1)).unwrap();
    let err = table.intern(AlwaysCollides(2)).unwrap_err();
    assert!(matches!(err, Error::IntegrityError { table: "primitives", .. }));
}

#[test]
fn colliding_hash_with_same_value_reuses_entry() {
    let mut table: HashConsTable<AlwaysCollides> = HashConsTable::new("primitives");
    let h1 = table.intern(AlwaysCollides(1)).unwrap();
    let h2 = table.intern(AlwaysCollides(1)).unwrap();
    assert_eq!(h1, h2);
    assert_eq!(table.len(), 1);
}
