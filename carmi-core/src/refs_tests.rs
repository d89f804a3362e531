use super::*;

#[test]
fn round_trip_int() {
    let packed = pack_int(42).unwrap();
    assert_eq!(unpack(packed), Unpacked::Int(42));
}

#[test]
fn round_trip_primitive() {
    let packed = pack_primitive(7).unwrap();
    assert_eq!(unpack(packed), Unpacked::Primitive(7));
}

#[test]
fn round_trip_projection() {
    let packed = pack_projection(1234).unwrap();
    assert_eq!(unpack(packed), Unpacked::Projection(1234));
}

#[test]
fn tags_do_not_collide() {
    let a = pack_int(5).unwrap();
    let b = pack_primitive(5).unwrap();
    let c = pack_projection(5).unwrap();
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[test]
fn overflow_is_rejected() {
    let err = pack_primitive(TABLE_CEILING as u32).unwrap_err();
    assert!(matches!(err, Error::RefRangeOverflow { .. }));
}

#[test]
fn ceiling_meets_budget() {
    assert!(TABLE_CEILING >= 1 << 24);
}

#[test]
fn inline_representable_rejects_negative_and_overflow() {
    assert!(is_inline_representable(0));
    assert!(is_inline_representable(100));
    assert!(!is_inline_representable(-1));
    assert!(!is_inline_representable(TABLE_CEILING as i64));
}
