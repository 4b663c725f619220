//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{at, reading, CatalogBuilder};

#[test]
fn test_infrastructure_setup() {
    // Test that builders work
    let catalog = CatalogBuilder::new()
        .sensor("S1", "Boiler 1")
        .sensor("S2", "Boiler 2")
        .build();

    assert_eq!(catalog.stations.len(), 1);
    assert_eq!(catalog.groups_of("ST1").count(), 1);
    assert_eq!(catalog.sensors_of("G1").count(), 2);
    assert_eq!(catalog.unit_symbol_of(&catalog.sensors[0]), "°C");

    let r = reading("S1", 5, 1.5);
    assert_eq!(r.timestamp, at(5));
    assert_eq!(r.sensor_id, "S1");
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}

#[test]
fn test_eventually() {
    let mut calls = 0;
    assert!(common::eventually(|| {
        calls += 1;
        calls >= 3
    }));
}
