use super::*;
use crate::wkt::Coord;

fn point_feature(x: f64, y: f64) -> LiveFeature {
    LiveFeature { geometry: Geometry::Point(Coord::new(x, y)) }
}

#[test]
fn insert_and_get() {
    let mut layer = FeatureLayer::new();
    let key = layer.insert(point_feature(1.0, 2.0));
    assert_eq!(layer.get(key), Some(&point_feature(1.0, 2.0)));
    assert_eq!(layer.len(), 1);
}

#[test]
fn remove_returns_feature_and_frees_slot() {
    let mut layer = FeatureLayer::new();
    let key = layer.insert(point_feature(1.0, 2.0));
    assert_eq!(layer.remove(key), Some(point_feature(1.0, 2.0)));
    assert!(layer.get(key).is_none());
    assert!(layer.is_empty());
}

#[test]
fn remove_twice_is_none() {
    let mut layer = FeatureLayer::new();
    let key = layer.insert(point_feature(0.0, 0.0));
    layer.remove(key);
    assert_eq!(layer.remove(key), None);
}

#[test]
fn slots_are_reused() {
    let mut layer = FeatureLayer::new();
    let a = layer.insert(point_feature(0.0, 0.0));
    let _b = layer.insert(point_feature(1.0, 1.0));
    layer.remove(a);
    let c = layer.insert(point_feature(2.0, 2.0));
    assert_eq!(a, c, "freed slot should be reused");
    assert_eq!(layer.len(), 2);
}

#[test]
fn get_mut_edits_in_place() {
    let mut layer = FeatureLayer::new();
    let key = layer.insert(point_feature(0.0, 0.0));
    if let Some(f) = layer.get_mut(key) {
        f.geometry = Geometry::Point(Coord::new(9.0, 9.0));
    }
    assert_eq!(layer.get(key), Some(&point_feature(9.0, 9.0)));
}

#[test]
fn iter_skips_removed() {
    let mut layer = FeatureLayer::new();
    let a = layer.insert(point_feature(0.0, 0.0));
    let b = layer.insert(point_feature(1.0, 1.0));
    layer.remove(a);
    let keys = layer.iter().map(|(k, _)| k).collect::<Vec<_>>();
    assert_eq!(keys, vec![b]);
}

#[test]
fn layer_bounding_box_covers_all_features() {
    let mut layer = FeatureLayer::new();
    layer.insert(point_feature(-5.0, 2.0));
    layer.insert(point_feature(10.0, -3.0));
    let bbox = layer.bounding_box().unwrap();
    assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (-5.0, -3.0, 10.0, 2.0));
}

#[test]
fn empty_layer_has_no_bounding_box() {
    assert!(FeatureLayer::new().bounding_box().is_none());
}

#[test]
fn identity_projection_roundtrip() {
    let p = IdentityProjection;
    let c = Coord::new(3.5, -7.25);
    assert_eq!(p.to_geographic(c), c);
    assert_eq!(p.to_projected(c), c);
}
