use crowd_geom::{det, dist_sq_point_segment, left_of, sqr, Vec2, EPSILON};

#[test]
fn det_measures_signed_area() {
    assert_eq!(det(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)), 1.0);
    assert_eq!(det(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0)), -1.0);
    assert_eq!(det(Vec2::new(2.0, 4.0), Vec2::new(1.0, 2.0)), 0.0);
}

#[test]
fn left_of_is_positive_on_the_left() {
    let a = Vec2::new(0.0, 0.0);
    let b = Vec2::new(2.0, 0.0);
    assert!(left_of(a, b, Vec2::new(1.0, 1.0)) > 0.0);
    assert!(left_of(a, b, Vec2::new(1.0, -1.0)) < 0.0);
    assert_eq!(left_of(a, b, Vec2::new(5.0, 0.0)), 0.0);
}

#[test]
fn point_segment_distance_clamps_to_endpoints() {
    let p = Vec2::new(0.0, 0.0);
    let q = Vec2::new(4.0, 0.0);

    // Projection inside the segment.
    assert!((dist_sq_point_segment(p, q, Vec2::new(2.0, 3.0)) - 9.0).abs() < 1e-12);
    // Beyond either endpoint the nearest point is the endpoint itself.
    assert!((dist_sq_point_segment(p, q, Vec2::new(-3.0, 4.0)) - 25.0).abs() < 1e-12);
    assert!((dist_sq_point_segment(p, q, Vec2::new(7.0, 4.0)) - 25.0).abs() < 1e-12);
}

#[test]
fn perp_is_a_quarter_turn_left() {
    let v = Vec2::new(3.0, 1.0);
    let p = v.perp();
    assert_eq!(p, Vec2::new(-1.0, 3.0));
    assert_eq!(v.dot(p), 0.0);
    // Turning left means the perpendicular is on the left.
    assert!(det(v, p) > 0.0);
}

#[test]
fn normalized_has_unit_length() {
    let v = Vec2::new(3.0, -4.0).normalized();
    assert!((v.length() - 1.0).abs() < 1e-12);
    assert!((v.x - 0.6).abs() < 1e-12);
    assert!((v.y + 0.8).abs() < 1e-12);
}

#[test]
fn vector_ops_behave_like_values() {
    let a = Vec2::new(1.0, 2.0);
    let b = Vec2::new(-3.0, 0.5);
    assert_eq!(a + b, Vec2::new(-2.0, 2.5));
    assert_eq!(a - b, Vec2::new(4.0, 1.5));
    assert_eq!(-a, Vec2::new(-1.0, -2.0));
    assert_eq!(a * 2.0, 2.0 * a);
    assert_eq!((a / 2.0) * 2.0, a);
    assert_eq!(sqr(3.0), 9.0);
    assert!(EPSILON > 0.0);
}
