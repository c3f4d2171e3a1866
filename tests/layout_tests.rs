use creative_canvas::processing::layout::{
    FitMode, PlacementPolicy, Viewport, compute_placement, compute_scale,
};

fn rect_close(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64), eps: f64) {
    assert!((a.0 - b.0).abs() <= eps, "left mismatch: {:?} vs {:?}", a, b);
    assert!((a.1 - b.1).abs() <= eps, "top mismatch: {:?} vs {:?}", a, b);
    assert!((a.2 - b.2).abs() <= eps, "w mismatch: {:?} vs {:?}", a, b);
    assert!((a.3 - b.3).abs() <= eps, "h mismatch: {:?} vs {:?}", a, b);
}

#[test]
fn landscape_container_scales_by_height() {
    // min((1600-40)/1080, (800-40)/1080) = 760/1080
    let s = compute_scale(1600.0, 800.0, 1080.0, 1080.0, 40.0);
    assert!((s - 0.7037).abs() < 1e-4, "scale was {s}");
}

#[test]
fn desktop_container_with_padding() {
    // min(960/1080, 760/1080)
    let s = compute_scale(1000.0, 800.0, 1080.0, 1080.0, 40.0);
    assert!((s - 0.7037).abs() < 1e-4, "scale was {s}");

    let mut vp = Viewport::new(1080, 1080, 40.0);
    vp.resize(1000.0, 800.0);
    assert!((vp.scale() - s).abs() < 1e-12);
}

#[test]
fn viewport_tracks_every_resize() {
    let mut vp = Viewport::new(1080, 1080, 40.0);
    vp.resize(1600.0, 800.0);
    let first = vp.scale();
    vp.resize(2200.0, 1120.0);
    // (1120-40)/1080 = 1.0
    assert!((vp.scale() - 1.0).abs() < 1e-12);
    assert!(first < vp.scale());
    let (w, h) = vp.displayed_size();
    assert!((w - 1080.0).abs() < 1e-9 && (h - 1080.0).abs() < 1e-9);
}

#[test]
fn upload_fit_leaves_margin_and_centres() {
    // scale = min(1080/2000, 1080/1000) * 0.8 = 0.432
    let p = compute_placement(2000, 1000, 1080, 1080, PlacementPolicy::fit(0.8)).unwrap();
    assert!((p.scale_x - 0.432).abs() < 1e-12);
    assert_eq!(p.scale_x, p.scale_y);
    rect_close((p.left, p.top, p.width, p.height), (108.0, 324.0, 864.0, 432.0), 1e-6);
    let (cx, cy) = p.center();
    assert!((cx - 540.0).abs() < 1e-9 && (cy - 540.0).abs() < 1e-9);
}

#[test]
fn fit_stays_inside_canvas() {
    for (w, h) in [(1, 1), (4000, 3000), (300, 2400), (1080, 1080), (7, 5000)] {
        let p = compute_placement(w, h, 1080, 1080, PlacementPolicy::fit(1.0)).unwrap();
        assert!(p.width <= 1080.0 + 1e-9 && p.height <= 1080.0 + 1e-9, "{w}x{h}");
        assert!(p.left >= -1e-9 && p.top >= -1e-9, "{w}x{h}");
        let tight = (p.width - 1080.0).abs() < 1e-6 || (p.height - 1080.0).abs() < 1e-6;
        assert!(tight, "{w}x{h} does not touch a canvas edge");
    }
}

#[test]
fn cover_contains_canvas_and_overflows_one_axis() {
    let policy = PlacementPolicy::cover();
    assert_eq!(policy.mode, FitMode::Cover);
    let p = compute_placement(1920, 1080, 1080, 1080, policy).unwrap();
    rect_close((p.left, p.top, p.width, p.height), (-420.0, 0.0, 1920.0, 1080.0), 1e-6);

    let tall = compute_placement(500, 2000, 1080, 1350, policy).unwrap();
    assert!(tall.width >= 1080.0 - 1e-9 && tall.height > 1350.0);
    let (cx, cy) = tall.center();
    assert!((cx - 540.0).abs() < 1e-9 && (cy - 675.0).abs() < 1e-9);
}
