use quilt_viewer::calibration::CalibrationProfile;
use quilt_viewer::quilt::{QuiltImageView, TileGrid};
use quilt_viewer::render::compositor::{channel_depth, composite_pixel};
use quilt_viewer::render::{UniformState, Viewport, compute_uniforms, render_frame};

const PITCH_2560X1600: f64 = 370.624_693_861_555_67;
const TILT_2560X1600: f64 = 0.119_822_872_920_489_64;
const SUBP_2560: f64 = 0.000_130_208_333_333_333_33;

fn grid(x: u32, y: u32) -> TileGrid {
    TileGrid::new(x, y).unwrap()
}

#[test]
fn default_profile_on_reference_display() {
    let block = compute_uniforms(
        &CalibrationProfile::fallback(),
        Viewport::new(2560, 1600),
        grid(4, 8),
    );
    assert!((f64::from(block.pitch) - PITCH_2560X1600).abs() < 1e-3);
    assert!((f64::from(block.tilt) - TILT_2560X1600).abs() < 1e-6);
    assert!((f64::from(block.subp) - SUBP_2560).abs() < 1e-9);
    assert!((f64::from(block.center) + 0.233_967_48).abs() < 1e-6);
    assert_eq!(block.inv_view, 1.0);
    assert_eq!(block.flip, [0.0, 0.0]);
    assert_eq!(block.tiles, [4.0, 8.0]);
}

#[test]
fn mapping_is_pure() {
    let profile = CalibrationProfile::fallback();
    let a = compute_uniforms(&profile, Viewport::new(1920, 1080), grid(5, 9));
    let b = compute_uniforms(&profile, Viewport::new(1920, 1080), grid(5, 9));
    assert_eq!(a, b);
    assert_eq!(profile, CalibrationProfile::fallback());
}

#[test]
fn subpixel_step_follows_panel_not_window() {
    let profile = CalibrationProfile::fallback();
    let small = compute_uniforms(&profile, Viewport::new(640, 400), grid(4, 8));
    let large = compute_uniforms(&profile, Viewport::new(2560, 1600), grid(4, 8));
    assert_eq!(small.subp, large.subp);
    assert!(small.pitch < large.pitch);
}

#[test]
fn new_profile_rebuilds_whole_block() {
    let mut state = UniformState::new(Viewport::new(2560, 1600));
    state.set_tiles(grid(4, 8));
    state.set_profile(CalibrationProfile::fallback());
    let before = state.take_dirty().unwrap();

    let mut live = CalibrationProfile::fallback();
    live.pitch.value = 47.0;
    live.center.value = 0.1;
    state.set_profile(live.clone());
    let after = state.take_dirty().unwrap();

    assert_ne!(before.pitch, after.pitch);
    assert_eq!(after, compute_uniforms(&live, Viewport::new(2560, 1600), grid(4, 8)));
}

#[test]
fn cpu_composite_stays_inside_the_quilt() {
    // 4x2 quilt with one solid colour per tile (rows top-to-bottom)
    let colours: [[u8; 4]; 8] = [
        [10, 0, 0, 255],
        [20, 0, 0, 255],
        [30, 0, 0, 255],
        [40, 0, 0, 255],
        [50, 0, 0, 255],
        [60, 0, 0, 255],
        [70, 0, 0, 255],
        [80, 0, 0, 255],
    ];
    let data: Vec<u8> = colours.iter().flatten().copied().collect();
    let quilt = QuiltImageView::new(4, 2, &data).unwrap();
    let block = compute_uniforms(
        &CalibrationProfile::fallback(),
        Viewport::new(64, 40),
        grid(4, 2),
    );
    let frame = render_frame(&block, &quilt, 64, 40);
    assert_eq!(frame.dimensions(), (64, 40));
    for px in frame.pixels() {
        assert!(colours.iter().any(|c| c[0] == px.0[0]), "unexpected red {}", px.0[0]);
        assert_eq!(px.0[3], 255);
    }
    for channel in 0..3 {
        let z = channel_depth(&block, [0.3, 0.7], channel);
        assert!((0.0..=1.0).contains(&z));
    }
    let _ = composite_pixel(&block, &quilt, [0.0, 0.0]);
}

#[test]
fn flipped_panel_only_mirrors_the_tilt() {
    let data: Vec<u8> = (0u8..8)
        .flat_map(|i| [i * 30, 255 - i * 30, i * 10, 255])
        .collect();
    let quilt = QuiltImageView::new(4, 2, &data).unwrap();
    let viewport = Viewport::new(96, 60);

    let mut flipped = CalibrationProfile::fallback();
    flipped.flip_image_x.value = 1.0;
    let flipped_block = compute_uniforms(&flipped, viewport, grid(4, 2));

    let mut mirrored_tilt = compute_uniforms(&CalibrationProfile::fallback(), viewport, grid(4, 2));
    mirrored_tilt.tilt = -mirrored_tilt.tilt;

    assert_eq!(flipped_block.flip, [1.0, 0.0]);
    assert_eq!(flipped_block.tilt, mirrored_tilt.tilt);
    assert_eq!(
        render_frame(&flipped_block, &quilt, 96, 60),
        render_frame(&mirrored_tilt, &quilt, 96, 60)
    );
}
