//! CPU-only tests of the public API: configuration, pick encoding,
//! the render-state guard and the ray picker. No GPU required.

use std::cell::RefCell;
use std::rc::Rc;

use glint::pick::{decode_pixel, index_to_color};
use glint::*;
use proptest::prelude::*;

fn cube_at(scene: &mut Scene, position: Vec3) -> NodeId {
    scene.add(
        Node::mesh(
            "cube",
            Mesh::new(
                Geometry::cuboid(Vec3::ONE),
                Material::Basic(BasicMaterial::new(Vec3::ONE)),
            ),
        )
        .with_transform(Mat4::from_translation(position)),
    )
}

fn screen_position(camera: &Camera, surface: &SurfaceRect, world: Vec3) -> Vec2 {
    let ndc = camera.view_projection_matrix().project_point3(world);
    Vec2::new(
        surface.left + (ndc.x + 1.0) * 0.5 * surface.width,
        surface.top + (1.0 - ndc.y) * 0.5 * surface.height,
    )
}

#[test]
fn test_effects_config_from_json() {
    let config = EffectsConfig::from_json_str(
        r#"{
            "reflector": { "blur": 2.0, "fast_blur": true, "clip_bias": 0.003 },
            "contact_shadows": { "darkness": 0.5, "fill_plane": true }
        }"#,
    )
    .unwrap();
    assert_eq!(config.reflector.blur_quality(), BlurQuality::Fast);
    assert_eq!(config.reflector.texture_width, 512);
    assert!(config.contact_shadows.fill_plane);
    assert_eq!(config.contact_shadows.camera_height, 10.0);
    assert_eq!(config.picker, PickerConfig::default());
}

#[test]
fn test_ray_picker_hover_sequence() {
    let mut scene = Scene::new();
    let near = cube_at(&mut scene, Vec3::ZERO);
    let far = cube_at(&mut scene, Vec3::new(3.0, 0.0, 0.0));

    let surface = SurfaceRect::new(100.0, 100.0, 1.0);
    let camera = Camera::perspective(45.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::ZERO,
        Vec3::Y,
    );
    let mut picker = RayPicker::new(surface);
    picker.add(near, 5).unwrap();
    picker.add(far, 9).unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in [PickEventKind::Enter, PickEventKind::Exit] {
        let sink = Rc::clone(&log);
        picker.subscribe(kind, move |event| sink.borrow_mut().push(*event));
    }

    let on_near = screen_position(&camera, &surface, Vec3::ZERO);
    let on_far = screen_position(&camera, &surface, Vec3::new(3.0, 0.0, 0.0));
    let empty = Vec2::new(1.0, 1.0);
    for position in [empty, on_near, on_near, on_far, empty] {
        picker.pointer_move(&scene, &camera, position);
    }

    assert_eq!(
        *log.borrow(),
        vec![
            PickEvent::Enter(5),
            PickEvent::Exit(5),
            PickEvent::Enter(9),
            PickEvent::Exit(9),
        ]
    );
}

#[test]
fn test_ray_picker_disabled_still_clears() {
    let mut scene = Scene::new();
    let node = cube_at(&mut scene, Vec3::ZERO);
    let surface = SurfaceRect::new(100.0, 100.0, 1.0);
    let camera = Camera::perspective(45.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::ZERO,
        Vec3::Y,
    );
    let mut picker = RayPicker::new(surface);
    picker.add(node, 3).unwrap();
    picker.enabled = false;

    let touch = PointerEvent::touch_start(50.0, 50.0);
    assert!(picker.handle_pointer_event(&scene, &camera, &touch).is_empty());
    assert_eq!(picker.hovered(), Some(3));

    picker.pointer_move(&scene, &camera, Vec2::new(1.0, 1.0));
    assert_eq!(picker.pointer_down(true), vec![PickEvent::Clear]);
    assert!(picker.pointer_down(false).is_empty());
}

#[test]
fn test_scoped_state_is_restored() {
    let mut state = RenderState {
        tone_mapping: ToneMapping::Aces,
        clear_alpha: 0.75,
        ..RenderState::default()
    };
    let mut scene = Scene::new();
    scene.background = Some(Vec3::ONE);
    let before = state;
    let target = TargetId::next();

    let seen = run_scoped(&mut state, &mut scene, |state, scene| {
        state.render_target = Some(target);
        state.tone_mapping = ToneMapping::None;
        scene.background
    });

    assert_eq!(seen, None);
    assert_eq!(state, before);
    assert_eq!(scene.background, Some(Vec3::ONE));
}

#[test]
fn test_pick_id_zero_is_background() {
    assert_eq!(decode_pixel([0, 0, 0, 255]), None);
    assert_eq!(decode_pixel([0, 255, 0, 255]), Some(65280));
    assert_eq!(index_to_color(MAX_PICK_ID), [255, 255, 255]);
}

proptest! {
    #[test]
    fn prop_buffer_pixel_stays_inside(
        x in 0.0f32..320.0,
        y in 0.0f32..240.0,
        ratio in 0.5f32..3.0,
    ) {
        let surface = SurfaceRect::new(320.0, 240.0, ratio);
        let buffer = surface.buffer_size();
        let pixel = surface.to_buffer_pixel(Vec2::new(x, y)).unwrap();
        prop_assert!(pixel.x < buffer.x);
        prop_assert!(pixel.y < buffer.y);
    }
}
