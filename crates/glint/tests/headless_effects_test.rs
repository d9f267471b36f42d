//! Headless GPU tests for the offscreen effects.
//!
//! These need a GPU adapter (real or software fallback). Without one each
//! test prints a skip message and returns.

use std::cell::RefCell;
use std::rc::Rc;

use glint::*;

const SIZE: u32 = 64;

fn renderer() -> Option<Renderer> {
    match create_headless_renderer(SIZE, SIZE) {
        Ok(renderer) => Some(renderer),
        Err(e) => {
            eprintln!("Skipping headless test: no GPU adapter available ({e})");
            None
        }
    }
}

fn cube(color: Vec3, position: Vec3) -> Node {
    Node::mesh(
        "cube",
        Mesh::new(
            Geometry::cuboid(Vec3::ONE),
            Material::Basic(BasicMaterial::new(color)),
        ),
    )
    .with_transform(Mat4::from_translation(position))
}

fn overhead_camera() -> Camera {
    Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 5.0, 0.0),
        Vec3::ZERO,
        Vec3::Z,
    )
}

fn reflector_config() -> ReflectorConfig {
    ReflectorConfig::default()
        .with_size(8.0, 8.0)
        .with_texture_size(SIZE, SIZE)
}

#[test]
fn headless_reflector_shows_object_above_mirror() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::X, Vec3::new(0.0, 2.0, 0.0)));

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();

    let rendered = reflector
        .render(&mut renderer, &mut scene, &overhead_camera())
        .unwrap();
    assert!(rendered);
    assert!(reflector.last_frame().is_some());

    let pixel = renderer
        .read_pixel(Some(reflector.target()), SIZE / 2, SIZE / 2)
        .unwrap();
    assert_eq!(pixel, [255, 0, 0, 255]);
}

#[test]
fn headless_reflector_skips_camera_behind_mirror() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::X, Vec3::new(0.0, 2.0, 0.0)));

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();

    let below = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, -5.0, 0.0),
        Vec3::ZERO,
        Vec3::Z,
    );
    renderer.reset_info();
    let rendered = reflector.render(&mut renderer, &mut scene, &below).unwrap();
    assert!(!rendered);
    assert_eq!(renderer.info().draw_calls, 0);
    assert_eq!(renderer.info().render_passes, 0);
    assert!(reflector.last_frame().is_none());
}

#[test]
fn headless_reflector_empty_area_is_transparent() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.background = Some(Vec3::Y);
    let camera = overhead_camera();

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();
    assert!(reflector.render(&mut renderer, &mut scene, &camera).unwrap());

    let reflected = renderer
        .read_pixel(Some(reflector.target()), SIZE / 2, SIZE / 2)
        .unwrap();
    assert_eq!(reflected, [0, 0, 0, 0]);

    // Nothing reflected: the background shows through at any opacity.
    for opacity in [0.0, 1.0] {
        reflector.set_opacity(opacity);
        assert!(reflector.render(&mut renderer, &mut scene, &camera).unwrap());
        renderer.render(&scene, &camera).unwrap();
        let pixel = renderer.read_pixel(None, SIZE / 2, SIZE / 2).unwrap();
        assert_eq!(pixel, [0, 255, 0, 255], "opacity {opacity}");
    }
}

#[test]
fn headless_reflector_composites_reflection_at_full_opacity() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.background = Some(Vec3::Y);
    let object = scene.add(cube(Vec3::X, Vec3::new(0.0, 2.0, 0.0)));
    let camera = overhead_camera();

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();
    assert!(reflector.render(&mut renderer, &mut scene, &camera).unwrap());

    // Hide the cube from the main view so only the mirror covers the center.
    assert!(scene.set_visible(object, false));
    renderer.render(&scene, &camera).unwrap();
    let pixel = renderer.read_pixel(None, SIZE / 2, SIZE / 2).unwrap();
    assert_eq!(pixel, [255, 0, 0, 255]);
}

#[test]
fn headless_blur_kernel_rebuilds_only_on_change() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    assert!(!reflector.set_blur_kernel(&renderer, 21, 4.0));
    assert!(reflector.set_blur_kernel(&renderer, 9, 2.0));
    assert_eq!(reflector.blur_kernel().size(), 9);
    assert_eq!(reflector.blur_kernel().sigma(), 2.0);
    assert!(!reflector.set_blur_kernel(&renderer, 9, 2.0));

    let mut scene = Scene::new();
    scene.add(cube(Vec3::new(0.2, 0.6, 1.0), Vec3::ZERO));
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(2.0, 2.0, 3.0),
        Vec3::ZERO,
        Vec3::Y,
    );
    let primary = renderer.create_target(TargetDescriptor::new(SIZE, SIZE).with_depth(true));
    let scratch = renderer.create_target(TargetDescriptor::new(SIZE, SIZE));
    renderer.set_render_target(Some(primary)).unwrap();
    renderer.render(&scene, &camera).unwrap();
    let before = renderer.read_pixels(Some(primary), 0, 0, SIZE, SIZE).unwrap();

    // A single centered tap samples each texel onto itself.
    let mut blur = BlurStage::new(renderer.device());
    assert!(blur.set_kernel(renderer.queue(), 1, 4.0));
    let passes = blur
        .apply(&mut renderer, primary, scratch, 3.0, BlurQuality::TwoPass)
        .unwrap();
    assert_eq!(passes, 4);
    let after = renderer.read_pixels(Some(primary), 0, 0, SIZE, SIZE).unwrap();
    assert!(before
        .iter()
        .zip(&after)
        .all(|(a, b)| a.abs_diff(*b) <= 1));
}

#[test]
fn headless_blur_radius_zero_is_identity() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::new(0.2, 0.6, 1.0), Vec3::ZERO));
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(2.0, 2.0, 3.0),
        Vec3::ZERO,
        Vec3::Y,
    );

    let primary = renderer.create_target(TargetDescriptor::new(SIZE, SIZE).with_depth(true));
    let scratch = renderer.create_target(TargetDescriptor::new(SIZE, SIZE));
    renderer.set_render_target(Some(primary)).unwrap();
    renderer.render(&scene, &camera).unwrap();
    let before = renderer.read_pixels(Some(primary), 0, 0, SIZE, SIZE).unwrap();

    let blur = BlurStage::new(renderer.device());
    let passes = blur
        .apply(&mut renderer, primary, scratch, 0.0, BlurQuality::TwoPass)
        .unwrap();
    assert_eq!(passes, 0);
    let after = renderer.read_pixels(Some(primary), 0, 0, SIZE, SIZE).unwrap();
    assert_eq!(before, after);

    let passes = blur
        .apply(&mut renderer, primary, scratch, 3.0, BlurQuality::TwoPass)
        .unwrap();
    assert_eq!(passes, 4);
    let blurred = renderer.read_pixels(Some(primary), 0, 0, SIZE, SIZE).unwrap();
    assert_ne!(before, blurred);
}

#[test]
fn headless_picker_reads_id_with_tone_mapping_enabled() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    renderer.render_state_mut().tone_mapping = ToneMapping::Aces;
    renderer.render_state_mut().output_encoding = OutputEncoding::Srgb;

    let mut scene = Scene::new();
    let object = scene.add(cube(Vec3::new(0.3, 0.3, 0.3), Vec3::ZERO));
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        Vec3::Y,
    );

    let mut picker = GpuPicker::new(&mut renderer, PickerConfig::default());
    picker.register(&scene, object, 0x00_FF00).unwrap();

    let clicks = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&clicks);
    picker.subscribe(PickEventKind::Click, move |event| sink.borrow_mut().push(*event));

    let center = (SIZE / 2) as f32;
    let events = picker
        .pointer_move(&mut renderer, &camera, Vec2::new(center, center))
        .unwrap();
    assert_eq!(events, vec![PickEvent::Enter(65280)]);
    assert_eq!(picker.hovered(), Some(65280));

    // Same object again: no duplicate enter.
    let events = picker
        .pointer_move(&mut renderer, &camera, Vec2::new(center + 1.0, center))
        .unwrap();
    assert!(events.is_empty());

    assert_eq!(picker.pointer_down(true), Some(PickEvent::Click(65280)));
    assert_eq!(*clicks.borrow(), vec![PickEvent::Click(65280)]);

    let events = picker
        .pointer_move(&mut renderer, &camera, Vec2::new(1.0, 1.0))
        .unwrap();
    assert_eq!(events, vec![PickEvent::Exit(65280)]);
    assert_eq!(picker.pointer_down(true), Some(PickEvent::Clear));

    assert_eq!(renderer.render_state().tone_mapping, ToneMapping::Aces);
    assert_eq!(renderer.render_state().output_encoding, OutputEncoding::Srgb);
    assert_eq!(renderer.render_target(), None);
}

#[test]
fn headless_picker_dispatches_touch_and_mouse_events() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    let object = scene.add(cube(Vec3::ONE, Vec3::ZERO));
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        Vec3::Y,
    );

    let mut picker = GpuPicker::new(&mut renderer, PickerConfig::default());
    picker.register(&scene, object, 42).unwrap();
    let center = (SIZE / 2) as f32;

    let touch = PointerEvent::touch_start(center, center);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &touch)
        .unwrap();
    assert_eq!(events, vec![PickEvent::Enter(42), PickEvent::Click(42)]);

    let touch = PointerEvent::touch_move(1.0, 1.0);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &touch)
        .unwrap();
    assert_eq!(events, vec![PickEvent::Exit(42)]);

    let touch = PointerEvent::touch_start(1.0, 1.0);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &touch)
        .unwrap();
    assert_eq!(events, vec![PickEvent::Clear]);

    // Presses on an overlay never clear.
    let touch = PointerEvent::touch_start(1.0, 1.0).with_target(PointerTarget::Overlay);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &touch)
        .unwrap();
    assert!(events.is_empty());

    let hover = PointerEvent::mouse_move(center, center);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &hover)
        .unwrap();
    assert_eq!(events, vec![PickEvent::Enter(42)]);
    let press = PointerEvent::mouse_down(center, center).with_target(PointerTarget::Overlay);
    let events = picker
        .handle_pointer_event(&mut renderer, &camera, &press)
        .unwrap();
    assert_eq!(events, vec![PickEvent::Click(42)]);
}

#[test]
fn headless_picker_hidden_objects_are_not_hit() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    let object = scene.add(cube(Vec3::ONE, Vec3::ZERO));
    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        Vec3::Y,
    );

    let mut picker = GpuPicker::new(&mut renderer, PickerConfig::default());
    picker.register(&scene, object, 7).unwrap();
    picker.disable(&[7]).unwrap();

    let center = UVec2::splat(SIZE / 2);
    assert_eq!(picker.pick_at(&mut renderer, &camera, center).unwrap(), None);

    picker.enable(&[7]).unwrap();
    assert_eq!(picker.pick_at(&mut renderer, &camera, center).unwrap(), Some(7));

    picker.unregister(7).unwrap();
    assert_eq!(picker.pick_at(&mut renderer, &camera, center).unwrap(), None);
    assert!(picker.unregister(7).is_err());
}

#[test]
fn headless_effects_restore_render_state() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::X, Vec3::new(0.0, 2.0, 0.0)));
    scene.background = Some(Vec3::new(0.1, 0.2, 0.3));

    let host_target = renderer.create_target(TargetDescriptor::new(SIZE, SIZE).with_depth(true));
    {
        let state = renderer.render_state_mut();
        state.render_target = Some(host_target);
        state.clear_color = Vec3::new(0.5, 0.5, 0.5);
        state.clear_alpha = 0.25;
        state.auto_clear = false;
        state.xr_enabled = true;
        state.shadow_auto_update = true;
        state.tone_mapping = ToneMapping::Reinhard;
    }
    let before = *renderer.render_state();

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();
    let mut shadows = ContactShadows::new(
        &mut renderer,
        ContactShadowConfig::default().with_resolution(SIZE),
    );
    shadows.attach_to(&mut scene, None).unwrap();

    assert!(reflector
        .render(&mut renderer, &mut scene, &overhead_camera())
        .unwrap());
    assert!(shadows.render(&mut renderer, &mut scene).unwrap());

    assert_eq!(*renderer.render_state(), before);
    assert_eq!(scene.background, Some(Vec3::new(0.1, 0.2, 0.3)));
    assert_eq!(scene.override_material, None);
    assert_eq!(scene.visible(reflector.surface().unwrap()), Some(true));
    assert_eq!(scene.visible(shadows.nodes().unwrap().root), Some(true));
}

#[test]
fn headless_contact_shadows_darken_under_object() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::ONE, Vec3::new(0.0, 1.0, 0.0)));

    let config = ContactShadowConfig::default()
        .with_resolution(SIZE)
        .with_blur(0.0)
        .with_fill_plane(Vec3::ONE, 1.0)
        .with_debug_camera(true);
    let mut shadows = ContactShadows::new(&mut renderer, config);
    let nodes = shadows.attach_to(&mut scene, None).unwrap();
    assert!(nodes.fill_plane.is_some());
    assert!(nodes.helper.is_some());

    assert!(shadows.render(&mut renderer, &mut scene).unwrap());

    let center = renderer
        .read_pixel(Some(shadows.target()), SIZE / 2, SIZE / 2)
        .unwrap();
    assert_eq!(&center[..3], &[0, 0, 0]);
    assert!(center[3] > 200, "expected a dark stamp, got {center:?}");

    let corner = renderer.read_pixel(Some(shadows.target()), 0, 0).unwrap();
    assert_eq!(corner[3], 0);
}

#[test]
fn headless_frame_loop_runs_automatic_effects() {
    let Some(mut renderer) = renderer() else {
        return;
    };
    let mut scene = Scene::new();
    scene.add(cube(Vec3::X, Vec3::new(0.0, 2.0, 0.0)));

    let mut reflector = Reflector::new(&mut renderer, reflector_config());
    reflector.attach_to(&mut scene, None).unwrap();
    let mut shadows = ContactShadows::new(
        &mut renderer,
        ContactShadowConfig::default().with_resolution(SIZE),
    );
    shadows.attach_to(&mut scene, None).unwrap();

    let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 4.0, 6.0),
        Vec3::ZERO,
        Vec3::Y,
    );
    let mut frames = FrameLoop::new();
    let report = frames
        .render_frame(
            &mut renderer,
            &mut scene,
            &camera,
            &mut [&mut reflector, &mut shadows],
        )
        .unwrap();
    assert_eq!(report.effects_rendered, 2);
    assert_eq!(report.effects_failed, 0);
    assert_eq!(report.info.renders, 3);
    assert!(report.info.draw_calls > 0);

    reflector.set_manual_render(true);
    let report = frames
        .render_frame(
            &mut renderer,
            &mut scene,
            &camera,
            &mut [&mut reflector, &mut shadows],
        )
        .unwrap();
    assert_eq!(report.effects_rendered, 1);
    assert_eq!(report.effects_skipped, 1);
    assert_eq!(frames.frames(), 2);

    let pixels = render_to_image(&mut renderer, &scene, &camera).unwrap();
    assert_eq!(pixels.len(), (SIZE * SIZE * 4) as usize);
}
