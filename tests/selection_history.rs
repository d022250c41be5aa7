use glam::{Quat, Vec3};
use mud_engine::assets::MemoryModelSource;
use mud_engine::config::EditorConfig;
use mud_engine::entity::{EntityId, ShapeProps};
use mud_engine::events::EditorEvent;
use mud_engine::factory::EntityOptions;
use mud_engine::gizmo::GizmoMode;
use mud_engine::history::Command;
use mud_engine::selection::{CursorIcon, SelectionTarget};
use mud_engine::skeleton::Skeleton;
use mud_engine::transform::{quat_approx_eq, NodeTransform, Transform};
use mud_engine::EditorContext;
use std::cell::RefCell;
use std::rc::Rc;

struct Scene {
    editor: EditorContext,
    cube: EntityId,
    hero: EntityId,
}

fn scene() -> Scene {
    let up = |y: f32| NodeTransform::from_translation(Vec3::new(0.0, y, 0.0));
    let mut skeleton = Skeleton::new("rig");
    let hips = skeleton.add_bone("Hips", None, up(1.0));
    let spine = skeleton.add_bone("Spine", Some(hips), up(0.3));
    skeleton.add_bone("Head", Some(spine), up(0.4));

    let mut jaw_rig = Skeleton::new("jaw_rig");
    let hips = jaw_rig.add_bone("Hips", None, up(1.0));
    let spine = jaw_rig.add_bone("Spine", Some(hips), up(0.3));
    jaw_rig.add_bone("Jaw", Some(spine), up(0.5));

    let source = MemoryModelSource::new();
    source.register("models/rig.glb", Some(skeleton));
    source.register("models/jaw.glb", Some(jaw_rig));
    let mut editor = EditorContext::new(EditorConfig::default(), source);
    let cube = editor.create_entity(EntityOptions::shape("cube", ShapeProps::default()));
    let hero = editor.create_entity(
        EntityOptions::character("hero", "models/rig.glb")
            .with_transform(Transform::from_position(Vec3::new(5.0, 0.0, 0.0))),
    );
    pollster::block_on(editor.wait_all_ready());
    editor.drain_events();
    Scene { editor, cube, hero }
}

fn head_of(editor: &EditorContext, hero: EntityId) -> usize {
    editor.entity(hero).and_then(|e| e.as_character()).and_then(|c| c.bone_index("Head")).expect("head bone")
}

fn rig_visible(editor: &EditorContext, hero: EntityId) -> bool {
    editor.entity(hero).and_then(|e| e.as_character()).is_some_and(|c| c.is_visualization_visible())
}

#[test]
fn exactly_one_node_is_selected_at_a_time() {
    let Scene { mut editor, cube, hero } = scene();
    let cube_root = editor.entity(cube).expect("cube").root();
    let hero_root = editor.entity(hero).expect("hero").root();
    let head = head_of(&editor, hero);

    editor.select(Some(SelectionTarget::Entity(cube))).expect("select cube");
    assert_eq!(editor.graph().selected_nodes(), vec![cube_root]);

    editor.select(Some(SelectionTarget::Entity(hero))).expect("select hero");
    assert_eq!(editor.graph().selected_nodes(), vec![hero_root]);
    assert!(rig_visible(&editor, hero), "selecting a character shows its bones");

    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");
    let control = editor.gizmo().attached().expect("gizmo attached to the control");
    assert_eq!(editor.graph().selected_nodes(), vec![control]);
    assert_eq!(editor.gizmo().mode(), GizmoMode::Rotation);
    assert!(rig_visible(&editor, hero), "moving onto a bone keeps the rig visible");

    editor.select(None).expect("clear");
    assert!(editor.graph().selected_nodes().is_empty());
    assert!(editor.gizmo().attached().is_none());
    assert!(!rig_visible(&editor, hero));

    let events = editor.drain_events();
    assert!(events.contains(&EditorEvent::GizmoModeChanged { mode: GizmoMode::Rotation }));
    let selections = events.iter().filter(|e| matches!(e, EditorEvent::SelectionChanged { .. })).count();
    assert_eq!(selections, 4);
}

#[test]
fn unsupported_gizmo_modes_are_refused_for_bones() {
    let Scene { mut editor, hero, .. } = scene();
    let head = head_of(&editor, hero);
    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");
    assert!(!editor.set_gizmo_mode(GizmoMode::Position));
    assert!(!editor.set_gizmo_mode(GizmoMode::Scale));
    assert_eq!(editor.gizmo().mode(), GizmoMode::Rotation);
}

#[test]
fn a_rotation_drag_is_one_undo_step() {
    let Scene { mut editor, hero, .. } = scene();
    let head = head_of(&editor, hero);
    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");

    assert!(editor.begin_rotation_drag());
    for step in 1..=10 {
        assert!(editor.drag_rotation(Quat::from_rotation_x(step as f32 * 0.1)).expect("drag"));
    }
    let command = editor.end_rotation_drag().expect("drag recorded");
    assert!(matches!(command, Command::BoneRotation { .. }));
    assert_eq!(editor.history().len(), 1);

    let undone = editor.undo().expect("undo");
    assert_eq!(undone, command);
    assert!(quat_approx_eq(editor.bone_rotation(hero, head).expect("rotation"), Quat::IDENTITY));
    assert!(editor.can_redo());

    editor.redo().expect("redo");
    assert!(quat_approx_eq(editor.bone_rotation(hero, head).expect("rotation"), Quat::from_rotation_x(1.0)));
    assert!(!editor.can_redo());
}

#[test]
fn a_drag_that_returns_to_start_is_not_recorded() {
    let Scene { mut editor, hero, .. } = scene();
    let head = head_of(&editor, hero);
    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");

    assert!(editor.begin_rotation_drag());
    editor.drag_rotation(Quat::from_rotation_y(0.8)).expect("drag");
    editor.drag_rotation(Quat::IDENTITY).expect("drag back");
    assert!(editor.end_rotation_drag().is_none());
    assert!(editor.history().is_empty());
    assert!(!editor.can_undo());
}

#[test]
fn transform_drags_and_direct_moves_undo_in_order() {
    let Scene { mut editor, cube, .. } = scene();
    editor.select(Some(SelectionTarget::Entity(cube))).expect("select cube");

    assert!(editor.begin_transform_drag());
    let dragged = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
    assert!(editor.drag_transform(dragged).expect("drag"));
    editor.end_transform_drag().expect("drag recorded");

    let moved = Transform::from_position(Vec3::new(3.0, 2.0, 0.0));
    editor.set_entity_transform(cube, moved).expect("move");
    assert_eq!(editor.history().len(), 2);

    editor.undo().expect("undo move");
    assert_eq!(*editor.entity(cube).expect("cube").transform(), dragged);
    editor.undo().expect("undo drag");
    assert_eq!(*editor.entity(cube).expect("cube").transform(), Transform::default());
    assert!(editor.undo().is_none());
}

#[test]
fn cancelled_drag_restores_the_start_pose() {
    let Scene { mut editor, hero, .. } = scene();
    let head = head_of(&editor, hero);
    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");
    assert!(editor.begin_rotation_drag());
    editor.drag_rotation(Quat::from_rotation_z(0.6)).expect("drag");
    assert!(editor.cancel_drag().expect("cancel"));
    assert!(quat_approx_eq(editor.bone_rotation(hero, head).expect("rotation"), Quat::IDENTITY));
    assert!(editor.history().is_empty());
}

#[test]
fn picking_selects_and_hover_reports_capabilities() {
    let Scene { mut editor, cube, .. } = scene();
    let origin = Vec3::new(0.0, 0.0, 5.0);
    let forward = Vec3::new(0.0, 0.0, -1.0);
    assert_eq!(editor.hover_cursor(origin, forward), CursorIcon::Move);
    assert_eq!(editor.select_at(origin, forward).expect("click"), Some(SelectionTarget::Entity(cube)));

    let miss = Vec3::new(0.0, 20.0, 5.0);
    assert_eq!(editor.hover_cursor(miss, forward), CursorIcon::Default);
    assert_eq!(editor.select_at(miss, forward).expect("click"), None);
    assert_eq!(editor.selection(), None);
}

#[test]
fn subscribers_observe_history_changes_and_removal_clears_selection() {
    let Scene { mut editor, cube, .. } = scene();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let subscription = editor.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    editor.select(Some(SelectionTarget::Entity(cube))).expect("select cube");
    editor.set_entity_transform(cube, Transform::from_position(Vec3::X)).expect("move");
    editor.remove_entity(cube).expect("remove");
    assert!(editor.unsubscribe(subscription));

    let seen = seen.borrow();
    assert!(seen.contains(&EditorEvent::HistoryChanged { can_undo: true, can_redo: false }));
    assert!(seen.contains(&EditorEvent::EntityRemoved { id: cube }));
    assert_eq!(editor.selection(), None);
    assert!(editor.history().is_empty(), "commands for removed entities are dropped");
}

fn drag_bone(editor: &mut EditorContext, angle: f32) -> Command {
    assert!(editor.begin_rotation_drag());
    editor.drag_rotation(Quat::from_rotation_x(angle)).expect("drag");
    editor.end_rotation_drag().expect("drag recorded")
}

#[test]
fn swapping_the_model_drops_handles_into_the_old_rig() {
    let Scene { mut editor, cube, hero } = scene();
    let hero_root = editor.entity(hero).expect("hero").root();
    let head = head_of(&editor, hero);
    let moved = Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
    editor.set_entity_transform(cube, moved).expect("move");
    editor.select(Some(SelectionTarget::Bone { character: hero, bone: head })).expect("select head");
    drag_bone(&mut editor, 0.5);
    drag_bone(&mut editor, 1.0);
    editor.undo().expect("undo second drag");
    assert!(editor.can_redo());
    editor.drain_events();

    editor.set_character_model(hero, "models/jaw.glb").expect("character");
    pollster::block_on(editor.wait_until_ready(hero)).expect("registered");

    assert_eq!(editor.selection(), Some(SelectionTarget::Entity(hero)));
    assert_eq!(editor.gizmo().attached(), Some(hero_root));
    assert_eq!(editor.graph().selected_nodes(), vec![hero_root]);
    assert!(rig_visible(&editor, hero));

    let jaw = editor.entity(hero).and_then(|e| e.as_character()).and_then(|c| c.bone_index("Jaw")).expect("jaw");
    assert_eq!(jaw, head, "the new rig reuses the old index");
    assert_eq!(editor.history().len(), 1);
    assert!(!editor.can_redo());
    assert!(editor.redo().is_none());
    assert!(quat_approx_eq(editor.bone_rotation(hero, jaw).expect("rotation"), Quat::IDENTITY));

    let events = editor.drain_events();
    assert!(events.contains(&EditorEvent::HistoryChanged { can_undo: true, can_redo: false }));
    assert!(events.contains(&EditorEvent::EntityLoaded { id: hero, has_skeleton: true }));

    editor.undo().expect("undo move");
    assert_eq!(*editor.entity(cube).expect("cube").transform(), Transform::default());
    assert!(!editor.can_undo());
}
