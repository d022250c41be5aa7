use glam::{Quat, Vec3};
use mud_engine::assets::MemoryModelSource;
use mud_engine::config::EditorConfig;
use mud_engine::entity::{EntityId, EntityKind, EntityType, GenerativeProps, LightProps, ShapeProps, ShapeType};
use mud_engine::factory::EntityOptions;
use mud_engine::scene::{ProjectDocument, SerializedEntity, Vec3Data};
use mud_engine::skeleton::Skeleton;
use mud_engine::transform::{quat_approx_eq, NodeTransform, Transform};
use mud_engine::{EditorContext, GenerationStep, ProjectManager};
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn rig() -> Skeleton {
    let up = |y: f32| NodeTransform::from_translation(Vec3::new(0.0, y, 0.0));
    let mut skeleton = Skeleton::new("rig");
    let hips = skeleton.add_bone("Hips", None, up(1.0));
    let spine = skeleton.add_bone("Spine", Some(hips), up(0.3));
    skeleton.add_bone("Head", Some(spine), up(0.4));
    skeleton.add_bone("LeftHandThumb1", Some(spine), up(0.1));
    skeleton.add_bone("LeftUpLeg", Some(hips), up(-0.1));
    skeleton
}

fn source_with_rig() -> MemoryModelSource {
    let source = MemoryModelSource::new();
    source.register("models/rig.glb", Some(rig()));
    source
}

fn light_intensity(editor: &EditorContext, id: EntityId) -> Option<f32> {
    match editor.entity(id)?.kind() {
        EntityKind::Light(light) => Some(light.props().intensity),
        _ => None,
    }
}

#[test]
fn shapes_and_lights_survive_a_save_and_load() {
    let dir = tempdir().expect("tempdir");
    let config = EditorConfig::default();
    let path = dir.path().join(ProjectManager::default_file_name(&config));
    assert!(path.ends_with("untitled.mud"));

    let mut editor = EditorContext::new(config.clone(), MemoryModelSource::new());
    let cube = editor.create_entity(
        EntityOptions::shape("crate", ShapeProps::new(ShapeType::Cube))
            .with_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0))),
    );
    let lamp = editor.create_entity(EntityOptions::light("lamp", LightProps::with_intensity(0.7)));
    let mut manager = ProjectManager::new();
    manager.save_to_path(&editor, &path).expect("save");
    assert!(!manager.is_dirty(&editor));

    let mut restored = EditorContext::new(config, MemoryModelSource::new());
    let mut reader = ProjectManager::new();
    let report = pollster::block_on(reader.load_from_path(&mut restored, &path)).expect("load");
    assert_eq!(report.restored, 2);
    assert!(report.fallbacks.is_empty());
    assert_eq!(restored.entities()[0].id, cube, "entity order follows the file");
    assert_eq!(restored.entity(cube).expect("cube").transform().position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(light_intensity(&restored, lamp), Some(0.7));
    assert!(!reader.is_dirty(&restored));

    restored.set_entity_transform(cube, Transform::from_position(Vec3::ZERO)).expect("move");
    assert!(reader.is_dirty(&restored));
    reader.save(&restored).expect("save in place");
    assert!(!reader.is_dirty(&restored));
}

#[test]
fn generation_history_and_full_transform_survive_a_save_and_load() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("gallery.mud");
    let placed = Transform::new(Vec3::new(-2.0, 0.5, 4.0), Vec3::new(0.3, -1.2, 0.75), Vec3::new(2.0, 0.5, 1.5));
    let mut editor = EditorContext::new(EditorConfig::default(), MemoryModelSource::new());
    let statue = editor.create_entity(
        EntityOptions::generative("statue", GenerativeProps::default()).with_transform(placed),
    );
    let first = editor.apply_generated_image(statue, "gen/a.png", "clay bust").expect("generative");
    let second = editor.apply_generated_image(statue, "gen/b.png", "marble bust").expect("generative");
    let third = editor.apply_generated_image(statue, "gen/c.png", "bronze bust").expect("generative");
    let stepped = editor.navigate_generation(statue, GenerationStep::Previous).expect("generative");
    assert_eq!(stepped.map(|log| log.id), Some(second.id.clone()));
    ProjectManager::new().save_to_path(&editor, &path).expect("save");

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    let saved = raw["entities"].as_array().and_then(|entities| entities.first()).expect("saved entity");
    assert_eq!(saved["entityType"], "generative");
    assert_eq!(saved["props"]["currentGenerationId"], second.id.as_str());
    let parents: Vec<&Value> = saved["props"]["generationLogs"]
        .as_array()
        .expect("logs")
        .iter()
        .map(|log| &log["derivedFrom"])
        .collect();
    assert_eq!(parents, [&Value::Null, &json!(first.id), &json!(second.id)]);

    let mut restored = EditorContext::new(EditorConfig::default(), MemoryModelSource::new());
    let report = pollster::block_on(ProjectManager::new().load_from_path(&mut restored, &path)).expect("load");
    assert_eq!(report.restored, 1);
    let entity = restored.entity(statue).expect("same id");
    assert_eq!(entity.id, statue);
    assert_eq!(entity.entity_type(), EntityType::Generative);
    let transform = entity.transform();
    assert!(transform.position.abs_diff_eq(placed.position, 1e-6));
    assert!(transform.rotation.abs_diff_eq(placed.rotation, 1e-6));
    assert!(transform.scale.abs_diff_eq(placed.scale, 1e-6));

    let generative = entity.as_generative().expect("generative");
    assert_eq!(generative.logs(), [first.clone(), second.clone(), third]);
    assert_eq!(generative.current_index(), Some(1));
    assert_eq!(generative.current_generation().map(|log| log.id.as_str()), Some(second.id.as_str()));
    assert_eq!(generative.props().image_url.as_deref(), Some("gen/b.png"));
    assert_eq!(generative.lineage(), [second.id.as_str(), first.id.as_str()]);
}

#[test]
fn character_pose_round_trips_through_the_document() {
    let mut editor = EditorContext::new(EditorConfig::default(), source_with_rig());
    let hero = editor.create_entity(EntityOptions::character("hero", "models/rig.glb"));
    pollster::block_on(editor.wait_all_ready());
    let spine = editor.entity(hero).and_then(|e| e.as_character()).and_then(|c| c.bone_index("Spine")).expect("spine");
    let bend = Quat::from_rotation_x(0.5);
    editor.set_bone_rotation(hero, spine, bend).expect("pose");

    let document = editor.serialize_scene().expect("serialize");
    let saved = &document.find_entity(hero).expect("hero saved").props;
    assert_eq!(saved["boneRotations"].as_object().map(|rotations| rotations.len()), Some(5));

    let mut restored = EditorContext::new(EditorConfig::default(), source_with_rig());
    let report = pollster::block_on(restored.deserialize_scene(document));
    assert_eq!(report.bones_applied, 5);
    assert_eq!(report.bones_skipped, 0);
    assert!(quat_approx_eq(restored.bone_rotation(hero, spine).expect("rotation"), bend));
    assert!(restored.history().is_empty(), "loading is not an undoable edit");
}

#[test]
fn saved_pose_is_kept_when_the_model_is_missing() {
    let mut editor = EditorContext::new(EditorConfig::default(), source_with_rig());
    let hero = editor.create_entity(EntityOptions::character("hero", "models/rig.glb"));
    pollster::block_on(editor.wait_all_ready());
    let head = editor.entity(hero).and_then(|e| e.as_character()).and_then(|c| c.bone_index("Head")).expect("head");
    editor.set_bone_rotation(hero, head, Quat::from_rotation_y(0.4)).expect("pose");
    let document = editor.serialize_scene().expect("serialize");

    let mut restored = EditorContext::new(EditorConfig::default(), MemoryModelSource::new());
    let report = pollster::block_on(restored.deserialize_scene(document));
    assert_eq!(report.restored, 1);
    assert_eq!(report.characters_without_skeleton, vec![hero]);
    assert_eq!(report.bones_applied, 0);

    let resaved = restored.serialize_scene().expect("serialize");
    let rotations = &resaved.find_entity(hero).expect("hero").props["boneRotations"];
    assert_eq!(rotations.as_object().map(|r| r.len()), Some(5));
    assert!((rotations["Head"]["y"].as_f64().expect("y") - f64::from((0.2f32).sin())).abs() < 1e-5);
}

#[test]
fn malformed_entries_fall_back_and_settings_are_clamped() {
    let shared = EntityId::new();
    let entity = |entity_type: EntityType, props: serde_json::Value| SerializedEntity {
        id: shared,
        name: "dup".to_string(),
        entity_type,
        created: None,
        position: Vec3Data::new(0.0, 4.0, 0.0),
        rotation: Vec3Data::default(),
        scaling: Vec3Data::new(1.0, 1.0, 1.0),
        props,
    };
    let mut document = ProjectDocument::default();
    document.entities.push(entity(EntityType::Light, json!({ "intensity": "bright" })));
    document.entities.push(entity(EntityType::Shape, json!({ "shapeType": "sphere" })));
    document.render_settings.prompt_strength = 3.0;
    document.environment.sun.intensity = -2.0;

    let mut editor = EditorContext::new(EditorConfig::default(), MemoryModelSource::new());
    let report = pollster::block_on(editor.deserialize_scene(document));
    assert_eq!(report.restored, 2);
    assert_eq!(report.fallbacks, vec![shared]);
    assert_eq!(report.reassigned_ids.len(), 1);
    let (old, fresh) = report.reassigned_ids[0];
    assert_eq!(old, shared);
    assert_ne!(fresh, shared);

    assert_eq!(light_intensity(&editor, shared), Some(1.0));
    assert_eq!(editor.entity(shared).expect("light").transform().position, Vec3::new(0.0, 4.0, 0.0));
    let sphere = editor.entity(fresh).expect("reassigned shape");
    assert!(matches!(sphere.kind(), EntityKind::Shape(shape) if shape.shape_type() == ShapeType::Sphere));

    assert_eq!(editor.render_settings().prompt_strength, 1.0);
    assert_eq!(editor.environment().sun.intensity, 0.0);
}

#[test]
fn loading_replaces_the_previous_scene() {
    let mut editor = EditorContext::new(EditorConfig::default(), MemoryModelSource::new());
    let old = editor.create_entity(EntityOptions::shape("old", ShapeProps::default()));
    editor.set_entity_transform(old, Transform::from_position(Vec3::Y)).expect("move");
    assert!(editor.can_undo());

    let report = pollster::block_on(editor.deserialize_scene(ProjectDocument::default()));
    assert_eq!(report, Default::default());
    assert!(editor.entities().is_empty());
    assert!(editor.graph().is_empty());
    assert!(!editor.can_undo());
    assert!(editor.selection().is_none());
}
