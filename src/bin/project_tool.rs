use anyhow::{anyhow, Context, Result};
use mud_engine::entity::EntityType;
use mud_engine::scene::ProjectDocument;
use std::env;
use std::path::Path;
use std::process;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "validate" => {
            let project_path = args
                .next()
                .ok_or_else(|| anyhow!("validate requires a path: project_tool validate <project>"))?;
            cmd_validate(&project_path)
        }
        "list" => {
            let project_path =
                args.next().ok_or_else(|| anyhow!("list requires a path: project_tool list <project>"))?;
            cmd_list(&project_path)
        }
        "reset-pose" => {
            let input = args
                .next()
                .ok_or_else(|| anyhow!("reset-pose requires input path: project_tool reset-pose <in> <out>"))?;
            let output = args
                .next()
                .ok_or_else(|| anyhow!("reset-pose requires output path: project_tool reset-pose <in> <out>"))?;
            cmd_reset_pose(&input, &output)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Project Tool

Usage:
  project_tool validate <project>         Check ids, render strengths, and generation lineage
  project_tool list <project>             List entities with their type and position
  project_tool reset-pose <in> <out>      Strip saved bone rotations from every character
  project_tool help                       Show this message
"
    );
}

fn cmd_validate(project_path: &str) -> Result<()> {
    let project = load_project(project_path)?;
    let issues = project.validate();
    if issues.is_empty() {
        println!(
            "Project '{}' is valid. Version: {}. Entities: {}. Renders logged: {}",
            project_path,
            project.version,
            project.entities.len(),
            project.render_settings.render_log.len(),
        );
        Ok(())
    } else {
        Err(anyhow!(format!("project '{}' has issues:\n  - {}", project_path, issues.join("\n  - "))))
    }
}

fn cmd_list(project_path: &str) -> Result<()> {
    let project = load_project(project_path)?;
    println!("{:<5} {:<38} {:<11} {:<26} {}", "Idx", "Entity ID", "Type", "Position", "Name");
    println!("{}", "-".repeat(100));
    for (index, entity) in project.entities.iter().enumerate() {
        let position = format!("({:.2}, {:.2}, {:.2})", entity.position.x, entity.position.y, entity.position.z);
        let name = if entity.name.is_empty() { "-" } else { entity.name.as_str() };
        let id = entity.id.to_string();
        println!("{:<5} {:<38} {:<11} {:<26} {}", index, id, entity.entity_type.label(), position, name);
    }
    Ok(())
}

fn cmd_reset_pose(input_path: &str, output_path: &str) -> Result<()> {
    let mut project = load_project(input_path)?;
    let mut cleared = 0;
    for entity in project.entities.iter_mut().filter(|entity| entity.entity_type == EntityType::Character) {
        if let Some(props) = entity.props.as_object_mut() {
            if props.remove("boneRotations").is_some() {
                cleared += 1;
            }
        }
    }
    project.save_to_path(output_path)?;
    println!("Cleared saved poses on {} characters: '{}' -> '{}'", cleared, input_path, output_path);
    Ok(())
}

fn load_project(path: &str) -> Result<ProjectDocument> {
    let normalized = Path::new(path).canonicalize().unwrap_or_else(|_| Path::new(path).to_path_buf());
    ProjectDocument::load_from_path(&normalized)
        .with_context(|| format!("loading project '{}'", normalized.display()))
}
