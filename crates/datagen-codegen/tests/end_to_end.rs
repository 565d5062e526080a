//! Builds a generated project with cargo and runs it. Needs network access for the
//! generated crate's dependencies, so it only runs with `--ignored`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use datagen_codegen::{CodegenEngine, CodegenOptions};
use datagen_core::{DirectoryNode, ModelDefinition};
use datagen_parse::parse_model;

const USERS: &str = include_str!("../../datagen-parse/tests/fixtures/users.dg");

const ORDERS: &str = r#"
model orders {
    metadata {
        count: 6
    }

    fields {
        id: i64,
        user_id: i64,
    }

    gens {
        func id(iter: usize) {
            iter as i64
        }

        func user_id(iter: usize) {
            datagen().users().id(iter % 3 + 7)
        }
    }
}
"#;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("datagen-e2e-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn column(csv: &str, name: &str) -> Vec<String> {
    let mut lines = csv.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    let index = header.iter().position(|cell| *cell == name).unwrap();
    lines
        .map(|line| line.split(',').nth(index).unwrap().to_string())
        .collect()
}

fn run(command: &mut Command) -> String {
    let output = command.output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    assert!(output.status.success(), "{command:?} failed:\n{stderr}");
    stderr
}

fn build(models: &[ModelDefinition], root: &Path) -> PathBuf {
    let mut tree = DirectoryNode::new("");
    for model in models {
        tree.models.insert(model.qualified_name.clone(), Vec::new());
    }
    let project = CodegenEngine::new(CodegenOptions::default())
        .unwrap()
        .generate(models, &tree)
        .unwrap();

    let project_dir = root.join("project");
    project
        .write_to(&project_dir, |path, bytes| {
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(path, bytes)
        })
        .unwrap();

    let target = project_dir.join("target");
    run(Command::new(option_env!("CARGO").unwrap_or("cargo"))
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(project_dir.join("Cargo.toml"))
        .arg("--target-dir")
        .arg(&target));
    target
        .join("debug")
        .join(format!("datagen-generated{}", std::env::consts::EXE_SUFFIX))
}

#[test]
#[ignore = "compiles the generated project with cargo"]
fn generated_program_writes_consistent_cross_model_csv() {
    let root = temp_dir();
    let models = vec![
        parse_model(USERS, "users").unwrap(),
        parse_model(ORDERS, "orders").unwrap(),
    ];
    let binary = build(&models, &root);

    let out = root.join("out");
    fs::create_dir_all(&out).unwrap();
    let stderr = run(Command::new(&binary)
        .env("NO_COLOR", "1")
        .args(["gen", "-f", "csv", "-o"])
        .arg(&out));

    let users = fs::read_to_string(out.join("users.csv")).unwrap();
    let orders = fs::read_to_string(out.join("orders.csv")).unwrap();

    let user_ids = column(&users, "id");
    assert_eq!(user_ids.len(), 25);
    assert_eq!(user_ids.first().map(String::as_str), Some("1"));

    let referenced = column(&orders, "user_id");
    assert_eq!(referenced, ["8", "9", "10", "8", "9", "10"]);
    for id in &referenced {
        assert!(user_ids.contains(id), "orders reference unknown user {id}");
    }

    assert!(
        stderr.contains(r#"["users", "orders"]"#),
        "unexpected load order in:\n{stderr}"
    );
}

#[test]
#[ignore = "compiles the generated project with cargo"]
fn tag_filter_limits_generated_models() {
    let root = temp_dir();
    let models = vec![
        parse_model(USERS, "users").unwrap(),
        parse_model(ORDERS, "orders").unwrap(),
    ];
    let binary = build(&models, &root);

    let out = root.join("out");
    fs::create_dir_all(&out).unwrap();
    run(Command::new(&binary)
        .args(["gen", "-n", "3", "-t", "env=prod", "-o"])
        .arg(&out));

    let users = fs::read_to_string(out.join("users.csv")).unwrap();
    assert_eq!(column(&users, "id"), ["1", "2", "3"]);
    assert!(!out.join("orders.csv").exists());
}
