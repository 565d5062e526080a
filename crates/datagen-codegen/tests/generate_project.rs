use std::fs;
use std::path::PathBuf;

use datagen_codegen::{CodegenEngine, CodegenError, CodegenOptions};
use datagen_core::{DirectoryNode, ModelDefinition, collect_dg_dir};
use datagen_parse::parse_model;
use datagen_runtime::SinkKind;

const USERS: &str = include_str!("../../datagen-parse/tests/fixtures/users.dg");

const ORDERS: &str = r#"
model orders {
    metadata {
        count: 4
    }

    fields {
        id: i64,
        user_id: i64,
        labels: Vec<String>,
    }

    gens {
        func id(iter: usize) {
            iter as i64
        }

        func user_id(iter: usize) {
            datagen().users().id(iter % 2)
        }

        func labels() {
            vec!["a".to_string()]
        }
    }
}
"#;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("datagen-codegen-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn models() -> Vec<ModelDefinition> {
    vec![
        parse_model(USERS, "users").unwrap(),
        parse_model(ORDERS, "orders").unwrap(),
    ]
}

fn flat_tree(models: &[ModelDefinition]) -> DirectoryNode {
    let mut tree = DirectoryNode::new("");
    for model in models {
        tree.models.insert(model.qualified_name.clone(), Vec::new());
    }
    tree
}

#[test]
fn renders_a_complete_project() {
    let models = models();
    let engine = CodegenEngine::new(CodegenOptions::default()).unwrap();
    let project = engine.generate(&models, &flat_tree(&models)).unwrap();

    for path in [
        "Cargo.toml",
        "src/main.rs",
        "src/commands.rs",
        "src/model_manager.rs",
        "src/sink_manager.rs",
        "src/tags.rs",
        "src/models/mod.rs",
        "src/models/users.rs",
        "src/models/orders.rs",
        "src/sinks/mod.rs",
        "src/sinks/mysql/mod.rs",
        "src/sinks/mysql/users.rs",
        "src/sinks/postgres/orders.rs",
        "src/runtime/mod.rs",
        "src/runtime/links.rs",
        "src/runtime/mysql.rs",
        "src/runtime/postgres.rs",
        "src/runtime/stdlib.rs",
    ] {
        assert!(project.file(path).is_some(), "missing {path}");
    }

    for file in &project.files {
        if file.path.extension().is_some_and(|ext| ext == "rs") {
            syn::parse_file(&file.contents)
                .unwrap_or_else(|err| panic!("{} does not parse: {err}", file.path.display()));
        }
    }
}

#[test]
fn model_module_carries_user_code() {
    let models = models();
    let engine = CodegenEngine::new(CodegenOptions::default()).unwrap();
    let project = engine.generate(&models, &flat_tree(&models)).unwrap();

    let users = &project.file("src/models/users.rs").unwrap().contents;
    assert!(users.contains("const DOMAINS: [&str; 2]"));
    assert!(users.contains("Metadata::new(25, &[(\"env\", \"prod\"), (\"team\", \"identity\"), ])"));
    assert!(users.contains("pub score: i64,"));
    assert!(users.contains("self.gen_score(next as _, 10, 5)"));
    assert!(users.contains("fn gen_score(&self, iter: usize, base: i64, spread: i64) -> i64"));
    assert!(users.contains("format!(\"{}|{}\", self.id, self.email).into_bytes()"));

    let orders = &project.file("src/models/orders.rs").unwrap().contents;
    assert!(orders.contains("self.gen_labels()"));
    assert!(orders.contains("datagen().users().id(iter % 2)"));
    assert!(orders.contains("Vec::new()"));
    assert!(orders.contains("let _scope = links().scope(NAME);"));
}

#[test]
fn registry_and_bindings_reference_every_model() {
    let models = models();
    let engine = CodegenEngine::new(CodegenOptions::default()).unwrap();
    let project = engine.generate(&models, &flat_tree(&models)).unwrap();

    let manager = &project.file("src/model_manager.rs").unwrap().contents;
    assert!(manager.contains("registry.insert(models::users::NAME, datagen.users.clone());"));
    assert!(manager.contains("self.__links.record_reference(models::orders::NAME);"));

    let mysql = &project.file("src/sinks/mysql/users.rs").unwrap().contents;
    assert!(mysql.contains(r#"const QUOTED_COLUMNS: &str = "`id`, `email`, `score`";"#));
    assert!(mysql.contains("SinkKind::Mysql"));

    let postgres = &project.file("src/sinks/postgres/users.rs").unwrap().contents;
    assert!(postgres.contains(r#"const QUOTED_COLUMNS: &str = "\"id\", \"email\", \"score\"";"#));

    let cargo = &project.file("Cargo.toml").unwrap().contents;
    assert!(cargo.contains("name = \"datagen-generated\""));
    assert!(cargo.contains("\"mysql\", \"postgres\""));
}

#[test]
fn only_requested_sinks_are_generated() {
    let models = models();
    let options = CodegenOptions {
        package_name: "only-pg".to_string(),
        sinks: vec![SinkKind::Postgres],
        verify_syntax: true,
    };
    let project = CodegenEngine::new(options)
        .unwrap()
        .generate(&models, &flat_tree(&models))
        .unwrap();

    assert!(project.file("src/runtime/postgres.rs").is_some());
    assert!(project.file("src/runtime/mysql.rs").is_none());
    assert!(project.file("src/sinks/mysql/users.rs").is_none());
    let sinks = &project.file("src/sink_manager.rs").unwrap().contents;
    assert!(!sinks.contains("MySqlSink"));
    assert!(sinks.contains("PostgresSink::from_spec(spec)"));
}

#[test]
fn nested_directories_become_accessors() {
    let root = temp_dir();
    fs::create_dir_all(root.join("billing")).unwrap();
    fs::write(root.join("users.dg"), USERS).unwrap();
    fs::write(
        root.join("billing").join("invoice.dg"),
        "model invoice { fields { id: i64 } gens { func id(iter: usize) { iter as i64 } } }",
    )
    .unwrap();

    let tree = collect_dg_dir(&root).unwrap();
    let models: Vec<ModelDefinition> = tree
        .units()
        .into_iter()
        .map(|(name, source)| parse_model(std::str::from_utf8(source).unwrap(), name).unwrap())
        .collect();

    let project = CodegenEngine::new(CodegenOptions::default())
        .unwrap()
        .generate(&models, &tree)
        .unwrap();

    let manager = &project.file("src/model_manager.rs").unwrap().contents;
    assert!(manager.contains("pub struct Dir_billing {"));
    assert!(manager.contains("pub fn billing(&self) -> &Dir_billing {"));
    assert!(manager.contains("datagen.billing.invoice.clone()"));
    assert!(project.file("src/models/billing___dgdir___invoice.rs").is_some());

    let written = project
        .write_to(&root.join("out"), |path, bytes| {
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(path, bytes)
        })
        .unwrap();
    assert_eq!(written.len(), project.files.len());
    assert!(root.join("out/src/models/billing___dgdir___invoice.rs").is_file());
}

#[test]
fn model_file_and_directory_sharing_a_name_are_rejected() {
    let root = temp_dir();
    fs::create_dir_all(root.join("users")).unwrap();
    fs::write(root.join("users.dg"), USERS).unwrap();
    fs::write(
        root.join("users").join("profile.dg"),
        "model profile { fields { id: i64 } gens { func id(iter: usize) { iter as i64 } } }",
    )
    .unwrap();

    let tree = collect_dg_dir(&root).unwrap();
    let models: Vec<ModelDefinition> = tree
        .units()
        .into_iter()
        .map(|(name, source)| parse_model(std::str::from_utf8(source).unwrap(), name).unwrap())
        .collect();

    let err = CodegenEngine::new(CodegenOptions::default())
        .unwrap()
        .generate(&models, &tree)
        .unwrap_err();
    match err {
        CodegenError::AccessorClash { location, name } => {
            assert_eq!(location, "the source root");
            assert_eq!(name, "users");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unrenderable_model_reports_template_and_path() {
    let mut broken = parse_model(ORDERS, "orders").unwrap();
    broken.gen_functions = Some(Vec::new());

    let err = CodegenEngine::new(CodegenOptions::default())
        .unwrap()
        .generate(std::slice::from_ref(&broken), &DirectoryNode::default())
        .unwrap_err();

    match err {
        CodegenError::Render {
            template,
            path,
            message,
        } => {
            assert_eq!(template, "model");
            assert_eq!(path, PathBuf::from("src/models/orders.rs"));
            assert_eq!(message, "field id has no gen function");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn syntax_errors_in_user_code_are_caught_before_writing() {
    let mut broken = parse_model(ORDERS, "orders").unwrap();
    broken.misc = Some("fn oops( {".to_string());

    let err = CodegenEngine::new(CodegenOptions::default())
        .unwrap()
        .generate(std::slice::from_ref(&broken), &DirectoryNode::default())
        .unwrap_err();
    assert!(err.to_string().contains("generated code does not parse"));
}
