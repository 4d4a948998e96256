//! Validation and run bootstrap against the in-memory registry.

mod common;

use std::fs;
use std::sync::Arc;

use common::{run_metadata, Fixture, COMMIT, ROOT};
use fdp_registry::RegistryError;
use fdp_sdk::{Config, Entity, InMemoryRegistry, RegistryLocation, RunPhase, SdkError, Table};
use serde_json::json;

const MANDATORY: [&str; 7] = [
    "local_data_registry_url",
    "write_data_store",
    "default_input_namespace",
    "default_output_namespace",
    "latest_commit",
    "remote_repo",
    "description",
];

#[test]
fn each_missing_mandatory_key_is_rejected_without_registry_calls() {
    let fixture = Fixture::new("");
    let full = run_metadata(&fixture.store);
    for key in MANDATORY {
        let text: String = full
            .lines()
            .filter(|l| !l.trim_start().starts_with(&format!("{key}:")))
            .map(|l| format!("{l}\n"))
            .collect();
        fs::write(&fixture.config_path, text).unwrap();

        let err = Config::validate(
            &fixture.config_path,
            &fixture.script_path,
            None,
            RegistryLocation::Local,
        )
        .unwrap_err();
        match err {
            SdkError::ConfigParsing(msg) => assert!(msg.contains(key), "{key}: {msg}"),
            other => panic!("{key}: unexpected error {other}"),
        }
    }
    assert_eq!(fixture.registry.request_count(), 0);
}

#[test]
fn remote_location_needs_the_remote_url() {
    let fixture = Fixture::new("");
    let text: String = run_metadata(&fixture.store)
        .lines()
        .filter(|l| !l.contains("remote_data_registry_url"))
        .map(|l| format!("{l}\n"))
        .collect();
    fs::write(&fixture.config_path, text).unwrap();

    assert!(Config::validate(&fixture.config_path, &fixture.script_path, None, RegistryLocation::Local).is_ok());
    let err = Config::validate(
        &fixture.config_path,
        &fixture.script_path,
        None,
        RegistryLocation::Remote,
    )
    .unwrap_err();
    assert!(err.to_string().contains("remote_data_registry_url"));
}

#[test]
fn validate_leaves_the_run_unregistered() {
    let fixture = Fixture::new("");
    let config = fixture.validate();
    assert_eq!(config.phase(), RunPhase::Validated);
    assert!(config.code_run().is_none());
    assert!(config.api_url().is_none());
    assert!(config.metadata().public);
    assert_eq!(config.metadata().latest_commit, COMMIT);
}

#[test]
fn initialise_registers_config_script_repo_and_code_run() {
    let fixture = Fixture::new("");
    let config = fixture.initialised();
    let registry = &fixture.registry;

    assert_eq!(config.phase(), RunPhase::Initialised);
    assert_eq!(config.api_url(), Some(ROOT));

    let roots = registry.rows(Table::StorageRoot);
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["root"], format!("file://{}/", fixture.store.display()));
    assert_eq!(roots[1]["root"], "https://github.com/");

    let extensions: Vec<_> = registry
        .rows(Table::FileType)
        .iter()
        .map(|row| row["extension"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(extensions, vec!["yaml", "sh"]);

    let repo = registry.find(Table::StorageLocation, "hash", &json!(COMMIT));
    assert_eq!(repo.len(), 1);
    assert_eq!(repo[0]["path"], "FAIRDataPipeline/rustDataPipeline");

    let config_hash = fdp_sdk::ContentHasher::hash_file(&fixture.config_path).unwrap();
    assert_eq!(
        registry
            .find(Table::StorageLocation, "hash", &json!(config_hash.to_hex()))
            .len(),
        1
    );

    let code_run = config.code_run().unwrap();
    assert_eq!(registry.rows(Table::CodeRun).len(), 1);
    assert_eq!(code_run["description"], "Test run");
    assert_eq!(code_run["inputs"], json!([]));
    assert_eq!(code_run["outputs"], json!([]));
    assert_eq!(config.code_run_uuid().map(str::len), Some(36));

    let objects = registry.rows(Table::Object);
    assert_eq!(objects.len(), 3);
    assert_eq!(code_run["model_config"], objects[0]["url"]);
    assert_eq!(code_run["submission_script"], objects[1]["url"]);
    assert_eq!(code_run["code_repo"], objects[2]["url"]);
    assert_eq!(objects[0]["authors"], json!([format!("{ROOT}author/1/")]));
}

#[test]
fn second_run_reuses_roots_and_locations() {
    let fixture = Fixture::new("");
    let first = fixture.initialised();
    let second = fixture.initialised();

    assert_eq!(fixture.registry.rows(Table::StorageRoot).len(), 2);
    assert_eq!(fixture.registry.rows(Table::StorageLocation).len(), 3);
    assert_eq!(fixture.registry.rows(Table::FileType).len(), 2);
    assert_eq!(fixture.registry.rows(Table::CodeRun).len(), 2);
    assert_ne!(first.code_run_uuid(), second.code_run_uuid());
}

#[test]
fn script_without_extension_is_text() {
    let fixture = Fixture::new("");
    let script = fixture.dir.path().join("run");
    fs::write(&script, "echo").unwrap();
    let mut config =
        Config::validate(&fixture.config_path, &script, None, RegistryLocation::Local).unwrap();
    config.initialise(Arc::new(fixture.registry.clone())).unwrap();
    assert_eq!(fixture.registry.find(Table::FileType, "extension", &json!("txt")).len(), 1);
}

#[test]
fn missing_admin_user() {
    let fixture = Fixture::new("");
    let mut config = fixture.validate();
    let empty = InMemoryRegistry::new(ROOT);
    let err = config.initialise(Arc::new(empty)).unwrap_err();
    assert!(matches!(
        err,
        SdkError::EntityNotFound {
            entity: Entity::User,
            ..
        }
    ));
    assert_eq!(config.phase(), RunPhase::Validated);
}

#[test]
fn missing_author_hints_at_init() {
    let fixture = Fixture::new("");
    let mut config = fixture.validate();
    let registry = InMemoryRegistry::new(ROOT);
    registry.insert(Table::Users, json!({"username": "admin"}));
    let err = config.initialise(Arc::new(registry)).unwrap_err();
    match err {
        SdkError::EntityNotFound {
            entity: Entity::Author,
            detail,
        } => assert!(detail.contains("init")),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn token_is_forwarded() {
    let fixture = Fixture::new("");
    fixture.registry.require_token("s3cret");

    let mut config = fixture.validate_with_token(Some("s3cret"));
    config.initialise(Arc::new(fixture.registry.clone())).unwrap();

    let mut config = fixture.validate_with_token(Some("wrong"));
    let err = config.initialise(Arc::new(fixture.registry.clone())).unwrap_err();
    assert!(matches!(
        err,
        SdkError::Registry(RegistryError::UnexpectedStatus { actual: 401, .. })
    ));
}

#[test]
fn initialise_twice_is_rejected() {
    let fixture = Fixture::new("");
    let mut config = fixture.initialised();
    let err = config.initialise(Arc::new(fixture.registry.clone())).unwrap_err();
    assert!(matches!(
        err,
        SdkError::InvalidState {
            operation: "initialise",
            phase: RunPhase::Initialised
        }
    ));
    assert_eq!(fixture.registry.rows(Table::CodeRun).len(), 1);
}
