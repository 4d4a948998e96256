//! Registration of outputs and the code run patch.

mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::Fixture;
use fdp_registry::{Method, RegistryError, RegistryRequest, RegistryResponse, RegistryResult};
use fdp_sdk::{ContentHasher, InMemoryRegistry, RegistryTransport, RunPhase, SdkError, Table};
use serde_json::json;

const SECTIONS: &str = "write:
  - data_product: test/csv
    description: a test file
    file_type: csv
  - data_product: test/copy
    description: same bytes as test/csv
    file_type: csv
  - data_product: test/private
    description: not public
    file_type: txt
    public: false
read:
  - data_product: input/csv
";

#[test]
fn written_file_becomes_a_registered_data_product() {
    let fixture = Fixture::new(SECTIONS);
    let registry = &fixture.registry;
    let mut config = fixture.initialised();

    let scratch = config.link_write("test/csv").unwrap();
    fs::write(&scratch, "Test").unwrap();
    config.finalise().unwrap();
    assert_eq!(config.phase(), RunPhase::Finalised);

    let hash = ContentHasher::hash_string("Test").to_hex();
    let dir = fixture.store.join("PSU/test/csv");
    let stored = dir.join(format!("{hash}.csv"));
    assert!(!scratch.exists());
    assert_eq!(Fixture::files_in(&dir), vec![stored.clone()]);
    assert_eq!(fs::read_to_string(&stored).unwrap(), "Test");

    let locations = registry.find(Table::StorageLocation, "hash", &json!(hash));
    assert_eq!(locations.len(), 1);
    let location = &locations[0];
    assert_eq!(location["path"], format!("PSU/test/csv/{hash}.csv"));
    assert_eq!(location["public"], true);
    assert_eq!(location["storage_root"], registry.rows(Table::StorageRoot)[0]["url"]);

    let products = registry.rows(Table::DataProduct);
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product["name"], "test/csv");
    assert_eq!(product["version"], "0.0.1");
    let namespace = &registry.find(Table::Namespace, "name", &json!("PSU"))[0];
    assert_eq!(product["namespace"], namespace["url"]);

    let object = registry
        .rows(Table::Object)
        .into_iter()
        .find(|o| o["url"] == product["object"])
        .unwrap();
    assert_eq!(object["storage_location"], location["url"]);
    assert_eq!(object["description"], "a test file");
    let csv = &registry.find(Table::FileType, "extension", &json!("csv"))[0];
    assert_eq!(object["file_type"], csv["url"]);

    let output = &config.outputs()["test/csv"];
    let component = output.component_ref().unwrap();
    assert_eq!(output.resolved_path(), stored.as_path());
    assert_eq!(output.data_product_ref().unwrap().uri(), product["url"]);
    assert_eq!(object["components"], json!([component.uri()]));
    assert!(config.writes().is_empty());

    assert_eq!(config.code_run().unwrap()["outputs"], json!([component.uri()]));
    assert_eq!(config.code_run().unwrap()["inputs"], json!([]));
    let row = registry.entity(config.code_run_ref().unwrap()).unwrap();
    assert_eq!(row["outputs"], json!([component.uri()]));
}

#[test]
fn identical_content_is_stored_once() {
    let fixture = Fixture::new(SECTIONS);
    let mut config = fixture.initialised();
    let first = config.link_write("test/csv").unwrap();
    let second = config.link_write("test/copy").unwrap();
    fs::write(&first, "same bytes").unwrap();
    fs::write(&second, "same bytes").unwrap();
    config.finalise().unwrap();

    let hash = ContentHasher::hash_string("same bytes").to_hex();
    let locations = fixture
        .registry
        .find(Table::StorageLocation, "hash", &json!(hash));
    assert_eq!(locations.len(), 1);

    // Writes are committed in name order, so `test/copy` stores the bytes.
    let stored = fixture.store.join(format!("PSU/test/copy/{hash}.csv"));
    assert_eq!(Fixture::files_in(&fixture.store.join("PSU/test/copy")), vec![stored.clone()]);
    assert!(Fixture::files_in(&fixture.store.join("PSU/test/csv")).is_empty());

    let outputs = config.outputs();
    assert_eq!(outputs["test/csv"].resolved_path(), stored.as_path());
    assert_eq!(outputs["test/copy"].resolved_path(), stored.as_path());
    assert_ne!(outputs["test/csv"].component_ref(), outputs["test/copy"].component_ref());
    assert_eq!(fixture.registry.rows(Table::DataProduct).len(), 2);
    assert_eq!(
        config.code_run().unwrap()["outputs"].as_array().map(Vec::len),
        Some(2)
    );
}

#[test]
fn public_flag_is_part_of_the_location() {
    let fixture = Fixture::new(SECTIONS);
    let mut config = fixture.initialised();
    let path = config.link_write("test/private").unwrap();
    fs::write(&path, "hidden").unwrap();
    config.finalise().unwrap();

    let hash = ContentHasher::hash_string("hidden").to_hex();
    let location = &fixture
        .registry
        .find(Table::StorageLocation, "hash", &json!(hash))[0];
    assert_eq!(location["public"], false);
    assert!(!config.outputs()["test/private"].is_public());
}

#[test]
fn unwritten_output_fails_before_any_registry_call() {
    let fixture = Fixture::new(SECTIONS);
    let mut config = fixture.initialised();
    let written = config.link_write("test/csv").unwrap();
    let missing = config.link_write("test/copy").unwrap();
    fs::write(&written, "Test").unwrap();

    let before = fixture.registry.request_count();
    match config.finalise().unwrap_err() {
        SdkError::FileNotFound { name, path } => {
            assert_eq!(name, "test/copy");
            assert_eq!(path, missing);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(fixture.registry.request_count(), before);
    assert_eq!(config.phase(), RunPhase::Initialised);
    assert!(written.exists());
    assert_eq!(config.writes().len(), 2);

    fs::write(&missing, "late").unwrap();
    config.finalise().unwrap();
    assert_eq!(config.outputs().len(), 2);
}

/// Drops the first data product POST on the floor, as a registry that went
/// away mid-run would.
struct DropFirstProductPost {
    inner: InMemoryRegistry,
    dropped: AtomicBool,
}

impl RegistryTransport for DropFirstProductPost {
    fn send(&self, request: &RegistryRequest) -> RegistryResult<RegistryResponse> {
        if request.method == Method::Post
            && request.url.ends_with("/data_product/")
            && !self.dropped.swap(true, Ordering::SeqCst)
        {
            return Err(RegistryError::Unreachable {
                url: request.url.clone(),
                reason: "connection reset".into(),
            });
        }
        self.inner.send(request)
    }

    fn download(&self, url: &str, dest: &Path) -> RegistryResult<()> {
        self.inner.download(url, dest)
    }
}

#[test]
fn registry_failure_keeps_the_write_for_a_retry() {
    let fixture = Fixture::new(SECTIONS);
    let registry = &fixture.registry;
    let mut config = fixture.initialised_with(Arc::new(DropFirstProductPost {
        inner: registry.clone(),
        dropped: AtomicBool::new(false),
    }));
    let scratch = config.link_write("test/csv").unwrap();
    fs::write(&scratch, "Test").unwrap();

    assert!(matches!(
        config.finalise().unwrap_err(),
        SdkError::Registry(RegistryError::Unreachable { .. })
    ));
    assert_eq!(config.phase(), RunPhase::Initialised);
    assert!(scratch.is_file());
    assert_eq!(config.writes()["test/csv"].resolved_path(), scratch.as_path());
    assert!(config.outputs().is_empty());
    assert!(registry.rows(Table::DataProduct).is_empty());

    config.finalise().unwrap();
    assert_eq!(config.phase(), RunPhase::Finalised);
    let hash = ContentHasher::hash_string("Test").to_hex();
    let stored = fixture.store.join(format!("PSU/test/csv/{hash}.csv"));
    assert!(!scratch.exists());
    assert_eq!(fs::read_to_string(&stored).unwrap(), "Test");
    assert_eq!(config.outputs()["test/csv"].resolved_path(), stored.as_path());
    assert_eq!(registry.find(Table::StorageLocation, "hash", &json!(hash)).len(), 1);
    assert_eq!(registry.rows(Table::DataProduct).len(), 1);
}

#[test]
fn existing_data_product_is_linked_not_duplicated() {
    let fixture = Fixture::new(SECTIONS);
    let psu = fixture.namespace("PSU");
    let (root, _) = fixture.local_root();
    let existing = fixture.data_product(&psu, "test/csv", "0.0.1", &root, "old.csv");

    let mut config = fixture.initialised();
    let path = config.link_write("test/csv").unwrap();
    fs::write(&path, "new bytes").unwrap();
    config.finalise().unwrap();

    assert_eq!(fixture.registry.rows(Table::DataProduct).len(), 1);
    assert_eq!(fixture.registry.rows(Table::Namespace).len(), 1);
    let output = &config.outputs()["test/csv"];
    assert_eq!(output.data_product_ref(), Some(&existing));
    let object = fixture.registry.entity(&existing).unwrap()["object"].clone();
    let component = fixture
        .registry
        .find(Table::ObjectComponent, "object", &object)
        .remove(0);
    assert_eq!(output.component_ref().unwrap().uri(), component["url"]);
}

#[test]
fn reads_become_code_run_inputs() {
    let fixture = Fixture::new(SECTIONS);
    let scrc = fixture.namespace("SCRC");
    let (root, _) = fixture.local_root();
    fixture.data_product(&scrc, "input/csv", "0.0.1", &root, "in.csv");

    let mut config = fixture.initialised();
    config.link_read("input/csv").unwrap();
    let out = config.link_write("test/csv").unwrap();
    fs::write(&out, "result").unwrap();
    config.finalise().unwrap();

    let input = &config.inputs()["input/csv"];
    let uri = input.component_ref().unwrap().uri().to_string();
    assert_eq!(config.code_run().unwrap()["inputs"], json!([uri]));
    assert_eq!(config.reads().len(), 1);
    assert_eq!(config.outputs().len(), 1);
}

#[test]
fn empty_run_finalises() {
    let fixture = Fixture::new(SECTIONS);
    let mut config = fixture.initialised();
    config.finalise().unwrap();
    assert_eq!(config.phase(), RunPhase::Finalised);
    assert_eq!(config.code_run().unwrap()["outputs"], json!([]));
}

#[test]
fn finalised_run_rejects_further_calls() {
    let fixture = Fixture::new(SECTIONS);
    let mut config = fixture.initialised();
    config.finalise().unwrap();
    let runs = fixture.registry.rows(Table::CodeRun).len();

    for err in [
        config.finalise().unwrap_err(),
        config.link_write("test/csv").unwrap_err(),
        config.link_read("input/csv").unwrap_err(),
    ] {
        assert!(matches!(
            err,
            SdkError::InvalidState {
                phase: RunPhase::Finalised,
                ..
            }
        ));
    }
    assert_eq!(fixture.registry.rows(Table::CodeRun).len(), runs);
}
