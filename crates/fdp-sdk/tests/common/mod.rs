//! Shared fixture: a temp data store, a config file, a submission script and
//! an in-memory registry seeded the way the registry's init step leaves it.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fdp_sdk::{Config, InMemoryRegistry, RegistryLocation, RegistryObjectRef, RegistryTransport, Table};
use serde_json::json;
use tempfile::TempDir;

pub const ROOT: &str = "http://localhost:8000/api/";
pub const COMMIT: &str = "221bfe8b52bbfb3b2dbdc23037b7dd94b49aaa70";
pub const REPO: &str = "https://github.com/FAIRDataPipeline/rustDataPipeline";

pub struct Fixture {
    pub dir: TempDir,
    pub store: PathBuf,
    pub config_path: PathBuf,
    pub script_path: PathBuf,
    pub registry: InMemoryRegistry,
}

/// `run_metadata` block pointing at `store`.
pub fn run_metadata(store: &Path) -> String {
    format!(
        "run_metadata:
  description: Test run
  local_data_registry_url: {ROOT}
  remote_data_registry_url: https://data.scrc.uk/api/
  default_input_namespace: SCRC
  default_output_namespace: PSU
  write_data_store: {}
  latest_commit: {COMMIT}
  remote_repo: {REPO}
",
        store.display()
    )
}

impl Fixture {
    /// `sections` is appended after `run_metadata` (`write:` / `read:` lists).
    pub fn new(sections: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        fs::create_dir_all(&store).unwrap();
        let config_path = dir.path().join("config.yaml");
        fs::write(&config_path, format!("{}{sections}", run_metadata(&store))).unwrap();
        let script_path = dir.path().join("script.sh");
        fs::write(&script_path, "#!/bin/sh\necho run\n").unwrap();
        Self {
            dir,
            store,
            config_path,
            script_path,
            registry: InMemoryRegistry::with_admin(ROOT, "Interface Test"),
        }
    }

    pub fn validate(&self) -> Config {
        self.validate_with_token(None)
    }

    pub fn validate_with_token(&self, token: Option<&str>) -> Config {
        Config::validate(
            &self.config_path,
            &self.script_path,
            token.map(str::to_string),
            RegistryLocation::Local,
        )
        .unwrap()
    }

    pub fn initialised(&self) -> Config {
        self.initialised_with(Arc::new(self.registry.clone()))
    }

    /// Initialise against `transport` instead of the bare registry.
    pub fn initialised_with(&self, transport: Arc<dyn RegistryTransport>) -> Config {
        let mut config = self.validate();
        config.initialise(transport).unwrap();
        config
    }

    pub fn namespace(&self, name: &str) -> RegistryObjectRef {
        self.registry.insert(Table::Namespace, json!({"name": name}))
    }

    pub fn storage_root(&self, root: &str) -> RegistryObjectRef {
        self.registry.insert(Table::StorageRoot, json!({"root": root, "local": root.starts_with("file://")}))
    }

    /// A local storage root under the fixture's temp dir.
    pub fn local_root(&self) -> (RegistryObjectRef, PathBuf) {
        let dir = self.dir.path().join("registry-files");
        fs::create_dir_all(&dir).unwrap();
        let root = self.storage_root(&format!("file://{}/", dir.display()));
        (root, dir)
    }

    /// Register a data product whose file is `path` under `root`.
    pub fn data_product(
        &self,
        namespace: &RegistryObjectRef,
        name: &str,
        version: &str,
        root: &RegistryObjectRef,
        path: &str,
    ) -> RegistryObjectRef {
        self.data_product_with_hash(namespace, name, version, root, path, "0000")
    }

    /// As `data_product`, with the storage location carrying `hash`.
    pub fn data_product_with_hash(
        &self,
        namespace: &RegistryObjectRef,
        name: &str,
        version: &str,
        root: &RegistryObjectRef,
        path: &str,
        hash: &str,
    ) -> RegistryObjectRef {
        let location = self.registry.insert(
            Table::StorageLocation,
            json!({"path": path, "hash": hash, "public": true, "storage_root": root.uri()}),
        );
        let object = self.registry.insert(
            Table::Object,
            json!({"description": name, "storage_location": location.uri()}),
        );
        self.registry.insert(
            Table::DataProduct,
            json!({
                "name": name,
                "version": version,
                "namespace": namespace.uri(),
                "object": object.uri(),
            }),
        )
    }

    /// Files (not directories) directly inside `dir`.
    pub fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }
}
