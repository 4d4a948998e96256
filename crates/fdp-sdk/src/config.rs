use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use fdp_crypto::ContentHasher;
use fdp_registry::{RegistryClient, RegistryTransport};
use fdp_types::{validate_version, ContentDigest, RegistryObjectRef, Table};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Entity, SdkError, SdkResult};
use crate::finalise;
use crate::io_object::IoObject;
use crate::lookup::{fetch, field_ref, filters, first_component, require_first, text_field};
use crate::metadata::{ConfigTree, RegistryLocation, RunMetadata};
use crate::paths::{
    is_remote_root, mirror_path, repo_relative_path, resolve_location, storage_relative_path,
};

/// Storage root of every code repository a run points at.
pub const CODE_REPO_ROOT: &str = "https://github.com/";

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    /// Configuration parsed and checked; nothing sent to the registry.
    Validated,
    /// Code run registered; reads and writes may be linked.
    Initialised,
    /// Outputs registered and attached to the code run.
    Finalised,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validated => "validated",
            Self::Initialised => "initialised",
            Self::Finalised => "finalised",
        };
        f.write_str(name)
    }
}

/// Registry state established by `initialise`.
pub(crate) struct Session {
    pub(crate) client: RegistryClient,
    pub(crate) author: RegistryObjectRef,
    pub(crate) storage_root: RegistryObjectRef,
    /// `root` field of the data store's storage root as the registry holds it.
    pub(crate) storage_root_url: String,
    pub(crate) code_run: Value,
    pub(crate) code_run_ref: RegistryObjectRef,
}

/// One code run against a data registry.
///
/// ```text
/// validate ──► initialise ──► link_read / link_write ... ──► finalise
/// Validated    Initialised                                   Finalised
/// ```
///
/// Linking before `initialise`, or calling anything but the accessors after
/// `finalise`, fails with [`SdkError::InvalidState`].
pub struct Config {
    config_path: PathBuf,
    script_path: PathBuf,
    token: Option<String>,
    location: RegistryLocation,
    tree: ConfigTree,
    metadata: RunMetadata,
    phase: RunPhase,
    session: Option<Session>,
    reads: BTreeMap<String, IoObject>,
    writes: BTreeMap<String, IoObject>,
    inputs: BTreeMap<String, IoObject>,
    outputs: BTreeMap<String, IoObject>,
}

impl Config {
    /// Parse the run configuration and check every mandatory key. Makes no
    /// registry calls.
    pub fn validate(
        config_path: impl AsRef<Path>,
        script_path: impl AsRef<Path>,
        token: Option<String>,
        location: RegistryLocation,
    ) -> SdkResult<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let script_path = script_path.as_ref().to_path_buf();
        let tree = ConfigTree::load(&config_path)?;
        let metadata = tree.run_metadata(location)?;
        if !script_path.is_file() {
            return Err(SdkError::FileNotFound {
                name: "submission script".into(),
                path: script_path,
            });
        }
        debug!(config = %config_path.display(), ?location, "configuration validated");

        Ok(Self {
            config_path,
            script_path,
            token: token.filter(|t| !t.is_empty()),
            location,
            tree,
            metadata,
            phase: RunPhase::Validated,
            session: None,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        })
    }

    /// Register the run's provenance and create its `code_run` record.
    ///
    /// Each step feeds the next; the first failure aborts with its error.
    pub fn initialise(&mut self, transport: Arc<dyn RegistryTransport>) -> SdkResult<()> {
        self.require_phase("initialise", RunPhase::Validated)?;
        let meta = &self.metadata;
        let client = RegistryClient::new(&meta.registry_url, self.token.clone(), transport)?;

        let user = require_first(
            &client,
            Table::Users,
            &filters([("username", json!("admin"))]),
            Entity::User,
            "admin",
        )?;
        let user_ref = RegistryClient::entity_ref(&user)?;
        let link = require_first(
            &client,
            Table::UserAuthor,
            &filters([("user", json!(user_ref.uri()))]),
            Entity::Author,
            "no author linked to user admin; run the registry's init step first",
        )?;
        let author_ref = field_ref(&link, "author", Entity::Author)?;
        let author = RegistryClient::entity_ref(&fetch(&client, &author_ref, Entity::Author)?)?;
        debug!(author = %author, "resolved author");

        let store_root = format!(
            "{}/",
            meta.write_data_store.to_string_lossy().trim_end_matches('/')
        );
        let root = client.post_storage_root(&json!({
            "root": store_root,
            "local": self.location.is_local(),
        }))?;
        let storage_root = RegistryClient::entity_ref(&root)?;
        let storage_root_url = text_field(&root, "root", Entity::StorageRoot)?.to_string();

        let config_obj = register_file(
            &client,
            &self.config_path,
            &meta.write_data_store,
            &storage_root,
            &author,
            "yaml",
            "Working config.yaml file location in local datastore",
        )?;
        let script_ext = self
            .script_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt");
        let script_obj = register_file(
            &client,
            &self.script_path,
            &meta.write_data_store,
            &storage_root,
            &author,
            script_ext,
            "Submission script location in local datastore",
        )?;

        let repo_root = client.post_storage_root(&json!({
            "root": CODE_REPO_ROOT,
            "local": false,
        }))?;
        let repo_location = client.post(
            Table::StorageLocation,
            &json!({
                "path": repo_relative_path(&meta.remote_repo, CODE_REPO_ROOT),
                "hash": meta.latest_commit,
                "public": meta.public,
                "storage_root": RegistryClient::entity_ref(&repo_root)?.uri(),
            }),
        )?;
        let code_repo_obj = client.post(
            Table::Object,
            &json!({
                "description": "Analysis / processing script location",
                "storage_location": RegistryClient::entity_ref(&repo_location)?.uri(),
                "authors": [author.uri()],
            }),
        )?;

        let code_run = client.post(
            Table::CodeRun,
            &json!({
                "run_date": Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                "description": meta.description,
                "code_repo": RegistryClient::entity_ref(&code_repo_obj)?.uri(),
                "model_config": config_obj.uri(),
                "submission_script": script_obj.uri(),
                // The registry names the run's input and output URL lists `inputs` and `outputs`.
                "inputs": [],
                "outputs": [],
                "uuid": Uuid::now_v7().to_string(),
            }),
        )?;
        let code_run_ref = RegistryClient::entity_ref(&code_run)?;
        info!(code_run = %code_run_ref, "run initialised");

        self.session = Some(Session {
            client,
            author,
            storage_root,
            storage_root_url,
            code_run,
            code_run_ref,
        });
        self.phase = RunPhase::Initialised;
        Ok(())
    }

    // ---- Linking ----

    /// Path the caller should write `data_product` to.
    ///
    /// Nothing is registered until `finalise`. Linking the same name again
    /// returns the same path.
    pub fn link_write(&mut self, data_product: &str) -> SdkResult<PathBuf> {
        self.require_phase("link_write", RunPhase::Initialised)?;
        if let Some(existing) = self.writes.get(data_product) {
            return Ok(existing.resolved_path().to_path_buf());
        }

        let entry = self.tree.write_entry(data_product)?;
        let resolved = entry
            .use_block
            .resolve(data_product, &self.metadata.default_output_namespace);
        validate_version(&resolved.version)?;

        let dir = self
            .metadata
            .write_data_store
            .join(&resolved.namespace)
            .join(&resolved.data_product);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!(
            "dat-{}.{}",
            ContentHasher::random_token(),
            entry.file_type
        ));
        debug!(data_product, path = %path.display(), "linked write");

        let io = IoObject::for_write(
            data_product,
            resolved,
            path.clone(),
            entry.public.unwrap_or(self.metadata.public),
            entry.description,
            entry.file_type,
        );
        self.writes.insert(data_product.to_string(), io);
        Ok(path)
    }

    /// Local path of the registered file behind `data_product`.
    ///
    /// Files under a remote storage root are downloaded into the data store
    /// first. Linking the same name again returns the cached path.
    pub fn link_read(&mut self, data_product: &str) -> SdkResult<PathBuf> {
        self.require_phase("link_read", RunPhase::Initialised)?;
        if let Some(existing) = self.reads.get(data_product) {
            return Ok(existing.resolved_path().to_path_buf());
        }
        let session = self.session("link_read")?;
        let client = &session.client;

        let entry = self.tree.read_entry(data_product)?;
        let resolved = entry
            .use_block
            .resolve(data_product, &self.metadata.default_input_namespace);
        validate_version(&resolved.version)?;

        let namespace = require_first(
            client,
            Table::Namespace,
            &filters([("name", json!(resolved.namespace))]),
            Entity::Namespace,
            resolved.namespace.clone(),
        )?;
        let namespace_ref = RegistryClient::entity_ref(&namespace)?;
        let product = require_first(
            client,
            Table::DataProduct,
            &filters([
                ("name", json!(resolved.data_product)),
                ("version", json!(resolved.version)),
                ("namespace", json!(namespace_ref.uri())),
            ]),
            Entity::DataProduct,
            format!(
                "{}:{}@{}",
                resolved.namespace, resolved.data_product, resolved.version
            ),
        )?;
        let product_ref = RegistryClient::entity_ref(&product)?;

        let object = fetch(client, &field_ref(&product, "object", Entity::Object)?, Entity::Object)?;
        let component_ref = first_component(&object)?;
        let component = fetch(client, &component_ref, Entity::ObjectComponent)?;
        let location_ref = field_ref(&object, "storage_location", Entity::StorageLocation)?;
        let location = fetch(client, &location_ref, Entity::StorageLocation)?;
        let root_ref = field_ref(&location, "storage_root", Entity::StorageRoot)?;
        let root = fetch(client, &root_ref, Entity::StorageRoot)?;

        let location_path = text_field(&location, "path", Entity::StorageLocation)?;
        let root_url = text_field(&root, "root", Entity::StorageRoot)?;
        let source = resolve_location(root_url, location_path);
        let path = if is_remote_root(root_url) {
            let relative = mirror_path(location_path).ok_or_else(|| {
                SdkError::not_found(Entity::StorageLocation, format!("no file path in {source}"))
            })?;
            let local = self
                .metadata
                .write_data_store
                .join(&resolved.namespace)
                .join(&resolved.data_product)
                .join(&resolved.version)
                .join(relative);
            let expected = location
                .get("hash")
                .and_then(Value::as_str)
                .and_then(|h| ContentDigest::from_hex(h).ok());
            let current = match &expected {
                Some(digest) if local.is_file() => ContentHasher::verify_file(&local, digest)?,
                _ => false,
            };
            if current {
                debug!(path = %local.display(), "remote read already present");
            } else {
                if let Some(parent) = local.parent() {
                    fs::create_dir_all(parent)?;
                }
                client.download(&source, &local)?;
                info!(url = %source, path = %local.display(), "downloaded read");
                if let Some(digest) = &expected {
                    if !ContentHasher::verify_file(&local, digest)? {
                        warn!(url = %source, hash = %digest, "downloaded read does not match its registered hash");
                    }
                }
            }
            local
        } else {
            PathBuf::from(source)
        };

        let is_public = location
            .get("public")
            .and_then(Value::as_bool)
            .unwrap_or(self.metadata.public);
        debug!(data_product, path = %path.display(), "linked read");
        let io = IoObject::for_read(
            data_product,
            resolved,
            path.clone(),
            is_public,
            RegistryClient::entity_ref(&component)?,
            product_ref,
        );
        self.reads.insert(data_product.to_string(), io);
        Ok(path)
    }

    // ---- Finalise ----

    /// Register every linked write, record every read, and attach both to
    /// the code run.
    ///
    /// All write files are checked and hashed before the first registry
    /// call. A failure after that leaves the run initialised: writes already
    /// registered sit in `outputs`, the rest stay in `writes`.
    pub fn finalise(&mut self) -> SdkResult<()> {
        self.require_phase("finalise", RunPhase::Initialised)?;
        let digests = finalise::preflight(&self.writes)?;

        let session = self.session.as_ref().ok_or(SdkError::InvalidState {
            operation: "finalise",
            phase: self.phase,
        })?;
        for (name, digest) in digests {
            let Some(mut io) = self.writes.remove(&name) else {
                continue;
            };
            match finalise::register_output(session, &self.metadata, &mut io, &digest) {
                Ok(()) => {
                    self.outputs.insert(name, io);
                }
                Err(e) => {
                    self.writes.insert(name, io);
                    return Err(e);
                }
            }
        }
        for (name, io) in &self.reads {
            self.inputs.insert(name.clone(), io.clone());
        }

        let patched = finalise::patch_code_run(session, &self.inputs, &self.outputs)?;
        if let Some(session) = self.session.as_mut() {
            session.code_run = patched;
        }
        self.phase = RunPhase::Finalised;
        info!(
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "run finalised"
        );
        Ok(())
    }

    // ---- Accessors ----

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn location(&self) -> RegistryLocation {
        self.location
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// The parsed configuration file.
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// API root in use, once initialised.
    pub fn api_url(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.client.root())
    }

    /// The `code_run` record as last returned by the registry.
    pub fn code_run(&self) -> Option<&Value> {
        self.session.as_ref().map(|s| &s.code_run)
    }

    pub fn code_run_ref(&self) -> Option<&RegistryObjectRef> {
        self.session.as_ref().map(|s| &s.code_run_ref)
    }

    pub fn code_run_uuid(&self) -> Option<&str> {
        self.code_run()?.get("uuid")?.as_str()
    }

    pub fn reads(&self) -> &BTreeMap<String, IoObject> {
        &self.reads
    }

    /// Linked writes not yet registered.
    pub fn writes(&self) -> &BTreeMap<String, IoObject> {
        &self.writes
    }

    pub fn inputs(&self) -> &BTreeMap<String, IoObject> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, IoObject> {
        &self.outputs
    }

    fn require_phase(&self, operation: &'static str, expected: RunPhase) -> SdkResult<()> {
        if self.phase != expected {
            return Err(SdkError::InvalidState {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn session(&self, operation: &'static str) -> SdkResult<&Session> {
        self.session.as_ref().ok_or(SdkError::InvalidState {
            operation,
            phase: self.phase,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("config_path", &self.config_path)
            .field("location", &self.location)
            .field("phase", &self.phase)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

/// Record a local file as an `object` in the data store's storage root.
fn register_file(
    client: &RegistryClient,
    path: &Path,
    store: &Path,
    storage_root: &RegistryObjectRef,
    author: &RegistryObjectRef,
    extension: &str,
    description: &str,
) -> SdkResult<RegistryObjectRef> {
    let hash = ContentHasher::hash_file(path)?;
    let location = client.post(
        Table::StorageLocation,
        &json!({
            "path": storage_relative_path(path, store),
            "hash": hash.to_hex(),
            "public": true,
            "storage_root": storage_root.uri(),
        }),
    )?;
    let file_type = client.post(
        Table::FileType,
        &json!({"name": extension, "extension": extension}),
    )?;
    let object = client.post(
        Table::Object,
        &json!({
            "description": description,
            "storage_location": RegistryClient::entity_ref(&location)?.uri(),
            "authors": [author.uri()],
            "file_type": RegistryClient::entity_ref(&file_type)?.uri(),
        }),
    )?;
    let object = RegistryClient::entity_ref(&object)?;
    debug!(path = %path.display(), object = %object, "registered file");
    Ok(object)
}
