//! Commit of linked writes: content addressing, deduplication and
//! registration of outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fdp_crypto::ContentHasher;
use fdp_registry::RegistryClient;
use fdp_types::{ContentDigest, Table};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Session;
use crate::error::{Entity, SdkError, SdkResult};
use crate::io_object::IoObject;
use crate::lookup::{fetch, field_ref, filters, first_component, text_field};
use crate::metadata::RunMetadata;
use crate::paths::{resolve_location, storage_relative_path};

/// Check every write was populated and hash it. Runs before any registry
/// call so a missing file leaves the registry untouched.
pub(crate) fn preflight(writes: &BTreeMap<String, IoObject>) -> SdkResult<Vec<(String, ContentDigest)>> {
    writes
        .iter()
        .map(|(name, io)| {
            let path = io.resolved_path();
            if !path.is_file() {
                return Err(SdkError::FileNotFound {
                    name: name.clone(),
                    path: path.to_path_buf(),
                });
            }
            Ok((name.clone(), ContentHasher::hash_file(path)?))
        })
        .collect()
}

/// Register one write and move it into the store under its content hash.
///
/// The scratch file is only moved or deleted once every registry call has
/// succeeded. A failure leaves it in place for a later attempt, which finds
/// the storage location registered here and places the file then.
pub(crate) fn register_output(
    session: &Session,
    meta: &RunMetadata,
    io: &mut IoObject,
    digest: &ContentDigest,
) -> SdkResult<()> {
    let client = &session.client;
    let hash = digest.to_hex();
    let extension = io.file_type().unwrap_or_default().to_string();
    let scratch = io.resolved_path().to_path_buf();

    let existing = client.query_first(
        Table::StorageLocation,
        &filters([
            ("hash", json!(hash)),
            ("storage_root", json!(session.storage_root.uri())),
            ("public", json!(io.is_public())),
        ]),
    )?;

    let (location, stored_path) = match existing {
        Some(location) => {
            let path = text_field(&location, "path", Entity::StorageLocation)?;
            let stored = PathBuf::from(resolve_location(&session.storage_root_url, path));
            debug!(name = io.logical_name(), hash = %digest.short_hex(), "content already registered");
            (location, stored)
        }
        None => {
            let stored = scratch.with_file_name(format!("{hash}.{extension}"));
            let location = client.post(
                Table::StorageLocation,
                &json!({
                    "path": storage_relative_path(&stored, &meta.write_data_store),
                    "hash": hash,
                    "public": io.is_public(),
                    "storage_root": session.storage_root.uri(),
                }),
            )?;
            (location, stored)
        }
    };
    let location_ref = RegistryClient::entity_ref(&location)?;

    let file_type = client.post(
        Table::FileType,
        &json!({"name": extension, "extension": extension}),
    )?;
    let namespace = client.post(Table::Namespace, &json!({"name": io.use_namespace()}))?;
    let namespace_ref = RegistryClient::entity_ref(&namespace)?;

    let product = client.query_first(
        Table::DataProduct,
        &filters([
            ("name", json!(io.use_name())),
            ("version", json!(io.use_version())),
            ("namespace", json!(namespace_ref.uri())),
        ]),
    )?;
    let (product, object) = match product {
        Some(product) => {
            warn!(
                data_product = io.use_name(),
                version = io.use_version(),
                "data product already registered, linking the existing one"
            );
            let object = fetch(client, &field_ref(&product, "object", Entity::Object)?, Entity::Object)?;
            (product, object)
        }
        None => {
            let object = client.post(
                Table::Object,
                &json!({
                    "description": io.description(),
                    "storage_location": location_ref.uri(),
                    "authors": [session.author.uri()],
                    "file_type": RegistryClient::entity_ref(&file_type)?.uri(),
                }),
            )?;
            let product = client.post(
                Table::DataProduct,
                &json!({
                    "name": io.use_name(),
                    "version": io.use_version(),
                    "namespace": namespace_ref.uri(),
                    "object": RegistryClient::entity_ref(&object)?.uri(),
                }),
            )?;
            (product, object)
        }
    };

    let component = fetch(client, &first_component(&object)?, Entity::ObjectComponent)?;
    let component_ref = RegistryClient::entity_ref(&component)?;
    let product_ref = RegistryClient::entity_ref(&product)?;

    place_file(&scratch, &stored_path)?;
    info!(
        data_product = io.use_name(),
        version = io.use_version(),
        component = %component_ref,
        "registered output"
    );
    io.attach(component_ref, product_ref, stored_path);
    Ok(())
}

/// Put the scratch file at its content-addressed path. If identical content
/// is already there the scratch copy is dropped.
fn place_file(scratch: &Path, stored: &Path) -> SdkResult<()> {
    if stored.is_file() {
        fs::remove_file(scratch)?;
        debug!(path = %stored.display(), "content already stored, scratch file removed");
    } else {
        if let Some(parent) = stored.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(scratch, stored)?;
        debug!(path = %stored.display(), "stored new content");
    }
    Ok(())
}

/// Attach input and output components to the code run.
pub(crate) fn patch_code_run(
    session: &Session,
    inputs: &BTreeMap<String, IoObject>,
    outputs: &BTreeMap<String, IoObject>,
) -> SdkResult<Value> {
    let components = |items: &BTreeMap<String, IoObject>| -> Vec<String> {
        items
            .values()
            .filter_map(|io| io.component_ref())
            .map(|r| r.uri().to_string())
            .collect()
    };
    let payload = json!({
        "inputs": components(inputs),
        "outputs": components(outputs),
    });
    Ok(session.client.patch(&session.code_run_ref, &payload)?)
}
