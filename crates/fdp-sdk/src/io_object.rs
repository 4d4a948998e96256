use std::path::{Path, PathBuf};

use fdp_types::RegistryObjectRef;
use serde::Serialize;

use crate::metadata::ResolvedUse;

/// One read or write binding of a run.
///
/// Everything except the two registry references is fixed when the binding
/// is linked. Reads get both references during resolution, writes during
/// finalise; each is set at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IoObject {
    logical_name: String,
    use_name: String,
    use_version: String,
    use_namespace: String,
    resolved_path: PathBuf,
    is_public: bool,
    description: Option<String>,
    file_type: Option<String>,
    component_ref: Option<RegistryObjectRef>,
    data_product_ref: Option<RegistryObjectRef>,
}

impl IoObject {
    /// A write binding: registry references are attached at finalise.
    pub(crate) fn for_write(
        logical_name: &str,
        resolved: ResolvedUse,
        path: PathBuf,
        is_public: bool,
        description: String,
        file_type: String,
    ) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            use_name: resolved.data_product,
            use_version: resolved.version,
            use_namespace: resolved.namespace,
            resolved_path: path,
            is_public,
            description: Some(description),
            file_type: Some(file_type),
            component_ref: None,
            data_product_ref: None,
        }
    }

    /// A fully resolved read binding.
    pub(crate) fn for_read(
        logical_name: &str,
        resolved: ResolvedUse,
        path: PathBuf,
        is_public: bool,
        component: RegistryObjectRef,
        data_product: RegistryObjectRef,
    ) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            use_name: resolved.data_product,
            use_version: resolved.version,
            use_namespace: resolved.namespace,
            resolved_path: path,
            is_public,
            description: None,
            file_type: None,
            component_ref: Some(component),
            data_product_ref: Some(data_product),
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Data product name registered for this binding.
    pub fn use_name(&self) -> &str {
        &self.use_name
    }

    pub fn use_version(&self) -> &str {
        &self.use_version
    }

    pub fn use_namespace(&self) -> &str {
        &self.use_namespace
    }

    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// File extension without the dot. Writes only.
    pub fn file_type(&self) -> Option<&str> {
        self.file_type.as_deref()
    }

    pub fn component_ref(&self) -> Option<&RegistryObjectRef> {
        self.component_ref.as_ref()
    }

    pub fn data_product_ref(&self) -> Option<&RegistryObjectRef> {
        self.data_product_ref.as_ref()
    }

    /// Attach the registry records a finalised write resolved to. Returns
    /// `false` and leaves the binding untouched if they were already set.
    pub(crate) fn attach(
        &mut self,
        component: RegistryObjectRef,
        data_product: RegistryObjectRef,
        path: PathBuf,
    ) -> bool {
        if self.component_ref.is_some() || self.data_product_ref.is_some() {
            return false;
        }
        self.component_ref = Some(component);
        self.data_product_ref = Some(data_product);
        self.resolved_path = path;
        true
    }
}
