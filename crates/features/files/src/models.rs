use fgate_derive::api_model;

/// Directory selector shared by listing and upload.
#[api_model]
#[derive(Default)]
#[cfg_attr(feature = "server", derive(utoipa::IntoParams), into_params(parameter_in = Query))]
pub struct PathQuery {
    /// Directory relative to the shared root. Empty for the root.
    #[serde(default)]
    pub path: String,
}

#[api_model]
#[cfg_attr(feature = "server", derive(utoipa::IntoParams), into_params(parameter_in = Query))]
pub struct DeleteQuery {
    /// Directory holding the entry.
    #[serde(default)]
    pub path: String,
    /// File or empty directory to delete.
    pub name: String,
}

#[api_model]
#[cfg_attr(feature = "server", derive(utoipa::IntoParams), into_params(parameter_in = Query))]
pub struct RenameQuery {
    /// Directory holding the entry.
    #[serde(default)]
    pub path: String,
    pub old_name: String,
    pub new_name: String,
}

#[api_model]
#[cfg_attr(feature = "server", derive(utoipa::IntoParams), into_params(parameter_in = Query))]
pub struct MkdirQuery {
    /// Parent directory, created when missing.
    #[serde(default)]
    pub path: String,
    pub name: String,
}

/// Multipart upload form. Only the `file` part is read.
#[api_model]
pub struct UploadForm {
    #[cfg_attr(feature = "server", schema(value_type = String, format = Binary))]
    pub file: Vec<u8>,
}

/// One directory child.
#[api_model]
#[derive(Clone, PartialEq)]
pub struct FileItem {
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes, `null` for directories.
    pub size: Option<u64>,
    /// Modification time in fractional Unix seconds.
    pub modified: f64,
}

#[api_model]
pub struct ListResponse {
    /// Normalized directory path.
    pub path: String,
    pub items: Vec<FileItem>,
}

#[api_model]
pub struct UploadResponse {
    /// Stored file name.
    pub uploaded: String,
    /// Normalized directory the file was stored in.
    pub path: String,
    pub size: u64,
}

#[api_model]
pub struct DeleteResponse {
    pub deleted: String,
}

#[api_model]
pub struct RenameResponse {
    pub from: String,
    pub to: String,
}

#[api_model]
pub struct MkdirResponse {
    pub folder: String,
    pub created_in: String,
}

/// Error body of every failed request.
#[api_model]
pub struct ErrorResponse {
    pub detail: String,
}
