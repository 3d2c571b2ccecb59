use crate::error::FilesError;
use crate::models::{
    DeleteQuery, DeleteResponse, ErrorResponse, FileItem, ListResponse, MkdirQuery, MkdirResponse,
    PathQuery, RenameQuery, RenameResponse, UploadForm, UploadResponse,
};
use crate::response::{Disposition, file_response};
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use fgate_derive::api_handler;
use fgate_domain::constants::{FILES_TAG, UPLOAD_FIELD};
use fgate_kernel::server::ApiState;
use fgate_storage::{FileEntry, Storage, StorageError};
use std::time::UNIX_EPOCH;
use tracing::info;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// File API routes. Authentication is applied by the caller.
pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(list_handler, delete_handler))
        .routes(routes!(download_handler))
        .routes(routes!(stream_handler))
        .routes(routes!(upload_handler))
        .routes(routes!(rename_handler))
        .routes(routes!(mkdir_handler))
}

#[api_handler(
    get,
    path = "/files",
    params(PathQuery),
    responses(
        (status = OK, description = "Directory listing, directories first", body = ListResponse),
        (status = BAD_REQUEST, description = "Path escapes the shared root", body = ErrorResponse),
        (status = NOT_FOUND, description = "Directory does not exist", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn list_handler(
    State(storage): State<Storage>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListResponse>, FilesError> {
    let dir = storage.resolve(&query.path)?;
    let items = storage.list(&query.path).await?.into_iter().map(FileItem::from).collect();

    Ok(Json(ListResponse { path: dir.relative().to_owned(), items }))
}

#[api_handler(
    get,
    path = "/files/{*path}",
    params(
        ("path" = String, Path, description = "File path relative to the shared root"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. `bytes=0-1023`"),
    ),
    responses(
        (status = OK, description = "Whole file as an attachment"),
        (status = PARTIAL_CONTENT, description = "Requested byte range"),
        (status = NOT_FOUND, description = "File does not exist", body = ErrorResponse),
        (status = RANGE_NOT_SATISFIABLE, description = "Range outside the file", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn download_handler(
    State(storage): State<Storage>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FilesError> {
    read(&storage, &path, &headers, Disposition::Attachment).await
}

#[api_handler(
    get,
    path = "/stream/{*path}",
    params(
        ("path" = String, Path, description = "File path relative to the shared root"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. `bytes=0-1023`"),
    ),
    responses(
        (status = OK, description = "Whole file for inline playback"),
        (status = PARTIAL_CONTENT, description = "Requested byte range"),
        (status = NOT_FOUND, description = "File does not exist", body = ErrorResponse),
        (status = RANGE_NOT_SATISFIABLE, description = "Range outside the file", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn stream_handler(
    State(storage): State<Storage>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FilesError> {
    read(&storage, &path, &headers, Disposition::Inline).await
}

async fn read(
    storage: &Storage,
    path: &str,
    headers: &HeaderMap,
    disposition: Disposition,
) -> Result<Response, FilesError> {
    let range = match headers.get(header::RANGE) {
        Some(value) => Some(value.to_str().map_err(|_| StorageError::MalformedRange {
            message: "non-ASCII Range header".into(),
            context: None,
        })?),
        None => None,
    };

    let read = storage.open(path, range).await?;
    Ok(file_response(read, disposition))
}

#[api_handler(
    post,
    path = "/upload",
    params(PathQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = CREATED, description = "File stored", body = UploadResponse),
        (status = BAD_REQUEST, description = "Missing file field or invalid name", body = ErrorResponse),
        (status = CONFLICT, description = "A directory occupies the target", body = ErrorResponse),
        (status = PAYLOAD_TOO_LARGE, description = "Body exceeds the upload limit", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn upload_handler(
    State(storage): State<Storage>,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), FilesError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_owned) else {
            return Err(FilesError::BadRequest {
                message: "upload field carries no file name".into(),
                context: None,
            });
        };

        let uploaded = storage.upload_stream(&query.path, &filename, field).await?;
        info!(path = %uploaded.path.relative(), size = uploaded.size, "File uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                uploaded: filename,
                path: uploaded.path.parent_relative().to_owned(),
                size: uploaded.size,
            }),
        ));
    }

    Err(FilesError::BadRequest {
        message: format!("multipart body has no '{UPLOAD_FIELD}' field").into(),
        context: None,
    })
}

#[api_handler(
    delete,
    path = "/files",
    params(DeleteQuery),
    responses(
        (status = OK, description = "Entry deleted", body = DeleteResponse),
        (status = NOT_FOUND, description = "Entry does not exist", body = ErrorResponse),
        (status = CONFLICT, description = "Directory is not empty", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn delete_handler(
    State(storage): State<Storage>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, FilesError> {
    let deleted = storage.delete(&query.path, &query.name).await?;
    info!(path = %deleted.relative(), "Entry deleted");

    Ok(Json(DeleteResponse { deleted: query.name }))
}

#[api_handler(
    put,
    path = "/rename",
    params(RenameQuery),
    responses(
        (status = OK, description = "Entry renamed", body = RenameResponse),
        (status = NOT_FOUND, description = "Source does not exist", body = ErrorResponse),
        (status = CONFLICT, description = "Destination already exists", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn rename_handler(
    State(storage): State<Storage>,
    Query(query): Query<RenameQuery>,
) -> Result<Json<RenameResponse>, FilesError> {
    let renamed = storage.rename(&query.path, &query.old_name, &query.new_name).await?;
    info!(from = %renamed.from.relative(), to = %renamed.to.relative(), "Entry renamed");

    Ok(Json(RenameResponse { from: query.old_name, to: query.new_name }))
}

#[api_handler(
    post,
    path = "/mkdir",
    params(MkdirQuery),
    responses(
        (status = CREATED, description = "Directory created", body = MkdirResponse),
        (status = OK, description = "Directory already existed", body = MkdirResponse),
        (status = CONFLICT, description = "A file occupies the path", body = ErrorResponse),
    ),
    tag = FILES_TAG,
)]
async fn mkdir_handler(
    State(storage): State<Storage>,
    Query(query): Query<MkdirQuery>,
) -> Result<impl IntoResponse, FilesError> {
    let outcome = storage.mkdir(&query.path, &query.name).await?;
    let status = if outcome.is_created() {
        info!(path = %outcome.path().relative(), "Directory created");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(MkdirResponse {
            folder: query.name,
            created_in: outcome.path().parent_relative().to_owned(),
        }),
    ))
}

impl From<FileEntry> for FileItem {
    fn from(entry: FileEntry) -> Self {
        Self {
            name: entry.name,
            is_dir: entry.is_dir,
            size: entry.size,
            modified: entry.modified.duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_secs_f64()),
        }
    }
}
