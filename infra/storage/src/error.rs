use std::borrow::Cow;

/// Failures of the scoped filesystem gateway.
///
/// `message` fields hold client-relative paths or offsets only; absolute locations go into
/// `context` and are meant for logs.
#[fgate_derive::fgate_error]
pub enum StorageError {
    /// The path would resolve outside the storage root.
    #[error("Path escapes the storage root{}: {message}", format_context(.context))]
    PathEscape { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A child name is not a single plain path segment.
    #[error("Invalid name{}: {message}", format_context(.context))]
    InvalidName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Not a directory{}: {message}", format_context(.context))]
    NotADirectory { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Directory not empty{}: {message}", format_context(.context))]
    DirectoryNotEmpty { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The target is occupied by an entry of the wrong kind, or by any entry for renames.
    #[error("Conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The requested range lies outside a file of `size` bytes.
    #[error("Range not satisfiable for {size} bytes{}: {message}", format_context(.context))]
    RangeNotSatisfiable { message: Cow<'static, str>, size: u64, context: Option<Cow<'static, str>> },

    #[error("Malformed range{}: {message}", format_context(.context))]
    MalformedRange { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Filesystem I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}
