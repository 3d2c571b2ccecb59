use fgate_derive::fgate_error;
use std::borrow::Cow;

#[fgate_error]
pub enum UploadError {
    #[error("I/O failure{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {
    let err = UploadError::Conflict { message: "a.txt".into(), context: None };
    assert_eq!(err.kind(), "conflict");
}
