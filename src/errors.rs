use std::error::Error;
use std::io::{self, ErrorKind};

use http::StatusCode;

use crate::davpath::ParseError;
use crate::repo::RepoError;

pub(crate) type DavResult<T> = Result<T, DavError>;

#[derive(Debug)]
pub(crate) enum DavError {
    InvalidPath,
    IllegalPath,
    ForbiddenPath,
    UnknownDavMethod,
    Status(StatusCode),
    StatusClose(StatusCode),
    Message(StatusCode, String),
    Repo(RepoError),
    IoError(io::Error),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::Repo(e) => Some(e),
            DavError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for DavError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DavError::InvalidPath => write!(f, "invalid path"),
            DavError::IllegalPath => write!(f, "illegal path"),
            DavError::ForbiddenPath => write!(f, "forbidden path"),
            DavError::UnknownDavMethod => write!(f, "unknown method"),
            DavError::Status(s) | DavError::StatusClose(s) => write!(f, "{s}"),
            DavError::Message(_, m) => f.write_str(m),
            DavError::Repo(e) => write!(f, "{e}"),
            DavError::IoError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

pub(crate) fn repoerror_to_status(e: &RepoError) -> StatusCode {
    match e {
        RepoError::NotFound(_) => StatusCode::NOT_FOUND,
        RepoError::NotAllowed(_) => StatusCode::FORBIDDEN,
        RepoError::Conflict(_) => StatusCode::CONFLICT,
        RepoError::ResourceExists(_) => StatusCode::METHOD_NOT_ALLOWED,
        RepoError::Locked(_) => StatusCode::LOCKED,
        RepoError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        RepoError::GeneralFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ioerror_to_status(ioerror: &io::Error) -> StatusCode {
    match ioerror.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RepoError> for DavError {
    fn from(e: RepoError) -> Self {
        DavError::Repo(e)
    }
}

impl From<ParseError> for DavError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidPath => DavError::InvalidPath,
            ParseError::PrefixMismatch => DavError::ForbiddenPath,
            ParseError::IllegalPath => DavError::IllegalPath,
        }
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(e: StatusCode) -> Self {
        DavError::Status(e)
    }
}

impl DavError {
    pub(crate) fn statuscode(&self) -> StatusCode {
        match self {
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::IllegalPath => StatusCode::BAD_REQUEST,
            DavError::ForbiddenPath => StatusCode::NOT_FOUND,
            DavError::UnknownDavMethod => StatusCode::NOT_IMPLEMENTED,
            DavError::Status(e) | DavError::StatusClose(e) | DavError::Message(e, _) => *e,
            DavError::Repo(e) => repoerror_to_status(e),
            DavError::IoError(e) => ioerror_to_status(e),
        }
    }

    pub(crate) fn must_close(&self) -> bool {
        !matches!(
            self,
            &DavError::Status(_) | &DavError::Message(..) | &DavError::Repo(_)
        )
    }

    /// Text for the response body, if any.
    pub(crate) fn message(&self) -> Option<String> {
        match self {
            DavError::Message(_, m) if !m.is_empty() => Some(m.clone()),
            DavError::Repo(e) => Some(e.to_string()),
            _ => None,
        }
    }

    // shorthand used by the handlers.
    pub(crate) fn msg(status: StatusCode, m: impl Into<String>) -> DavError {
        DavError::Message(status, m.into())
    }
}
