//! HMS Core - Request, Query and Entity Types
//!
//! Data structures shared by the cache and the client, plus the
//! [`Transport`] seam. No I/O here.

pub mod entities;
pub mod error;
pub mod query;
pub mod request;
pub mod tag;
pub mod transport;

pub use entities::*;
pub use error::{HmsResult, HttpFailure, UNAUTHORIZED};
pub use query::{canonical_args, Mutation, QueryDescriptor, QueryKey};
pub use request::{
    ApiRequest, CredentialMode, FormPart, Method, RequestBody, LOGIN_PATH, LOGOUT_PATH,
    REFRESH_PATH,
};
pub use tag::{tags, EntityTag, TagSet};
pub use transport::Transport;
