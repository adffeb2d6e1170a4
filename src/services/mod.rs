pub mod artifact_store;
pub mod compression;
pub mod key_scheme;
pub mod object_store;
pub mod validator;
