//! Photo-hosting API client
//!
//! SOAP envelopes, the HTTP transport, login and access realm unlocking.

pub mod auth;
pub mod envelope;
pub mod keyring;
pub mod transport;

pub use auth::{Session, authenticate, compute_proof};
pub use keyring::{GalleryAccess, Keyring, load_gallery_access, unlock};
pub use transport::{ApiRequest, HttpTransport, Transport};
