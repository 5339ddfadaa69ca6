//! Access realm unlocking
//!
//! Password-protected galleries belong to an access realm. Unlocking a realm
//! folds its key into an opaque keyring string that the service returns and
//! expects back on later calls. The keyring only grows during a run.

use std::fmt;
use tracing::debug;

use crate::api::auth::Session;
use crate::api::envelope;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::Result;

const GALLERY_METHOD: &str = "LoadPhotoSet";
const ADD_KEY_METHOD: &str = "KeyringAddKeyPlain";

/// Opaque accumulated access keys; empty until a realm is unlocked
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Keyring(String);

impl Keyring {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyring({} bytes)", self.0.len())
    }
}

/// Access details of a gallery
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GalleryAccess {
    /// Zero when the gallery is not protected
    pub realm_id: i64,
    /// Title as reported by the gallery itself
    pub title: Option<String>,
}

impl GalleryAccess {
    pub fn is_restricted(&self) -> bool {
        self.realm_id != 0
    }
}

/// Load a gallery's access realm
///
/// Never fails: any error reads as an unprotected gallery.
pub async fn load_gallery_access(transport: &dyn Transport, session: &Session, gallery_id: i64) -> GalleryAccess {
    match try_load_gallery_access(transport, session, gallery_id).await {
        Ok(access) => access,
        Err(e) => {
            debug!(gallery_id, error = %e, "Gallery details unavailable, assuming no realm");
            GalleryAccess::default()
        }
    }
}

async fn try_load_gallery_access(
    transport: &dyn Transport,
    session: &Session,
    gallery_id: i64,
) -> Result<GalleryAccess> {
    let request = ApiRequest::new(GALLERY_METHOD)
        .field("photoSetId", gallery_id)
        .field("level", "Full")
        .field("includePhotos", "false")
        .with_session(session);
    let body = transport.call(&request).await?;

    let doc = envelope::parse(GALLERY_METHOD, &body)?;
    let gallery = envelope::require(&doc, GALLERY_METHOD, "LoadPhotoSetResult")?;
    let realm_id = envelope::child(gallery, "AccessDescriptor")
        .and_then(|access| envelope::child_id(access, "RealmId"))
        .unwrap_or(0);

    Ok(GalleryAccess {
        realm_id,
        title: envelope::child_text(gallery, "Title").map(str::to_string),
    })
}

/// Add a realm's key to the keyring
///
/// Returns the service's updated keyring, or `keyring` unchanged on any failure.
pub async fn unlock(
    transport: &dyn Transport,
    session: &Session,
    keyring: &Keyring,
    realm_id: i64,
    password: &str,
) -> Keyring {
    let request = ApiRequest::new(ADD_KEY_METHOD)
        .field("keyring", keyring.as_str())
        .field("realmId", realm_id)
        .field("password", password)
        .with_session(session);

    // Failures are silent and keep the input keyring.
    let updated = transport.call(&request).await.ok().and_then(|body| {
        let doc = envelope::parse(ADD_KEY_METHOD, &body).ok()?;
        envelope::find(&doc, "KeyringAddKeyPlainResult")
            .and_then(envelope::text)
            .map(Keyring::new)
    });

    match updated {
        Some(updated) => {
            debug!(realm_id, "Realm unlocked");
            updated
        }
        None => keyring.clone(),
    }
}
