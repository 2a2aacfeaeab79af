//! Push device registration for the Ember app.
//!
//! Keeps the backend-side device-token registration consistent with local
//! authentication state: [`DeviceRegistrationCoordinator`] observes the
//! session coordinator's state stream, caches the platform-issued token
//! across logout/login cycles, and serializes registration attempts so the
//! backend never sees duplicates.

mod registration;
mod transport;

pub use registration::DeviceRegistrationCoordinator;
pub use transport::{NotificationError, NotificationTransport, RestNotificationTransport};
