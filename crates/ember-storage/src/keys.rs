//! Storage key constants.

/// Storage keys for the persisted credential triad.
pub struct CredentialKeys;

impl CredentialKeys {
    /// Access token for authenticated requests
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token used to mint new access tokens
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Backend user id the tokens belong to
    pub const USER_ID: &'static str = "user_id";

    /// All credential keys, in write order.
    pub const ALL: [&'static str; 3] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::USER_ID,
    ];
}
