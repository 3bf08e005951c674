//! Portal OAuth and REST addressing constants

/// Token endpoint for the refresh-token grant. Shared by every portal; the
/// client id/secret identify the local application.
pub const TOKEN_ENDPOINT: &str = "https://oauth.bitrix.info/oauth/token/";

/// Path segment between the portal base URL and the dotted method name.
pub const REST_PATH: &str = "rest";

/// Query parameter carrying the access token. The platform does not accept
/// header-based bearer auth.
pub const AUTH_QUERY_PARAM: &str = "auth";
