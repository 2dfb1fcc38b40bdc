/// Application name
pub const APP_NAME: &str = "tracklink";

/// Header carrying the authenticated chat user id (set by the fronting proxy)
pub const HEADER_USER_ID: &str = "Mattermost-User-ID";

/// Query parameter naming the destination channel of a webhook callback
pub const CHANNEL_ID_PARAM: &str = "channelID";

/// Path the issue tracker calls back on
pub const NOTIFICATION_PATH: &str = "/notification";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Azure DevOps REST API versions per endpoint family
pub const PROJECTS_API_VERSION: &str = "7.0";
pub const HOOKS_API_VERSION: &str = "6.0";
pub const WORK_ITEMS_API_VERSION: &str = "7.1";

/// Service hook subscription constants
pub const HOOKS_PUBLISHER_ID: &str = "tfs";
pub const HOOKS_CONSUMER_ID: &str = "webHooks";
pub const HOOKS_CONSUMER_ACTION_ID: &str = "httpRequest";
pub const HOOKS_RESOURCE_VERSION: &str = "1.0";

/// Chat platform ids are 26 lowercase alphanumerics
pub const CHAT_ID_LENGTH: usize = 26;

/// Channel type code of public channels
pub const CHANNEL_TYPE_OPEN: &str = "O";

/// Default timeout for calls to the issue tracker and chat platform, in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
