/// Defaults and fixed names shared across the crate

/// Placeholder replaced by the backup timestamp in command templates
pub const DATE_PLACEHOLDER: &str = "$date";

/// chrono format of artifact timestamps (DD-MM-YYYY-hh:mm)
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y-%H:%M";

/// Extension of artifact files (the runtime hands out tar archives)
pub const ARTIFACT_EXTENSION: &str = "tar";

/// Suffix of artifacts still being written
pub const PARTIAL_SUFFIX: &str = "part";

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_BACKUP_ROOT: &str = "backups";
pub const DEFAULT_DUMP_DIR: &str = "/data/dump";
pub const DEFAULT_EXEC_TIMEOUT: &str = "1h";

/// Status shown for a database without a matching container
pub const STATUS_DOWN: &str = "Down";

/// Identity service used to look up JWT signing keys
pub const DEFAULT_AUTH_URL: &str = "https://sms.gitwork.ru/auth";
pub const AUTH_COOKIE: &str = "user_jwt";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const STATIC_DIR: &str = "static";
