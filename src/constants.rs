// src/constants.rs

pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_TIMEOUT_SEC: u64 = 90;

pub const ANONYMOUS_USER: &str = "anonymous";
pub const ANONYMOUS_PASSWORD: &str = "";

pub const OPTION_TIMEOUT_SEC: &str = "timeout_sec";
pub const OPTION_AUTOSEEK: &str = "autoseek";

pub const DEFAULT_CONFIG_PATH: &str = "/etc/rouilleftpc.conf";
