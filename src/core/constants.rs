// Protocol constants for the PIMS History REST gateway

use serde::{Deserialize, Serialize};

/// Path of the History service below the server authority.
pub const HISTORY_PATH: &str = "/ProcessData/AtProcessDataREST.dll/History";

/// Data source sentinel meaning "search every source".
pub const DEFAULT_DATA_SOURCE: &str = "localhost";

/// Per-call row cap sent as `<X>`; windows with more samples need paging.
pub const MAX_ROWS_PER_CALL: u32 = 100_000;

// Field selector sent as `<F>`: the raw value.
pub const VALUE_FIELD: &str = "VAL";

/// Keys that replace `t`/`v` when the server has nothing for the window.
pub const ERROR_KEYS: [&str; 3] = ["er", "ec", "es"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// How the XML query travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    /// Query percent-encoded after `?`.
    #[default]
    Get,
    /// Raw XML as the request body.
    Post,
}
