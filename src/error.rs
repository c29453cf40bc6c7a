use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store {store} unavailable: {source}")]
    StoreUnavailable {
        store: String,
        #[source]
        source: Box<Error>,
    },

    #[error("unknown synchronization method: {0}")]
    UnsupportedMethod(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("table {table}: {source}")]
    Table {
        table: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{operation} failed for tables: {}", tables.join(", "))]
    TablesFailed {
        operation: String,
        tables: Vec<String>,
    },

    #[error("external tool {tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Scope an error to the table it occurred on.
    pub fn for_table(table: impl Into<String>, err: Error) -> Self {
        match err {
            Error::Table { .. } | Error::Cancelled => err,
            other => Error::Table {
                table: table.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn store_unavailable(store: impl Into<String>, err: Error) -> Self {
        Error::StoreUnavailable {
            store: store.into(),
            source: Box::new(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
