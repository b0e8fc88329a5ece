//! Storage layout configuration.

/// Names of the storage namespaces used by a client.
///
/// Two clients configured with the same names over the same storage share
/// one queue and one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace holding the write queue log.
    pub queue_namespace: String,

    /// Prefix of the per-table mirror partitions.
    pub mirror_prefix: String,

    /// Namespace holding the last-online timestamp.
    pub connectivity_namespace: String,

    /// Namespace holding the sync pass lease.
    pub lease_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_namespace: "sync_queue".to_string(),
            mirror_prefix: "local_".to_string(),
            connectivity_namespace: "last_online".to_string(),
            lease_namespace: "sync_lease".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue namespace.
    #[must_use]
    pub fn queue_namespace(mut self, name: impl Into<String>) -> Self {
        self.queue_namespace = name.into();
        self
    }

    /// Sets the mirror partition prefix.
    #[must_use]
    pub fn mirror_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mirror_prefix = prefix.into();
        self
    }

    /// Sets the connectivity namespace.
    #[must_use]
    pub fn connectivity_namespace(mut self, name: impl Into<String>) -> Self {
        self.connectivity_namespace = name.into();
        self
    }

    /// Sets the lease namespace.
    #[must_use]
    pub fn lease_namespace(mut self, name: impl Into<String>) -> Self {
        self.lease_namespace = name.into();
        self
    }

    /// Returns the namespace of a table's mirror partition.
    #[must_use]
    pub fn mirror_namespace(&self, table: &str) -> String {
        format!("{}{}", self.mirror_prefix, table)
    }

    /// Returns the table name for a mirror namespace, if it is one.
    #[must_use]
    pub fn table_of<'a>(&self, namespace: &'a str) -> Option<&'a str> {
        namespace
            .strip_prefix(self.mirror_prefix.as_str())
            .filter(|table| !table.is_empty())
    }
}
