//! Idle connection pool
//!
//! Amortises connection setup by keeping cleared sessions around. All
//! pooled connections share one immutable host configuration.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use reqwest::Client;

use dvfs_core::{VfsError, VfsResult};

use crate::config::{HostConfiguration, USER_AGENT};
use crate::connection::{Connection, CONNECT_TIMEOUT};

pub struct ConnectionPool {
    config: HostConfiguration,
    client: Client,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    pub fn new(config: HostConfiguration) -> VfsResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| VfsError::Io(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            idle: Mutex::new(Vec::new()),
        })
    }

    /// Borrows a connection; it returns to the pool when the guard drops.
    pub fn get(&self) -> PooledConnection<'_> {
        PooledConnection {
            connection: Some(self.take_idle()),
            pool: self,
        }
    }

    /// Takes ownership of a connection, e.g. for the lifetime of an open
    /// file. Hand it back with [`ConnectionPool::put_back`].
    pub fn get_raw(&self) -> Connection {
        self.take_idle()
    }

    /// Resets `connection` and stores it for reuse.
    pub fn put_back(&self, mut connection: Connection) {
        connection.clear();
        self.idle.lock().unwrap().push(connection);
    }

    fn take_idle(&self) -> Connection {
        self.idle
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Connection::new(self.client.clone(), self.config.clone()))
    }
}

/// Scope-bound connection handle
pub struct PooledConnection<'a> {
    connection: Option<Connection>,
    pool: &'a ConnectionPool,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // present from construction until drop
        self.connection.as_ref().unwrap()
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().unwrap()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.put_back(connection);
        }
    }
}
