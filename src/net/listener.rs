//! TCP listener binding.

use std::net::TcpListener;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind `addr` and prepare the socket for the async server.
///
/// Accepts anything `std::net::ToSocketAddrs` does, including `localhost:8080`.
pub fn bind(addr: &str) -> Result<TcpListener, ListenerError> {
    let wrap = |source| ListenerError::Bind {
        addr: addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(addr).map_err(wrap)?;
    listener.set_nonblocking(true).map_err(wrap)?;
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_ephemeral_port() {
        let listener = bind("127.0.0.1:0").unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn bind_error_names_address() {
        let err = bind("not-an-address").unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }
}
