// promwrite - bitdrift's prometheus remote write ingestion
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use anyhow::anyhow;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, lookup_host};

pub struct BoundTcpSocket {
  socket: TcpSocket,
}

impl BoundTcpSocket {
  #[must_use]
  pub const fn new(socket: TcpSocket) -> Self {
    Self { socket }
  }

  #[must_use]
  pub fn listen(self) -> TcpListener {
    // Socket is bound. listen() cannot reasonably fail.
    self
      .socket
      .listen(1024)
      .expect("socket is bound and ready to listen")
  }

  #[must_use]
  pub fn local_addr(&self) -> SocketAddr {
    self.socket.local_addr().expect("socket is bound")
  }
}

// Trait for resolving a name to a listener. Used for test injection of sockets bound to port 0.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BindResolver: Send + Sync {
  // Resolve the name and return a bound TCP socket, ready to listen(). Once bound, listen() cannot
  // reasonably fail under normal circumstances.
  async fn resolve_tcp(&self, name: &str) -> anyhow::Result<BoundTcpSocket>;
}

pub struct RealBindResolver {}

#[async_trait::async_trait]
impl BindResolver for RealBindResolver {
  async fn resolve_tcp(&self, name: &str) -> anyhow::Result<BoundTcpSocket> {
    make_reuse_port_tcp_socket(name).await
  }
}

pub async fn make_reuse_port_tcp_socket(name: &str) -> anyhow::Result<BoundTcpSocket> {
  let mut last_err = None;
  for addr in lookup_host(name).await? {
    let socket = match addr {
      SocketAddr::V4(_) => TcpSocket::new_v4()?,
      SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseport(true)?;
    match socket.bind(addr) {
      Ok(()) => return Ok(BoundTcpSocket::new(socket)),
      Err(e) => last_err = Some(e.into()),
    }
  }

  Err(last_err.unwrap_or_else(|| anyhow!("could not resolve to any address")))
}
