//! Listening socket: bound from the settings or handed over by the service
//! manager through socket activation.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::{cli::Cli, prelude::*};

/// First descriptor passed by socket activation.
#[cfg(unix)]
const LISTEN_FDS_START: std::os::fd::RawFd = 3;

/// Use the inherited socket when there is one, otherwise bind
/// `bind:port`.
pub async fn bind(cli: &Cli) -> Result<TcpListener> {
    let listen_fds = std::env::var("LISTEN_FDS").ok();
    let listen_pid = std::env::var("LISTEN_PID").ok();
    let inherited = inherited_sockets(
        listen_fds.as_deref(),
        listen_pid.as_deref(),
        std::process::id(),
    )?;
    if let Some(count) = inherited {
        if count > 1 {
            warn!("{count} sockets inherited, only the first one is used");
        }
        let listener = adopt_inherited()?;
        info!("Using inherited socket {}", listener.local_addr()?);
        return Ok(listener);
    }

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Number of sockets passed to this process, if any are meant for it.
fn inherited_sockets(
    listen_fds: Option<&str>,
    listen_pid: Option<&str>,
    own_pid: u32,
) -> Result<Option<u32>> {
    let Some(listen_fds) = listen_fds else {
        return Ok(None);
    };
    match listen_pid.map(str::parse::<u32>) {
        Some(Ok(pid)) if pid == own_pid => {}
        _ => {
            debug!("LISTEN_FDS is set for another process, ignoring it");
            return Ok(None);
        }
    }
    let Ok(count) = listen_fds.trim().parse::<u32>() else {
        return Err(Error::InheritedSocket(format!("LISTEN_FDS={listen_fds}")));
    };
    Ok((count > 0).then_some(count))
}

#[cfg(unix)]
fn adopt_inherited() -> Result<TcpListener> {
    use std::os::fd::FromRawFd;

    // SAFETY: socket activation hands descriptor 3 to this process as an
    // open listening socket and nothing else in the process owns it.
    let listener = unsafe { std::net::TcpListener::from_raw_fd(LISTEN_FDS_START) };
    listener.set_nonblocking(true)?;
    Ok(TcpListener::from_std(listener)?)
}

#[cfg(not(unix))]
fn adopt_inherited() -> Result<TcpListener> {
    Err(Error::InheritedSocket(
        "socket activation is only supported on unix".to_string(),
    ))
}
