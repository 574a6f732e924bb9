//! Live connection table backed by the OS socket tables
use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;

use log::info;
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};

use crate::connection::RawConnection;
use crate::error::MonitorError;
use crate::sources::traits::ConnectionSource;

/// Reads TCP and UDP sockets for IPv4 and IPv6.
pub struct NetstatSource;

impl ConnectionSource for NetstatSource {
    fn name(&self) -> &str {
        "netstat"
    }

    fn enumerate(&self) -> Result<Vec<RawConnection>, MonitorError> {
        let af_flags = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
        let proto_flags = ProtocolFlags::TCP | ProtocolFlags::UDP;
        let sockets = get_sockets_info(af_flags, proto_flags).map_err(enumeration_failure)?;

        let mut rows = Vec::with_capacity(sockets.len());
        for socket in sockets {
            let (local, remote, status) = match socket.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) => (
                    SocketAddr::new(tcp.local_addr, tcp.local_port),
                    peer(SocketAddr::new(tcp.remote_addr, tcp.remote_port)),
                    tcp_status(&tcp.state),
                ),
                ProtocolSocketInfo::Udp(udp) => {
                    (SocketAddr::new(udp.local_addr, udp.local_port), None, "NONE")
                }
            };

            if socket.associated_pids.is_empty() {
                rows.push(RawConnection {
                    local,
                    remote,
                    status: status.to_string(),
                    pid: None,
                });
                continue;
            }

            for pid in socket.associated_pids {
                rows.push(RawConnection {
                    local,
                    remote,
                    status: status.to_string(),
                    pid: Some(pid),
                });
            }
        }

        info!("Enumerated {} connections", rows.len());
        Ok(rows)
    }
}

/// Listeners and unconnected sockets report `0.0.0.0:0` / `[::]:0` as their peer.
fn peer(addr: SocketAddr) -> Option<SocketAddr> {
    if addr.ip().is_unspecified() && addr.port() == 0 {
        None
    } else {
        Some(addr)
    }
}

#[allow(unreachable_patterns)]
fn tcp_status(state: &TcpState) -> &'static str {
    match state {
        TcpState::Established => "ESTABLISHED",
        TcpState::Listen => "LISTEN",
        TcpState::SynSent => "SYN_SENT",
        TcpState::SynReceived => "SYN_RECV",
        TcpState::FinWait1 => "FIN_WAIT1",
        TcpState::FinWait2 => "FIN_WAIT2",
        TcpState::TimeWait => "TIME_WAIT",
        TcpState::Closed => "CLOSE",
        TcpState::CloseWait => "CLOSE_WAIT",
        TcpState::LastAck => "LAST_ACK",
        TcpState::Closing => "CLOSING",
        TcpState::DeleteTcb => "DELETE_TCB",
        _ => "UNKNOWN",
    }
}

/// Map a backend failure onto the crate error, singling out privilege problems.
fn enumeration_failure<E>(err: E) -> MonitorError
where
    E: StdError + 'static,
{
    if is_permission_denied(&err) {
        MonitorError::PermissionDenied(err.to_string())
    } else {
        MonitorError::Enumeration(err.to_string())
    }
}

fn is_permission_denied(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::PermissionDenied {
                return true;
            }
        }
        let text = e.to_string().to_lowercase();
        if text.contains("permission denied") || text.contains("access is denied") {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("socket table unavailable")]
    struct Wrapped(#[source] io::Error);

    #[test]
    fn unspecified_peer_means_no_remote() {
        assert_eq!(peer("0.0.0.0:0".parse().unwrap()), None);
        assert_eq!(peer("[::]:0".parse().unwrap()), None);
        let real: SocketAddr = "9.9.9.9:51000".parse().unwrap();
        assert_eq!(peer(real), Some(real));
    }

    #[test]
    fn tcp_states_use_os_labels() {
        assert_eq!(tcp_status(&TcpState::Established), "ESTABLISHED");
        assert_eq!(tcp_status(&TcpState::Listen), "LISTEN");
        assert_eq!(tcp_status(&TcpState::CloseWait), "CLOSE_WAIT");
        assert_eq!(tcp_status(&TcpState::TimeWait), "TIME_WAIT");
    }

    #[test]
    fn permission_errors_are_recognised_through_the_source_chain() {
        let err = Wrapped(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(enumeration_failure(err), MonitorError::PermissionDenied(_)));

        let err = Wrapped(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(enumeration_failure(err), MonitorError::Enumeration(_)));
    }
}
