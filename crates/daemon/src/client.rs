//! Client side: build and send a signed request datagram.

use std::io;
use std::net::SocketAddr;

use protocol::{current_timestamp, random_nonce, Authenticator};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info};

/// Resolve `host:port` to the first matching socket address.
pub async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {}:{}", host, port),
        )
    })
}

/// Sign `command` with the current time and a fresh nonce, and send it to
/// `target`. Returns the datagram that was sent.
///
/// Delivery is not confirmed: the server never replies.
pub async fn send_command(
    authenticator: &Authenticator,
    target: SocketAddr,
    command: &str,
    args: &[String],
) -> io::Result<String> {
    let nonce = random_nonce();
    let datagram = authenticator.encode_signed(current_timestamp(), &nonce, command, args);

    let local: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    let sent = socket.send_to(datagram.as_bytes(), target).await?;
    debug!("sent {} bytes to {}", sent, target);

    info!("sent {} to {} (nonce {})", command, target, nonce);
    Ok(datagram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Request, SharedSecret};

    fn authenticator() -> Authenticator {
        Authenticator::new(SharedSecret::new("s3cr3t").unwrap(), 60).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve("127.0.0.1", 9097).await.unwrap();
        assert_eq!(addr, "127.0.0.1:9097".parse().unwrap());
    }

    #[tokio::test]
    async fn test_send_command_delivers_verifiable_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();
        let auth = authenticator();

        let sent = send_command(&auth, target, "test", &["hello".to_string()])
            .await
            .unwrap();

        let mut buf = [0u8; 2048];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], sent.as_bytes());

        let request = Request::parse(&buf[..len]).unwrap();
        assert_eq!(request.command, "test");
        assert_eq!(request.args, vec!["hello"]);
        assert!(auth.verify(&request, current_timestamp()).is_ok());
    }

    #[tokio::test]
    async fn test_each_send_uses_new_nonce() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();
        let auth = authenticator();

        let first = send_command(&auth, target, "suspend", &[]).await.unwrap();
        let second = send_command(&auth, target, "suspend", &[]).await.unwrap();

        let first = Request::parse(first.as_bytes()).unwrap();
        let second = Request::parse(second.as_bytes()).unwrap();
        assert_ne!(first.nonce, second.nonce);
    }
}
