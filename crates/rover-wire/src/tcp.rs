//! 行分隔 TCP 后端
//!
//! 小车固件在本地网络上开一个 TCP 文本口：出站命令一行一条，
//! 入站遥测/状态一行一条。这里用 `std::net::TcpStream` 的读超时
//! 实现 [`WireChannel`] 的接收窗口语义。

use crate::{WireChannel, WireConnector, WireError, validate_endpoint};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;
use tracing::{debug, trace};

/// 默认拨号超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP 拨号器
///
/// endpoint 形如 `tcp://192.168.4.1:8266`。
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// 自定义拨号超时
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn parse(endpoint: &str) -> Result<&str, WireError> {
        validate_endpoint(endpoint)?;
        match endpoint.split_once("://") {
            Some(("tcp", addr)) => Ok(addr),
            Some((scheme, _)) => Err(WireError::InvalidEndpoint(format!(
                "unsupported scheme {scheme:?} (expected tcp)"
            ))),
            None => unreachable!("validate_endpoint guarantees a scheme separator"),
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WireConnector for TcpConnector {
    fn open(&mut self, endpoint: &str) -> Result<Box<dyn WireChannel + Send>, WireError> {
        let addr = Self::parse(endpoint)?;

        // connect_timeout 需要已解析的 SocketAddr；解析失败视作拨号失败
        // （主机名暂时解析不出来是瞬态的，交给重连循环）
        let sock_addr = addr
            .to_socket_addrs()
            .map_err(|e| WireError::ConnectFailed(format!("resolve {addr}: {e}")))?
            .next()
            .ok_or_else(|| WireError::ConnectFailed(format!("no address for {addr}")))?;

        let stream = TcpStream::connect_timeout(&sock_addr, self.connect_timeout)
            .map_err(|e| WireError::ConnectFailed(format!("connect {addr}: {e}")))?;
        stream.set_nodelay(true).map_err(WireError::Io)?;

        debug!("TCP channel established: {}", addr);
        Ok(Box::new(TcpLineChannel::new(stream)?))
    }
}

/// 已建立的行分隔 TCP 通道
pub struct TcpLineChannel {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    /// 跨 receive 调用保留的半行缓冲
    ///
    /// 读超时可能打断一行的中途，`read_line` 已读进缓冲的前半截
    /// 必须留到下一次调用继续拼，否则会丢数据。
    pending: String,
    receive_timeout: Duration,
}

impl TcpLineChannel {
    pub fn new(stream: TcpStream) -> Result<Self, WireError> {
        let reader = BufReader::new(stream.try_clone().map_err(WireError::Io)?);
        Ok(Self {
            writer: stream,
            reader,
            pending: String::new(),
            receive_timeout: Duration::from_millis(20),
        })
    }
}

impl WireChannel for TcpLineChannel {
    fn send(&mut self, message: &str) -> Result<(), WireError> {
        self.writer.write_all(message.as_bytes()).map_err(WireError::Io)?;
        self.writer.write_all(b"\n").map_err(WireError::Io)?;
        self.writer.flush().map_err(WireError::Io)?;
        trace!("TX: {}", message);
        Ok(())
    }

    fn receive(&mut self) -> Result<String, WireError> {
        // set_read_timeout(None) 表示阻塞；Duration::ZERO 不合法，
        // 用 1ms 作为"立即探测"的下限
        let timeout = self.receive_timeout.max(Duration::from_millis(1));
        self.reader
            .get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(WireError::Io)?;

        match self.reader.read_line(&mut self.pending) {
            Ok(0) => Err(WireError::Closed),
            Ok(_) => {
                let line = std::mem::take(&mut self.pending);
                Ok(line.trim_end_matches(['\r', '\n']).to_string())
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                // 半行数据留在 pending 里，下次继续
                Err(WireError::Timeout)
            },
            Err(e) => Err(WireError::Io(e)),
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_parse_endpoint() {
        assert!(TcpConnector::parse("tcp://127.0.0.1:9000").is_ok());
        assert!(TcpConnector::parse("udp://127.0.0.1:9000").is_err());
        assert!(TcpConnector::parse("127.0.0.1:9000").is_err());
    }

    #[test]
    fn test_send_and_receive_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            peer.write_all(b"hello rover\n").unwrap();
            let mut reader = BufReader::new(peer.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            line
        });

        let mut connector = TcpConnector::new();
        let mut channel = connector.open(&format!("tcp://{addr}")).unwrap();
        channel.set_receive_timeout(Duration::from_secs(2));

        assert_eq!(channel.receive().unwrap(), "hello rover");
        channel.send("forward").unwrap();

        assert_eq!(server.join().unwrap(), "forward\n");
    }

    #[test]
    fn test_receive_timeout_when_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _guard = thread::spawn(move || listener.accept());

        let mut connector = TcpConnector::new();
        let mut channel = connector.open(&format!("tcp://{addr}")).unwrap();
        channel.set_receive_timeout(Duration::from_millis(20));

        assert!(matches!(channel.receive(), Err(WireError::Timeout)));
    }

    #[test]
    fn test_receive_closed_on_peer_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (peer, _) = listener.accept().unwrap();
            drop(peer); // 立即关闭
        });

        let mut connector = TcpConnector::new();
        let mut channel = connector.open(&format!("tcp://{addr}")).unwrap();
        channel.set_receive_timeout(Duration::from_secs(1));
        server.join().unwrap();

        assert!(matches!(channel.receive(), Err(WireError::Closed)));
    }

    #[test]
    fn test_connect_refused_is_transient() {
        // 端口未监听：应得到 ConnectFailed 而不是 InvalidEndpoint
        let mut connector = TcpConnector::new().with_connect_timeout(Duration::from_millis(200));
        match connector.open("tcp://127.0.0.1:1") {
            Err(WireError::ConnectFailed(_)) => {},
            other => panic!("Expected ConnectFailed, got {:?}", other.map(|_| "channel")),
        }
    }
}
