//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦。
//! 线上格式是以 `\n` 结尾的 UTF-8 文本行。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, MAX_LINE_LEN};

/// 网络配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl NetworkConfig {
    /// `host:port` 形式的地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// 连接抽象 trait（核心抽象，用于业务层）
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送一行
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// 接收一行（不含行尾）
    async fn recv_line(&mut self) -> Result<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        debug!("已连接到 {}", addr);
        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: LineReader<OwnedReadHalf>,
    writer: LineWriter<OwnedWriteHalf>,
}

impl TcpConnection {
    /// 从 TcpStream 创建（服务端使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: LineReader::new(read_half),
            writer: LineWriter::new(write_half),
        })
    }

    /// 分离读写端
    pub fn split(self) -> (LineReader<OwnedReadHalf>, LineWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_line(line).await
    }

    async fn recv_line(&mut self) -> Result<String> {
        self.reader.read_line().await
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

impl TcpListener {
    /// 接受连接并返回对端地址
    pub async fn accept_with_addr(&mut self) -> Result<(TcpConnection, std::net::SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        Ok((TcpConnection::from_stream(stream)?, addr))
    }
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (conn, _addr) = self.accept_with_addr().await?;
        Ok(conn)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 行编解码
// ============================================================================

/// 行读取器
pub struct LineReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    /// 创建新的行读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::with_capacity(256),
        }
    }

    /// 读取一行，去掉行尾的 `\n` 和 `\r`
    ///
    /// 超长行会被完整读掉再报 `LineTooLong`，连接仍可继续使用。
    pub async fn read_line(&mut self) -> Result<String> {
        self.buffer.clear();
        let mut oversized = 0usize;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                // 对端关闭：不完整的最后一行直接丢弃
                return Err(ProtocolError::ConnectionClosed);
            }

            let (chunk, found) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..i], Some(i)),
                None => (available, None),
            };

            if oversized == 0 && self.buffer.len() + chunk.len() <= MAX_LINE_LEN {
                self.buffer.extend_from_slice(chunk);
            } else {
                oversized = oversized.max(self.buffer.len()) + chunk.len();
                self.buffer.clear();
            }

            let consumed = found.map_or(chunk.len(), |i| i + 1);
            self.reader.consume(consumed);

            if found.is_some() {
                break;
            }
        }

        if oversized > 0 {
            trace!("丢弃超长行: {} 字节", oversized);
            return Err(ProtocolError::LineTooLong {
                size: oversized,
                max: MAX_LINE_LEN,
            });
        }

        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }

        String::from_utf8(std::mem::take(&mut self.buffer))
            .map_err(|_| ProtocolError::InvalidEncoding)
    }
}

/// 行写入器
pub struct LineWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    /// 创建新的行写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 写入一行并立即 flush
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 发送可显示的消息（write_line 的别名）
    pub async fn send<M: std::fmt::Display>(&mut self, msg: &M) -> Result<()> {
        self.write_line(&msg.to_string()).await
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
