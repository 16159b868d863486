use std::time::Duration;

use bytes::{Buf, BytesMut};
use dump_error::{ClientError, DumpResult, ResultExt};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};
use tracing::{debug, trace};

use crate::protocol::{RespDecoder, RespEncoder, RespFrame};

/// Предел для накопленных, ещё не декодированных байт ответа.
const MAX_PENDING_REPLY: usize = 600 * 1024 * 1024;

/// TCP-соединение с протоколом RESP2.
///
/// Запросы пишутся массивами bulk-строк, ответы декодируются по мере
/// поступления; байты после конца ответа остаются в буфере до следующего
/// вызова.
pub struct RespConnection {
    /// Адрес сервера в том виде, в каком он передан в `connect`
    addr: String,
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    /// Принятые байты, ещё не разобранные в ответ
    read_buf: BytesMut,
    read_timeout: Duration,
    write_timeout: Duration,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl RespConnection {
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> DumpResult<Self> {
        debug!("Connecting to {addr}");

        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectionTimeout {
                address: addr.to_string(),
            })?
            .map_err(|e| ClientError::ConnectionFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;
        debug!("Connection established with {addr}");

        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            addr: addr.to_string(),
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            read_buf: BytesMut::with_capacity(8192),
            read_timeout,
            write_timeout,
        })
    }

    /// Пишет один запрос и сбрасывает буфер.
    pub async fn send<A: AsRef<[u8]>>(
        &mut self,
        args: &[A],
    ) -> DumpResult<()> {
        let encoded = RespEncoder::encode_request(args);
        trace!(bytes = encoded.len(), "sending request");

        timeout(self.write_timeout, self.writer.write_all(&encoded))
            .await
            .map_err(|_| ClientError::WriteTimeout)??;
        timeout(self.write_timeout, self.writer.flush())
            .await
            .map_err(|_| ClientError::WriteTimeout)??;

        Ok(())
    }

    /// Читает ровно один фрейм ответа.
    pub async fn receive(&mut self) -> DumpResult<RespFrame> {
        loop {
            if !self.read_buf.is_empty() {
                if let Some((frame, consumed)) = RespDecoder::decode(&self.read_buf)? {
                    self.read_buf.advance(consumed);
                    trace!(kind = frame.kind(), "reply received");
                    return Ok(frame);
                }
            }

            if self.read_buf.len() > MAX_PENDING_REPLY {
                return Err(ClientError::Protocol {
                    reason: format!("reply exceeds {MAX_PENDING_REPLY} bytes"),
                }
                .into());
            }

            let n = timeout(self.read_timeout, self.reader.read_buf(&mut self.read_buf))
                .await
                .map_err(|_| ClientError::ReadTimeout)??;

            if n == 0 {
                return Err(ClientError::ConnectionClosed.into());
            }
        }
    }

    /// Отправляет запрос и ждёт ответ.
    pub async fn execute<A: AsRef<[u8]>>(
        &mut self,
        args: &[A],
    ) -> DumpResult<RespFrame> {
        self.send(args).await.context("Failed to send request")?;
        self.receive().await.context("Failed to receive reply")
    }

    pub fn server_addr(&self) -> &str {
        &self.addr
    }

    pub async fn close(mut self) -> DumpResult<()> {
        debug!("Closing connection to {}", self.addr);
        self.writer
            .shutdown()
            .await
            .context("Failed to shutdown connection")?;
        Ok(())
    }
}
