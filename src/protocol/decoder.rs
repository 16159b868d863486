//! Инкрементальный декодер RESP2.
//!
//! Декодер не хранит промежуточного состояния: `decode` либо находит
//! полный фрейм в начале буфера и сообщает, сколько байт занято, либо
//! возвращает `Ok(None)`, и вызывающий дочитывает данные и повторяет.

use std::io::Cursor;

use bytes::{Buf, Bytes};
use dump_error::ClientError;
use tracing::trace;

use super::frame::RespFrame;

/// Максимальная длина строки статуса, числа или длины (64 KiB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;
/// Максимальный размер bulk-строки (512 MiB, как на сервере).
pub const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;
/// Максимальная вложенность массивов.
pub const MAX_ARRAY_DEPTH: usize = 32;

type Parsed<T> = Result<Option<T>, ClientError>;

pub struct RespDecoder;

impl RespDecoder {
    /// Декодирует один фрейм из начала `buf`.
    ///
    /// Возвращает фрейм и число прочитанных байт либо `Ok(None)`, если
    /// фрейм в `buf` ещё не целиком.
    pub fn decode(buf: &[u8]) -> Parsed<(RespFrame, usize)> {
        let mut cursor = Cursor::new(buf);
        match parse_frame(&mut cursor, 0)? {
            Some(frame) => {
                let consumed = cursor.position() as usize;
                trace!(consumed, kind = frame.kind(), "decoded frame");
                Ok(Some((frame, consumed)))
            }
            None => Ok(None),
        }
    }

    /// Разбирает клиентский запрос (массив bulk-строк) обратно в сырые
    /// аргументы. Нужен для проверки RESP-дампов.
    pub fn decode_request(buf: &[u8]) -> Parsed<(Vec<Bytes>, usize)> {
        let Some((frame, consumed)) = Self::decode(buf)? else {
            return Ok(None);
        };

        let kind = frame.kind();
        let RespFrame::Array(Some(items)) = frame else {
            return Err(protocol_error(format!(
                "expected request array, got {kind}"
            )));
        };

        let mut args = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespFrame::Bulk(Some(bytes)) => args.push(Bytes::from(bytes)),
                other => {
                    return Err(protocol_error(format!(
                        "expected bulk string argument, got {}",
                        other.kind()
                    )))
                }
            }
        }

        Ok(Some((args, consumed)))
    }
}

fn parse_frame(
    buf: &mut Cursor<&[u8]>,
    depth: usize,
) -> Parsed<RespFrame> {
    if !buf.has_remaining() {
        return Ok(None);
    }

    match buf.get_u8() {
        b'+' => Ok(read_text_line(buf)?.map(RespFrame::Simple)),
        b'-' => Ok(read_text_line(buf)?.map(RespFrame::Error)),
        b':' => {
            let Some(line) = read_text_line(buf)? else {
                return Ok(None);
            };
            let n = line
                .parse::<i64>()
                .map_err(|_| protocol_error(format!("invalid integer '{line}'")))?;
            Ok(Some(RespFrame::Integer(n)))
        }
        b'$' => parse_bulk(buf),
        b'*' => parse_array(buf, depth),
        other => Err(protocol_error(format!(
            "unknown RESP type byte 0x{other:02x} at byte {}",
            buf.position() - 1
        ))),
    }
}

fn parse_bulk(buf: &mut Cursor<&[u8]>) -> Parsed<RespFrame> {
    let Some(len) = read_length(buf)? else {
        return Ok(None);
    };

    match len {
        -1 => Ok(Some(RespFrame::Bulk(None))),
        len if len >= 0 => {
            let len = len as usize;
            if len > MAX_BULK_LENGTH {
                return Err(protocol_error(format!(
                    "bulk string too long ({len} > {MAX_BULK_LENGTH})"
                )));
            }

            // Данные и завершающий CRLF.
            if buf.remaining() < len + 2 {
                return Ok(None);
            }

            let data = buf.chunk()[..len].to_vec();
            buf.advance(len);

            if buf.get_u8() != b'\r' || buf.get_u8() != b'\n' {
                return Err(protocol_error(format!(
                    "missing CRLF after bulk string at byte {}",
                    buf.position()
                )));
            }

            Ok(Some(RespFrame::Bulk(Some(data))))
        }
        _ => Err(protocol_error(format!("negative bulk length {len}"))),
    }
}

fn parse_array(
    buf: &mut Cursor<&[u8]>,
    depth: usize,
) -> Parsed<RespFrame> {
    if depth >= MAX_ARRAY_DEPTH {
        return Err(protocol_error(format!(
            "max array depth exceeded ({MAX_ARRAY_DEPTH})"
        )));
    }

    let Some(len) = read_length(buf)? else {
        return Ok(None);
    };

    match len {
        -1 => Ok(Some(RespFrame::Array(None))),
        len if len >= 0 => {
            // Ёмкость не больше того, что может поместиться в буфер.
            let mut items = Vec::with_capacity((len as usize).min(buf.remaining()));
            for _ in 0..len {
                match parse_frame(buf, depth + 1)? {
                    Some(frame) => items.push(frame),
                    None => return Ok(None),
                }
            }
            Ok(Some(RespFrame::Array(Some(items))))
        }
        _ => Err(protocol_error(format!("negative array length {len}"))),
    }
}

fn read_length(buf: &mut Cursor<&[u8]>) -> Parsed<i64> {
    let Some(line) = read_text_line(buf)? else {
        return Ok(None);
    };
    line.parse::<i64>()
        .map(Some)
        .map_err(|_| protocol_error(format!("invalid length '{line}'")))
}

/// Читает до ближайшего CRLF и возвращает строку без него.
fn read_text_line(buf: &mut Cursor<&[u8]>) -> Parsed<String> {
    let chunk = buf.chunk();

    let Some(end) = chunk.windows(2).position(|w| w == b"\r\n") else {
        if chunk.len() > MAX_LINE_LENGTH {
            return Err(protocol_error(format!(
                "line too long (max {MAX_LINE_LENGTH} bytes)"
            )));
        }
        return Ok(None);
    };

    let line = String::from_utf8(chunk[..end].to_vec()).map_err(|_| {
        protocol_error(format!("invalid UTF-8 in line at byte {}", buf.position()))
    })?;
    buf.advance(end + 2);
    Ok(Some(line))
}

fn protocol_error(reason: String) -> ClientError {
    ClientError::Protocol { reason }
}
