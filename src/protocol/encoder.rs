//! Кодировщик RESP2.

use super::frame::RespFrame;

pub struct RespEncoder;

impl RespEncoder {
    /// Кодирует запрос: массив bulk-строк.
    ///
    /// Длины считаются в байтах.
    pub fn encode_request<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
        let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
        let mut out = Vec::with_capacity(payload + 16);
        out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
        for arg in args {
            let arg = arg.as_ref();
            out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
            out.extend_from_slice(arg);
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    /// Кодирует произвольный фрейм.
    pub fn encode(frame: &RespFrame) -> Vec<u8> {
        let mut out = Vec::new();
        Self::encode_into(frame, &mut out);
        out
    }

    fn encode_into(
        frame: &RespFrame,
        out: &mut Vec<u8>,
    ) {
        match frame {
            RespFrame::Simple(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
            RespFrame::Error(e) => out.extend_from_slice(format!("-{e}\r\n").as_bytes()),
            RespFrame::Integer(i) => out.extend_from_slice(format!(":{i}\r\n").as_bytes()),
            RespFrame::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            RespFrame::Bulk(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            RespFrame::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            RespFrame::Array(Some(items)) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    Self::encode_into(item, out);
                }
            }
        }
    }
}
