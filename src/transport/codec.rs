//! Length-prefixed packet framing.
//!
//! Each frame is a 4-byte big-endian length followed by the encoded packet.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Result, TransportError};
use crate::proto::Packet;

/// Largest frame accepted in either direction.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

/// Write one packet as a frame and flush.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = packet.encode_to_vec();
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(body.len()));
    }
    let len_bytes = (body.len() as u32).to_be_bytes();

    writer.write_all(&len_bytes).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it.
///
/// A clean EOF before or inside a frame is reported as [`TransportError::Closed`].
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(eof_is_closed)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(eof_is_closed)?;

    Ok(Packet::decode(buf.as_slice())?)
}

fn eof_is_closed(err: std::io::Error) -> TransportError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Arg;

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let packet = Packet::request("get_badge_count", vec![Arg::str("org.example.app")]);

        write_packet(&mut client, &packet).await.unwrap();
        let received = read_packet(&mut server).await.unwrap();

        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn test_eof_reports_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let result = read_packet(&mut server).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_truncated_frame_reports_closed() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&16u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0u8; 3]).await.unwrap();
        drop(client);

        let result = read_packet(&mut server).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32) + 1;
        client.write_all(&len.to_be_bytes()).await.unwrap();

        let result = read_packet(&mut server).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge(_))));
    }
}
