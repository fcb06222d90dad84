//! Pull-stream protocol: three one-shot request/response exchanges over
//! `libp2p::request_response` (`spec.md` §4.H, §6 protocol IDs). Grounded on
//! `examples/original_source/node/libp2p_sync.go`'s manual
//! `NewStream`/`SetStreamHandler` framing, expressed idiomatically through
//! `request_response::Behaviour` instead of hand-rolled stream reads.

use async_trait::async_trait;
use futures::{AsyncReadExt, AsyncWriteExt};
use libp2p::request_response;
use libp2p::StreamProtocol;
use serde::{Deserialize, Serialize};
use std::io;

/// One payload terminated by `\n`; the sender closes after writing
/// (`spec.md` GLOSSARY "Pull stream").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullPayload(pub Vec<u8>);

/// Builds the three protocol IDs named in `spec.md` §6:
/// `/<chain>/announce/1`, `/<chain>/blocks/1`, `/<chain>/pending-txs/1`.
pub fn protocol_ids(chain_id: &str) -> [StreamProtocol; 3] {
    [
        StreamProtocol::try_from_owned(format!("/{chain_id}/announce/1"))
            .expect("chain_id must be a valid libp2p protocol path segment"),
        StreamProtocol::try_from_owned(format!("/{chain_id}/blocks/1"))
            .expect("chain_id must be a valid libp2p protocol path segment"),
        StreamProtocol::try_from_owned(format!("/{chain_id}/pending-txs/1"))
            .expect("chain_id must be a valid libp2p protocol path segment"),
    ]
}

/// JSON-line codec for [`PullPayload`] exchanges: each side writes one
/// newline-terminated JSON document then closes its half of the stream.
#[derive(Clone, Default)]
pub struct PullCodec;

pub type PullBehaviour = request_response::Behaviour<PullCodec>;

#[async_trait]
impl request_response::Codec for PullCodec {
    type Protocol = StreamProtocol;
    type Request = PullPayload;
    type Response = PullPayload;

    async fn read_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Request>
    where
        T: futures::AsyncRead + Unpin + Send,
    {
        read_line_payload(io).await
    }

    async fn read_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> io::Result<Self::Response>
    where
        T: futures::AsyncRead + Unpin + Send,
    {
        read_line_payload(io).await
    }

    async fn write_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        req: Self::Request,
    ) -> io::Result<()>
    where
        T: futures::AsyncWrite + Unpin + Send,
    {
        write_line_payload(io, req).await
    }

    async fn write_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        res: Self::Response,
    ) -> io::Result<()>
    where
        T: futures::AsyncWrite + Unpin + Send,
    {
        write_line_payload(io, res).await
    }
}

async fn read_line_payload<T>(io: &mut T) -> io::Result<PullPayload>
where
    T: futures::AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    io.read_to_end(&mut buf).await?;
    while buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(PullPayload(buf))
}

async fn write_line_payload<T>(io: &mut T, payload: PullPayload) -> io::Result<()>
where
    T: futures::AsyncWrite + Unpin + Send,
{
    let mut bytes = payload.0;
    bytes.push(b'\n');
    io.write_all(&bytes).await?;
    io.close().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_ids_are_chain_scoped() {
        let ids = protocol_ids("obscura-main");
        assert_eq!(ids[0].as_ref(), "/obscura-main/announce/1");
        assert_eq!(ids[1].as_ref(), "/obscura-main/blocks/1");
        assert_eq!(ids[2].as_ref(), "/obscura-main/pending-txs/1");
    }
}
