use ario_gateway_primitives::{ByteRegion, Id, RequestAttributes, SourceName};
use bytes::Bytes;
use futures_util::stream::BoxStream;

pub type DataStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

#[derive(Debug, Clone)]
pub struct GetDataRequest {
    pub id: Id,
    pub region: Option<ByteRegion>,
    pub request_attributes: RequestAttributes,
}

impl GetDataRequest {
    #[must_use]
    pub fn whole(id: Id) -> Self {
        Self {
            id,
            region: None,
            request_attributes: RequestAttributes::default(),
        }
    }
}

/// Response contract for `getData` (spec §4.3): the payload stream plus
/// the attribution fields every response header in spec §6 is derived
/// from.
pub struct GetDataResponse {
    pub stream: DataStream,
    pub size: u64,
    /// Whether the bytes have been confirmed against a trusted Merkle
    /// root. `trusted` without `verified` means the bytes were attributed
    /// to a source the gateway trusts but has not cryptographically
    /// checked yet (open question 3: `trusted-gateways` responses).
    pub verified: bool,
    pub trusted: bool,
    pub cached: bool,
    pub hash: Option<[u8; 32]>,
    pub content_type: Option<String>,
    pub source: SourceName,
}
