use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, Path, Query};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use bytes::BytesMut;
use futures_util::StreamExt;
use serde::Deserialize;

use ario_gateway_data_source::{GetDataRequest, GetDataResponse};
use ario_gateway_primitives::{ByteRegion, Id, RequestAttributes};
use ario_gateway_resolver::resolve_root;

use crate::error::ApiError;
use crate::range::{parse_range_header, ParsedRanges};
use crate::state::AppState;

/// Inbound hop/origin/ArNS attribution, mirroring the query params spec §6
/// describes this gateway setting on its own *outbound* peer requests —
/// a peer calling into this gateway sets the same ones on its way in.
#[derive(Debug, Deserialize, Default)]
pub struct PeerQuery {
    #[serde(rename = "ar-io-hops")]
    pub ar_io_hops: Option<u8>,
    #[serde(rename = "ar-io-origin")]
    pub ar_io_origin: Option<String>,
    #[serde(rename = "ar-io-origin-release")]
    pub ar_io_origin_release: Option<String>,
    #[serde(rename = "ar-io-arns-name")]
    pub ar_io_arns_name: Option<String>,
    #[serde(rename = "ar-io-arns-basename")]
    pub ar_io_arns_basename: Option<String>,
    #[serde(rename = "ar-io-arns-record")]
    pub ar_io_arns_record: Option<String>,
}

impl PeerQuery {
    fn request_attributes(&self, expected_digest: Option<[u8; 32]>) -> RequestAttributes {
        RequestAttributes {
            origin: self.ar_io_origin.clone(),
            origin_release: self.ar_io_origin_release.clone(),
            hops: self.ar_io_hops.unwrap_or(0),
            arns_name: self.ar_io_arns_name.clone(),
            arns_basename: self.ar_io_arns_basename.clone(),
            arns_record: self.ar_io_arns_record.clone(),
            expected_digest,
        }
    }
}

pub async fn get_data(
    state: Extension<Arc<AppState>>,
    method: Method,
    Path(id_str): Path<String>,
    query: Query<PeerQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_id(state, method, id_str, query, headers).await
}

/// `GET /{id}/{path...}` needs a manifest format spec.md never specifies
/// (it belongs to the ArNS/manifest resolver named as an external
/// collaborator in spec.md's scope section); rather than invent a wire
/// format, this path responds 501. See DESIGN.md.
pub async fn get_data_with_path(
    Path((_id, _path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    Err(ApiError::NotImplemented("path manifest resolution"))
}

async fn serve_id(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    id_str: String,
    Query(query): Query<PeerQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = Id::from_base64url(&id_str).map_err(|_| ApiError::NotFound)?;
    let attrs = state.attributes.get(&id).await?;

    let is_nested = attrs.as_ref().is_some_and(|a| a.parent_id.is_some());
    let expected_digest = attrs.as_ref().and_then(|a| a.hash);
    let request_attributes = query.request_attributes(expected_digest);

    let (fetch_id, root_transaction_id, root_data_offset, root_data_item_offset) = if is_nested {
        let resolution = resolve_root(&state.attributes, id).await?;
        (
            resolution.root_transaction_id,
            resolution.root_transaction_id,
            resolution.root_data_offset,
            Some(resolution.root_data_item_offset),
        )
    } else {
        (id, id, 0, attrs.as_ref().map(|_| 0))
    };

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let regions = match (range_header, &attrs) {
        (Some(h), Some(a)) => Some(parse_range_header(h, a.size)?),
        (Some(_), None) => {
            return Err(ApiError::InvalidRange("range requested on an unindexed id".to_owned()))
        }
        (None, _) => None,
    };

    let make_fetch_region = |region: ByteRegion| -> Result<ByteRegion, ApiError> {
        let item_size = attrs.as_ref().expect("regions only built when attrs is Some").size;
        if is_nested {
            Ok(region.rebase(root_data_offset, item_size)?)
        } else {
            Ok(region.truncate_to(item_size)?)
        }
    };

    match regions {
        None => {
            let fetch_region = if is_nested {
                Some(make_fetch_region(ByteRegion::whole(attrs.as_ref().expect("nested items are indexed").size))?)
            } else {
                None
            };
            let response = state
                .data_source
                .get_data(&GetDataRequest {
                    id: fetch_id,
                    region: fetch_region,
                    request_attributes: request_attributes.clone(),
                })
                .await?;
            Ok(whole_response(
                method,
                id,
                root_transaction_id,
                root_data_item_offset,
                &query,
                request_attributes.hops,
                response,
            ))
        }
        Some(ParsedRanges::Single(region)) => {
            let total_size = attrs.as_ref().expect("ranges require a known size").size;
            let fetch_region = make_fetch_region(region)?;
            let response = state
                .data_source
                .get_data(&GetDataRequest {
                    id: fetch_id,
                    region: Some(fetch_region),
                    request_attributes: request_attributes.clone(),
                })
                .await?;
            Ok(single_range_response(
                method,
                id,
                root_transaction_id,
                root_data_item_offset,
                &query,
                request_attributes.hops,
                region,
                total_size,
                response,
            ))
        }
        Some(ParsedRanges::Multi(regions)) => {
            let total_size = attrs.as_ref().expect("ranges require a known size").size;
            let mut parts = Vec::with_capacity(regions.len());
            for region in regions {
                let fetch_region = make_fetch_region(region)?;
                let response = state
                    .data_source
                    .get_data(&GetDataRequest {
                        id: fetch_id,
                        region: Some(fetch_region),
                        request_attributes: request_attributes.clone(),
                    })
                    .await?;
                let content_type = response.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_owned());
                let mut bytes = BytesMut::new();
                let mut stream = response.stream;
                while let Some(chunk) = stream.next().await {
                    bytes.extend_from_slice(&chunk.map_err(|e| ApiError::Internal(e.to_string()))?);
                }
                parts.push((region, content_type, bytes.freeze()));
            }
            Ok(multipart_response(id, root_transaction_id, total_size, parts))
        }
    }
}

fn apply_common_headers(
    headers: &mut HeaderMap,
    requested_id: Id,
    root_transaction_id: Id,
    root_data_item_offset: Option<u64>,
    query: &PeerQuery,
    hops: u8,
    response: &GetDataResponse,
) {
    headers.insert("x-ar-io-verified", flag(response.verified));
    headers.insert("x-ar-io-trusted", flag(response.trusted));
    headers.insert(
        "x-ar-io-cache",
        HeaderValue::from_static(if response.cached { "HIT" } else { "MISS" }),
    );
    headers.insert("x-ar-io-data-id", text(&requested_id.to_base64url()));
    headers.insert("x-ar-io-root-transaction-id", text(&root_transaction_id.to_base64url()));
    if let Some(offset) = root_data_item_offset {
        headers.insert("x-ar-io-data-item-data-offset", text(&offset.to_string()));
    }
    headers.insert("x-ar-io-hops", text(&hops.to_string()));
    headers.insert("x-ar-io-chunk-source-type", HeaderValue::from_static(response.source.as_str()));

    if let Some(origin) = &query.ar_io_origin {
        if let Ok(v) = HeaderValue::from_str(origin) {
            headers.insert("x-ar-io-origin", v);
        }
    }
    if let Some(release) = &query.ar_io_origin_release {
        if let Ok(v) = HeaderValue::from_str(release) {
            headers.insert("x-ar-io-origin-node-release", v);
        }
    }
    if let Some(name) = &query.ar_io_arns_name {
        if let Ok(v) = HeaderValue::from_str(name) {
            headers.insert("x-arns-name", v);
        }
    }
    if let Some(basename) = &query.ar_io_arns_basename {
        if let Ok(v) = HeaderValue::from_str(basename) {
            headers.insert("x-arns-basename", v);
        }
    }
    if let Some(record) = &query.ar_io_arns_record {
        if let Ok(v) = HeaderValue::from_str(record) {
            headers.insert("x-arns-record", v);
        }
    }

    if let Some(hash) = response.hash {
        let digest = URL_SAFE_NO_PAD.encode(hash);
        headers.insert("x-ar-io-digest", text(&digest));
        headers.insert(header::ETAG, text(&format!("\"{digest}\"")));
        headers.insert("content-digest", text(&format!("sha-256=:{}:", STANDARD.encode(hash))));
    }
}

fn flag(value: bool) -> HeaderValue {
    HeaderValue::from_static(if value { "true" } else { "false" })
}

fn text(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn whole_response(
    method: Method,
    id: Id,
    root_transaction_id: Id,
    root_data_item_offset: Option<u64>,
    query: &PeerQuery,
    hops: u8,
    response: GetDataResponse,
) -> Response {
    let mut headers = HeaderMap::new();
    apply_common_headers(&mut headers, id, root_transaction_id, root_data_item_offset, query, hops, &response);
    headers.insert(header::CONTENT_LENGTH, text(&response.size.to_string()));
    if let Some(ct) = &response.content_type {
        if let Ok(v) = HeaderValue::from_str(ct) {
            headers.insert(header::CONTENT_TYPE, v);
        }
    }
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(response.stream)
    };
    (StatusCode::OK, headers, body).into_response()
}

#[allow(clippy::too_many_arguments)]
fn single_range_response(
    method: Method,
    id: Id,
    root_transaction_id: Id,
    root_data_item_offset: Option<u64>,
    query: &PeerQuery,
    hops: u8,
    region: ByteRegion,
    total_size: u64,
    response: GetDataResponse,
) -> Response {
    let mut headers = HeaderMap::new();
    apply_common_headers(&mut headers, id, root_transaction_id, root_data_item_offset, query, hops, &response);
    headers.insert(header::CONTENT_LENGTH, text(&region.size.to_string()));
    headers.insert(
        header::CONTENT_RANGE,
        text(&format!("bytes {}-{}/{}", region.offset, region.end().saturating_sub(1), total_size)),
    );
    if let Some(ct) = &response.content_type {
        if let Ok(v) = HeaderValue::from_str(ct) {
            headers.insert(header::CONTENT_TYPE, v);
        }
    }
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(response.stream)
    };
    (StatusCode::PARTIAL_CONTENT, headers, body).into_response()
}

fn multipart_response(
    id: Id,
    root_transaction_id: Id,
    total_size: u64,
    parts: Vec<(ByteRegion, String, bytes::Bytes)>,
) -> Response {
    const BOUNDARY: &str = "ar-io-gateway-byteranges";
    let mut body = BytesMut::new();
    for (region, content_type, bytes) in &parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Range: bytes {}-{}/{}\r\n\r\n",
                region.offset,
                region.end().saturating_sub(1),
                total_size
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, text(&format!("multipart/byteranges; boundary={BOUNDARY}")));
    headers.insert(header::CONTENT_LENGTH, text(&body.len().to_string()));
    headers.insert("x-ar-io-data-id", text(&id.to_base64url()));
    headers.insert("x-ar-io-root-transaction-id", text(&root_transaction_id.to_base64url()));

    (StatusCode::PARTIAL_CONTENT, headers, Body::from(body.freeze())).into_response()
}
