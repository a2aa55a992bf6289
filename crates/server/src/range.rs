use ario_gateway_primitives::ByteRegion;

use crate::error::ApiError;

/// Parsed `Range` header (RFC 7233 `bytes=` unit only), already clamped to
/// the id's total size via `ByteRegion::truncate_to`.
pub enum ParsedRanges {
    Single(ByteRegion),
    Multi(Vec<ByteRegion>),
}

pub fn parse_range_header(header: &str, total_size: u64) -> Result<ParsedRanges, ApiError> {
    let spec = header
        .strip_prefix("bytes=")
        .ok_or_else(|| ApiError::InvalidRange("range unit must be bytes".to_owned()))?;

    let mut regions = Vec::new();
    for part in spec.split(',') {
        regions.push(parse_one_range(part.trim(), total_size)?);
    }
    if regions.is_empty() {
        return Err(ApiError::InvalidRange("empty range set".to_owned()));
    }

    if regions.len() == 1 {
        Ok(ParsedRanges::Single(regions.remove(0)))
    } else {
        Ok(ParsedRanges::Multi(regions))
    }
}

fn parse_one_range(part: &str, total_size: u64) -> Result<ByteRegion, ApiError> {
    let (start_s, end_s) = part
        .split_once('-')
        .ok_or_else(|| ApiError::InvalidRange(format!("malformed range {part:?}")))?;

    let region = if start_s.is_empty() {
        // Suffix range: `bytes=-N` means the last N bytes of the payload.
        let suffix_len: u64 = end_s
            .parse()
            .map_err(|_| ApiError::InvalidRange(format!("malformed suffix range {part:?}")))?;
        if suffix_len == 0 {
            return Err(ApiError::InvalidRange("suffix range length must be positive".to_owned()));
        }
        let size = suffix_len.min(total_size);
        ByteRegion {
            offset: total_size.saturating_sub(size),
            size,
        }
    } else {
        let start: u64 = start_s
            .parse()
            .map_err(|_| ApiError::InvalidRange(format!("malformed range start {part:?}")))?;
        if end_s.is_empty() {
            ByteRegion {
                offset: start,
                size: total_size.saturating_sub(start),
            }
        } else {
            let end: u64 = end_s
                .parse()
                .map_err(|_| ApiError::InvalidRange(format!("malformed range end {part:?}")))?;
            if end < start {
                return Err(ApiError::InvalidRange(format!("range end before start in {part:?}")));
            }
            ByteRegion {
                offset: start,
                size: end - start + 1,
            }
        }
    };

    region.truncate_to(total_size).map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_range_is_parsed() {
        match parse_range_header("bytes=50-249", 500).unwrap() {
            ParsedRanges::Single(region) => {
                assert_eq!(region, ByteRegion { offset: 50, size: 200 });
            }
            ParsedRanges::Multi(_) => panic!("expected a single range"),
        }
    }

    #[test]
    fn open_ended_range_runs_to_the_end() {
        match parse_range_header("bytes=450-", 500).unwrap() {
            ParsedRanges::Single(region) => {
                assert_eq!(region, ByteRegion { offset: 450, size: 50 });
            }
            ParsedRanges::Multi(_) => panic!("expected a single range"),
        }
    }

    #[test]
    fn suffix_range_is_the_last_n_bytes() {
        match parse_range_header("bytes=-100", 500).unwrap() {
            ParsedRanges::Single(region) => {
                assert_eq!(region, ByteRegion { offset: 400, size: 100 });
            }
            ParsedRanges::Multi(_) => panic!("expected a single range"),
        }
    }

    #[test]
    fn multiple_ranges_are_parsed_in_order() {
        match parse_range_header("bytes=0-9,20-29", 500).unwrap() {
            ParsedRanges::Multi(regions) => {
                assert_eq!(regions, vec![
                    ByteRegion { offset: 0, size: 10 },
                    ByteRegion { offset: 20, size: 10 },
                ]);
            }
            ParsedRanges::Single(_) => panic!("expected multiple ranges"),
        }
    }

    #[test]
    fn range_past_the_end_is_rejected() {
        assert!(parse_range_header("bytes=500-600", 500).is_err());
    }

    #[test]
    fn non_bytes_unit_is_rejected() {
        assert!(parse_range_header("items=0-1", 500).is_err());
    }
}
