/// HTTP `Range: bytes=<start>-<end>` parsing
///
/// Only the single-range `bytes=start-end` form is accepted (suffix
/// ranges like `bytes=-500` and multi-range requests are rejected as
/// malformed, matching the narrow surface this service exposes).
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range_header(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// Parse a `Range` header value against a known file size. `None` header
/// means "whole file"; callers distinguish that from a parsed range by
/// checking `Option` at the call site.
pub fn parse(header: Option<&str>, file_size: u64) -> Result<Option<ByteRange>, AppError> {
    let Some(raw) = header else {
        return Ok(None);
    };

    let spec = raw
        .strip_prefix("bytes=")
        .ok_or_else(|| AppError::RangeNotSatisfiable(format!("unsupported range unit: {raw}")))?;

    if spec.contains(',') {
        return Err(AppError::RangeNotSatisfiable(
            "multi-range requests are not supported".into(),
        ));
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| AppError::RangeNotSatisfiable(format!("malformed range: {raw}")))?;

    if start_str.is_empty() {
        return Err(AppError::RangeNotSatisfiable(
            "suffix ranges are not supported".into(),
        ));
    }

    let start: u64 = start_str
        .parse()
        .map_err(|_| AppError::RangeNotSatisfiable(format!("malformed range start: {raw}")))?;
    let end: u64 = if end_str.is_empty() {
        file_size.saturating_sub(1)
    } else {
        end_str
            .parse()
            .map_err(|_| AppError::RangeNotSatisfiable(format!("malformed range end: {raw}")))?
    };

    if file_size == 0 || start > end || end >= file_size {
        return Err(AppError::RangeNotSatisfiable(format!(
            "range {raw} out of bounds for file of size {file_size}"
        )));
    }

    Ok(Some(ByteRange { start, end }))
}

/// Given a chunk's byte offset within the assembled file and its length,
/// compute the slice (if any) of that chunk intersecting `range`.
pub fn intersect(range: ByteRange, chunk_offset: u64, chunk_len: u64) -> Option<(usize, usize)> {
    let chunk_end = chunk_offset + chunk_len - 1;
    if chunk_end < range.start || chunk_offset > range.end {
        return None;
    }
    let local_start = range.start.saturating_sub(chunk_offset);
    let local_end = (range.end.min(chunk_end)) - chunk_offset;
    Some((local_start as usize, local_end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_range() {
        let range = parse(Some("bytes=2-7"), 11).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 2, end: 7 });
        assert_eq!(range.len(), 6);
    }

    #[test]
    fn open_ended_range_defaults_to_file_end() {
        let range = parse(Some("bytes=5-"), 11).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 5, end: 10 });
    }

    #[test]
    fn no_header_means_whole_file() {
        assert_eq!(parse(None, 11).unwrap(), None);
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        assert!(parse(Some("bytes=0-20"), 11).is_err());
    }

    #[test]
    fn rejects_suffix_ranges() {
        assert!(parse(Some("bytes=-500"), 11).is_err());
    }

    #[test]
    fn intersects_a_chunk_fully_inside_the_range() {
        let range = ByteRange { start: 2, end: 7 };
        assert_eq!(intersect(range, 4, 4), Some((0, 3)));
    }

    #[test]
    fn intersect_returns_none_outside_the_range() {
        let range = ByteRange { start: 2, end: 3 };
        assert_eq!(intersect(range, 8, 4), None);
    }
}
