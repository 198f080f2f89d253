//! Splitting of Motion JPEG streams into single images.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Splits a concatenated JPEG stream into its images.
///
/// Each image runs from a start-of-image marker to the next end-of-image
/// marker. A trailing image without an end marker is dropped.
pub fn split_jpeg_stream(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut rest = stream;

    while let Some(start) = find(rest, &SOI) {
        let body = &rest[start + SOI.len()..];
        let Some(end) = find(body, &EOI) else {
            break;
        };
        let frame_end = start + SOI.len() + end + EOI.len();
        frames.push(rest[start..frame_end].to_vec());
        rest = &rest[frame_end..];
    }

    frames
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
