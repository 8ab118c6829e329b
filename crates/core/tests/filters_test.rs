//! Tests for deflate and predictor reconstruction.

use folio_core::filters::{
    compression_worthwhile, flate_decode, flate_encode, png_predictor_decode,
    png_predictor_encode, tiff_predictor_decode,
};
use folio_core::warnings::WarningSink;

/// Deterministic sample data: `rows` rows of `row_bytes` varied bytes.
fn sample_rows(rows: usize, row_bytes: usize) -> Vec<u8> {
    (0..rows * row_bytes)
        .map(|i| ((i * 7 + i / row_bytes * 13) % 251) as u8)
        .collect()
}

fn row_bytes(columns: usize, colors: usize, bits: usize) -> usize {
    (columns * colors * bits).div_ceil(8)
}

/// decode(encode(data)) == data for every PNG row filter, at widths of
/// 1, 5 and 17 samples and bit depths 1 and 8.
#[test]
fn test_png_predictor_round_trip_all_filters() {
    for filter_type in 0u8..=4 {
        for columns in [1usize, 5, 17] {
            for bits in [1usize, 8] {
                let rb = row_bytes(columns, 1, bits);
                let data = sample_rows(4, rb);

                let encoded = png_predictor_encode(&data, filter_type, columns, 1, bits)
                    .expect("encode succeeds");
                assert_eq!(
                    encoded.len(),
                    data.len() + 4,
                    "one filter byte per row (filter {}, {} cols, {} bits)",
                    filter_type,
                    columns,
                    bits
                );

                let decoded =
                    png_predictor_decode(&encoded, columns, 1, bits).expect("decode succeeds");
                assert_eq!(
                    decoded, data,
                    "round trip failed for filter {}, {} cols, {} bits",
                    filter_type, columns, bits
                );
            }
        }
    }
}

#[test]
fn test_png_predictor_multi_color_round_trip() {
    // 3 components per sample, 8-bit: stride is 3 bytes
    let data = sample_rows(3, 5 * 3);
    for filter_type in [1u8, 3, 4] {
        let encoded = png_predictor_encode(&data, filter_type, 5, 3, 8).unwrap();
        let decoded = png_predictor_decode(&encoded, 5, 3, 8).unwrap();
        assert_eq!(decoded, data, "filter {}", filter_type);
    }
}

#[test]
fn test_png_predictor_up_known_answer() {
    // Two rows of three; filter 2 adds the byte above (zero for row one)
    let encoded = [2u8, 10, 20, 30, 2, 1, 2, 3];
    let decoded = png_predictor_decode(&encoded, 3, 1, 8).unwrap();
    assert_eq!(decoded, vec![10, 20, 30, 11, 22, 33]);
}

#[test]
fn test_png_predictor_rejects_unknown_encode_filter() {
    assert!(png_predictor_encode(b"abc", 9, 3, 1, 8).is_err());
}

#[test]
fn test_png_predictor_ignores_trailing_partial_row() {
    // One full row plus a truncated second row
    let encoded = [0u8, 1, 2, 3, 0, 9];
    let decoded = png_predictor_decode(&encoded, 3, 1, 8).unwrap();
    assert_eq!(decoded, vec![1, 2, 3]);
}

#[test]
fn test_tiff_predictor_undoes_horizontal_differencing() {
    // Differenced form of [10, 20, 30, 40] is [10, 10, 10, 10]
    let mut sink = WarningSink::new();
    let decoded = tiff_predictor_decode(&[10, 10, 10, 10], 4, 1, 8, &mut sink);
    assert_eq!(decoded, vec![10, 20, 30, 40]);
    assert!(sink.is_empty());
}

#[test]
fn test_tiff_predictor_respects_color_stride() {
    // Two RGB samples per row: deltas apply per component
    let mut sink = WarningSink::new();
    let decoded = tiff_predictor_decode(&[1, 2, 3, 1, 1, 1], 2, 3, 8, &mut sink);
    assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
}

#[test]
fn test_tiff_predictor_passes_through_unsupported_depth() {
    let mut sink = WarningSink::new();
    let data = [0xAA, 0x55];
    let decoded = tiff_predictor_decode(&data, 16, 1, 1, &mut sink);
    assert_eq!(decoded, data.to_vec());
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_flate_round_trip() {
    let original = b"repetitive repetitive repetitive repetitive payload".repeat(20);
    let compressed = flate_encode(&original);
    assert!(compressed.len() < original.len());
    assert_eq!(flate_decode(&compressed).unwrap(), original);
}

#[test]
fn test_flate_decode_rejects_garbage() {
    assert!(flate_decode(b"definitely not zlib").is_err());
}

#[test]
fn test_compression_margin() {
    // Saving one byte is overhead, not compression
    assert!(!compression_worthwhile(100, 99));
    assert!(compression_worthwhile(100, 50));
    assert!(!compression_worthwhile(10, 20));
}

#[test]
fn test_warning_sink_deduplicates() {
    let mut sink = WarningSink::new();
    sink.warn("same message");
    sink.warn("same message");
    sink.warn("other message");
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.messages()[0], "same message");
}
