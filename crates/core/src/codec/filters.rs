//! Stream filters: deflate and predictor reconstruction.
//!
//! The read path inflates FlateDecode data (with a lenient fallback for
//! the corrupted zlib streams common in the wild) and undoes the PNG and
//! TIFF predictors declared in /DecodeParms. The write path deflates and
//! provides the row-filter encoder the predictors invert.

use crate::error::{PdfError, Result};
use crate::model::objects::PdfDict;
use crate::warnings::WarningSink;
use std::io::{Read, Write};

/// Compressing is only worthwhile when it saves at least this many bytes;
/// below that the zlib header/checksum overhead eats the gain.
const COMPRESSION_MARGIN: usize = 16;

/// Inflate a zlib stream strictly.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| PdfError::DecodeError(format!("flate: {}", e)))?;
    Ok(decompressed)
}

/// Inflate a zlib stream, salvaging what can be salvaged.
///
/// Falls back to byte-at-a-time decompression on error and returns the
/// partial output up to the point the decoder fails (often a bad checksum
/// near the end), with a warning.
pub(crate) fn flate_decode_lenient(data: &[u8], warnings: &mut WarningSink) -> Vec<u8> {
    match flate_decode(data) {
        Ok(out) => out,
        Err(_) => {
            warnings.warn("corrupted flate stream, keeping partial output");
            decompress_corrupted(data)
        }
    }
}

/// Best-effort zlib decompression for corrupted streams: feed the decoder
/// one byte at a time and keep whatever it produced before failing.
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        if consumed == 0 {
            i += 1;
        } else {
            i += consumed;
        }
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// Deflate data for the write path.
pub fn flate_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    // Writing to a Vec cannot fail.
    encoder.write_all(data).expect("in-memory deflate");
    encoder.finish().expect("in-memory deflate")
}

/// Whether a compressed form is smaller by a worthwhile margin.
pub fn compression_worthwhile(original: usize, compressed: usize) -> bool {
    compressed + COMPRESSION_MARGIN <= original
}

/// Filters this engine can decode. Anything else passes through untouched.
pub fn is_supported_filter(name: &str) -> bool {
    matches!(name, "FlateDecode" | "Fl" | "Crypt")
}

/// Bytes per predictor row for the given sample geometry.
fn predictor_row_bytes(columns: usize, colors: usize, bits_per_component: usize) -> usize {
    (columns * colors * bits_per_component).div_ceil(8)
}

/// Undo PNG row prediction.
///
/// Each row carries a leading filter-type byte; the row is reconstructed
/// against the previous row with one of {None, Sub, Up, Average, Paeth}
/// operating at the pixel stride.
pub fn png_predictor_decode(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    let row_bytes = predictor_row_bytes(columns, colors, bits_per_component);
    if row_bytes == 0 {
        return Err(PdfError::DecodeError("predictor row width is zero".into()));
    }
    let bpp = std::cmp::max(1, colors * bits_per_component / 8); // bytes per pixel
    let row_size = row_bytes + 1; // +1 for the filter byte

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for row_start in (0..data.len()).step_by(row_size) {
        if row_start + row_size > data.len() {
            break;
        }

        let filter_type = data[row_start];
        let row_data = &data[row_start + 1..row_start + row_size];
        let mut current_row = vec![0u8; row_bytes];

        match filter_type {
            0 => {
                // None
                current_row.copy_from_slice(row_data);
            }
            1 => {
                // Sub - left neighbor
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                // Up - byte above
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average of left and above
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        current_row[i - bpp] as u16
                    } else {
                        0
                    };
                    let above = prev_row[i] as u16;
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let paeth = paeth_predictor(left, above, upper_left);
                    current_row[i] = row_data[i].wrapping_add(paeth);
                }
            }
            _ => {
                // Unknown filter type, keep the bytes as they are
                current_row.copy_from_slice(row_data);
            }
        }

        result.extend_from_slice(&current_row);
        prev_row = current_row;
    }

    Ok(result)
}

/// Apply one PNG row filter to every row (the inverse of
/// [`png_predictor_decode`]).
pub fn png_predictor_encode(
    data: &[u8],
    filter_type: u8,
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    if filter_type > 4 {
        return Err(PdfError::DecodeError(format!(
            "unknown PNG filter type {}",
            filter_type
        )));
    }
    let row_bytes = predictor_row_bytes(columns, colors, bits_per_component);
    if row_bytes == 0 {
        return Err(PdfError::DecodeError("predictor row width is zero".into()));
    }
    let bpp = std::cmp::max(1, colors * bits_per_component / 8);

    let mut result = Vec::with_capacity(data.len() + data.len() / row_bytes + 1);
    let mut prev_row = vec![0u8; row_bytes];

    for row in data.chunks(row_bytes) {
        if row.len() < row_bytes {
            break;
        }
        result.push(filter_type);
        for i in 0..row_bytes {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => above,
                3 => (((left as u16) + (above as u16)) / 2) as u8,
                _ => paeth_predictor(left, above, upper_left),
            };
            result.push(row[i].wrapping_sub(predicted));
        }
        prev_row.copy_from_slice(row);
    }

    Ok(result)
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// Undo TIFF predictor 2 (horizontal differencing) for 8-bit samples.
///
/// Other bit depths pass through with a warning.
pub fn tiff_predictor_decode(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
    warnings: &mut WarningSink,
) -> Vec<u8> {
    if bits_per_component != 8 {
        warnings.warn(format!(
            "TIFF predictor with {} bits per component not supported, data left untouched",
            bits_per_component
        ));
        return data.to_vec();
    }
    let row_bytes = columns * colors;
    if row_bytes == 0 {
        return data.to_vec();
    }

    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    out
}

/// Reconstruct decompressed data per its /DecodeParms dictionary.
///
/// Predictor 1 (or none) leaves the data alone; 2 is TIFF differencing;
/// 10-15 are the PNG row filters. Anything else passes through with a
/// warning.
pub(crate) fn apply_predictor(
    data: Vec<u8>,
    parms: &PdfDict,
    warnings: &mut WarningSink,
) -> Vec<u8> {
    let predictor = parms.get_int("Predictor").unwrap_or(1);
    if predictor == 1 {
        return data;
    }

    let columns = parms.get_int("Columns").unwrap_or(1).max(0) as usize;
    let colors = parms.get_int("Colors").unwrap_or(1).max(0) as usize;
    let bits = parms.get_int("BitsPerComponent").unwrap_or(8).max(0) as usize;

    match predictor {
        2 => tiff_predictor_decode(&data, columns, colors, bits, warnings),
        10..=15 => match png_predictor_decode(&data, columns, colors, bits) {
            Ok(out) => out,
            Err(e) => {
                warnings.warn(format!("predictor reconstruction failed: {}", e));
                data
            }
        },
        other => {
            warnings.warn(format!(
                "unsupported predictor {}, data left untouched",
                other
            ));
            data
        }
    }
}
