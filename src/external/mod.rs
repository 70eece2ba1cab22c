//! External collaborators the core calls out to but does not own:
//! streaming compression and the Delaunator wire format. Triangulation
//! itself is out of scope — only the binary encode/decode around it.

use crate::bitio::{Reader, Writer};
use crate::error::{CoreError, CoreResult};

/// Compresses `data` with a streaming zstd encoder at the default level.
pub fn compress(data: &[u8]) -> CoreResult<Vec<u8>> {
    zstd::stream::encode_all(data, 0).map_err(|e| CoreError::Invalid(format!("zstd compress: {e}")))
}

/// Decompresses a zstd frame produced by [`compress`].
pub fn decompress(data: &[u8]) -> CoreResult<Vec<u8>> {
    zstd::stream::decode_all(data).map_err(|e| CoreError::Invalid(format!("zstd decompress: {e}")))
}

/// A planar point, read from either an `f32` or `f64` input stream
/// depending on the format flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Decodes a Delaunator input buffer: `u32 point_count` then, per point,
/// either `f32 x, f32 y` (flag `0`) or `f64 x, f64 y` (flag `1`).
pub fn decode_points(buf: &[u8], use_f64: bool) -> CoreResult<Vec<Point>> {
    let mut r = Reader::new(buf);
    let count = r.read_i32()?;
    if count < 0 {
        return Err(CoreError::DecodeError("negative point count".to_string()));
    }
    let mut points = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if use_f64 {
            points.push(Point { x: r.read_f64()?, y: r.read_f64()? });
        } else {
            points.push(Point { x: r.read_f32()? as f64, y: r.read_f32()? as f64 });
        }
    }
    Ok(points)
}

/// One triangle as indices into the input point list, resolved to their
/// coordinates for the wire format below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
}

/// Size of the encoded output for `tri_count` triangles.
pub fn encoded_triangles_len(tri_count: usize) -> usize {
    4 + tri_count * 6 * 8
}

/// Encodes a triangulation result: `u32 tri_count` then `f64 x0 y0 x1 y1
/// x2 y2` per triangle. Returns the negated required size if `buf` is
/// too small, per the external interface's documented failure mode.
pub fn encode_triangles(triangles: &[Triangle], buf: &mut [u8]) -> CoreResult<isize> {
    let required = encoded_triangles_len(triangles.len());
    if required > buf.len() {
        return Ok(-(required as isize));
    }
    let mut w = Writer::new(buf);
    w.write_i32(triangles.len() as i32)?;
    for t in triangles {
        w.write_f64(t.p0.x)?;
        w.write_f64(t.p0.y)?;
        w.write_f64(t.p1.x)?;
        w.write_f64(t.p1.y)?;
        w.write_f64(t.p2.x)?;
        w.write_f64(t.p2.y)?;
    }
    Ok(w.written() as isize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_round_trips() {
        let data = b"hello hello hello hello".to_vec();
        let compressed = compress(&data).unwrap();
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn decode_points_reads_f32_stream() {
        let mut buf = vec![0u8; 4 + 2 * 8];
        {
            let mut w = Writer::new(&mut buf);
            w.write_i32(2).unwrap();
            w.write_f32(1.5).unwrap();
            w.write_f32(2.5).unwrap();
            w.write_f32(3.5).unwrap();
            w.write_f32(4.5).unwrap();
        }
        let points = decode_points(&buf, false).unwrap();
        assert_eq!(points, vec![Point { x: 1.5, y: 2.5 }, Point { x: 3.5, y: 4.5 }]);
    }

    #[test]
    fn encode_triangles_reports_negated_required_size_when_too_small() {
        let tri = Triangle {
            p0: Point { x: 0.0, y: 0.0 },
            p1: Point { x: 1.0, y: 0.0 },
            p2: Point { x: 0.0, y: 1.0 },
        };
        let mut buf = [0u8; 1];
        let result = encode_triangles(&[tri], &mut buf).unwrap();
        assert_eq!(result, -(encoded_triangles_len(1) as isize));
    }

    #[test]
    fn empty_input_produces_zero_triangles() {
        let mut buf = vec![0u8; encoded_triangles_len(0)];
        let written = encode_triangles(&[], &mut buf).unwrap();
        assert_eq!(written, 4);
    }
}
