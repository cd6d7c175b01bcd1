//! Binary node decoding. Runs on the worker pool, never on the caller.

use crate::octree::aabb::Aabb;
use crate::octree::point_attributes::{PointAttributeKind, PointAttributes};
use crate::version::Version;
use byteorder::{ByteOrder, LittleEndian};
use glam::DVec3;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, debug_span};

/// First version whose positions are quantized `u32` offsets from the node min.
const QUANTIZED_POSITIONS: Version = Version::new(1, 4);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Buffer of {byte_len} bytes is not a multiple of the {byte_size} byte point record")]
    Misaligned { byte_len: usize, byte_size: u16 },

    #[error("Decoder worker is unavailable")]
    WorkerUnavailable,

    #[error("Decoder worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Everything a worker needs to decode one node. The raw bytes are moved in.
#[derive(Debug)]
pub struct DecodeTask {
    pub buffer: Vec<u8>,
    pub point_attributes: Arc<PointAttributes>,
    pub version: Version,
    pub min: DVec3,
    pub offset: DVec3,
    pub scale: DVec3,
    pub spacing: f64,
    pub has_children: bool,
    pub name: String,
}

/// A decoded per-point buffer, tagged by the attribute it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedAttribute {
    Position(Vec<f32>),
    Color(Vec<u8>),
    Intensity(Vec<f32>),
    Classification(Vec<u8>),
    NormalSpheremapped(Vec<f32>),
    NormalOct16(Vec<f32>),
    Normal(Vec<f32>),
    Indices(Vec<u8>),
    Spacing(Vec<f32>),
}

#[derive(Debug)]
pub struct DecodedNode {
    pub attributes: Vec<DecodedAttribute>,
    /// Bounds of the decoded positions in node-local space, not yet translated.
    pub tight_bounding_box: Aabb,
    pub mean: DVec3,
    pub estimated_spacing: f64,
    /// The submitted byte buffer, handed back untouched.
    pub buffer: Vec<u8>,
}

fn fields(buffer: &[u8], record: usize, offset: usize, width: usize) -> impl Iterator<Item = &[u8]> {
    buffer
        .chunks_exact(record)
        .map(move |point| &point[offset..offset + width])
}

fn unorm8(value: u8) -> f32 {
    value as f32 / 255.0 * 2.0 - 1.0
}

pub(crate) fn decode_spheremapped(bx: u8, by: u8) -> [f32; 3] {
    let (nx, ny) = (unorm8(bx), unorm8(by));
    let l = 1.0 - nx * nx - ny * ny;
    let s = l.max(0.0).sqrt();

    [nx * s * 2.0, ny * s * 2.0, l * 2.0 - 1.0]
}

pub(crate) fn decode_oct16(bx: u8, by: u8) -> [f32; 3] {
    let (u, v) = (unorm8(bx), unorm8(by));
    let z = 1.0 - u.abs() - v.abs();
    let (x, y) = if z >= 0.0 {
        (u, v)
    } else {
        ((1.0 - v.abs()) * u.signum(), (1.0 - u.abs()) * v.signum())
    };

    let length = (x * x + y * y + z * z).sqrt();
    if length == 0.0 {
        return [0.0, 0.0, 1.0];
    }
    [x / length, y / length, z / length]
}

pub fn decode(task: DecodeTask) -> Result<DecodedNode, DecodeError> {
    let span = debug_span!(
        "decode",
        node = %task.name,
        bytes = task.buffer.len(),
        has_children = task.has_children
    );
    let _enter = span.enter();

    let schema = &task.point_attributes;
    let record = schema.byte_size as usize;
    let num_points = schema
        .num_points(task.buffer.len())
        .ok_or(DecodeError::Misaligned {
            byte_len: task.buffer.len(),
            byte_size: schema.byte_size,
        })?;

    let quantized = task.version.at_least(QUANTIZED_POSITIONS);
    let buffer = task.buffer.as_slice();

    let mut attributes = Vec::with_capacity(schema.attributes.len());
    let mut tight_bounding_box = Aabb::empty();
    let mut sum = DVec3::ZERO;
    let mut offset = 0;

    for attribute in &schema.attributes {
        let width = attribute.byte_size as usize;
        let records = fields(buffer, record, offset, width);
        offset += width;

        let decoded = match attribute.kind {
            PointAttributeKind::PositionCartesian => {
                let mut positions = Vec::with_capacity(num_points * 3);
                for field in records {
                    let point = if quantized {
                        DVec3::new(
                            LittleEndian::read_u32(&field[0..4]) as f64,
                            LittleEndian::read_u32(&field[4..8]) as f64,
                            LittleEndian::read_u32(&field[8..12]) as f64,
                        ) * task.scale
                    } else {
                        DVec3::new(
                            LittleEndian::read_f32(&field[0..4]) as f64,
                            LittleEndian::read_f32(&field[4..8]) as f64,
                            LittleEndian::read_f32(&field[8..12]) as f64,
                        ) - task.offset
                            - task.min
                    };

                    tight_bounding_box.expand(point);
                    sum += point;
                    positions.extend([point.x as f32, point.y as f32, point.z as f32]);
                }
                DecodedAttribute::Position(positions)
            }
            PointAttributeKind::ColorPacked => {
                let mut colors = Vec::with_capacity(num_points * 4);
                records.for_each(|field| colors.extend_from_slice(field));
                DecodedAttribute::Color(colors)
            }
            PointAttributeKind::Intensity => DecodedAttribute::Intensity(
                records
                    .map(|field| LittleEndian::read_u16(field) as f32)
                    .collect(),
            ),
            PointAttributeKind::Classification => {
                DecodedAttribute::Classification(records.map(|field| field[0]).collect())
            }
            PointAttributeKind::NormalSpheremapped => DecodedAttribute::NormalSpheremapped(
                records
                    .flat_map(|field| decode_spheremapped(field[0], field[1]))
                    .collect(),
            ),
            PointAttributeKind::NormalOct16 => DecodedAttribute::NormalOct16(
                records
                    .flat_map(|field| decode_oct16(field[0], field[1]))
                    .collect(),
            ),
            PointAttributeKind::Normal => {
                let mut normals = Vec::with_capacity(num_points * 3);
                for field in records {
                    normals.extend([
                        LittleEndian::read_f32(&field[0..4]),
                        LittleEndian::read_f32(&field[4..8]),
                        LittleEndian::read_f32(&field[8..12]),
                    ]);
                }
                DecodedAttribute::Normal(normals)
            }
            PointAttributeKind::Indices => {
                // u32 little endian, exposed as four normalized bytes
                let mut indices = Vec::with_capacity(num_points * 4);
                records.for_each(|field| indices.extend_from_slice(field));
                DecodedAttribute::Indices(indices)
            }
            PointAttributeKind::Spacing => DecodedAttribute::Spacing(
                records.map(LittleEndian::read_f32).collect(),
            ),
            PointAttributeKind::NormalFloats
            | PointAttributeKind::ColorFloats1
            | PointAttributeKind::ColorFloats255
            | PointAttributeKind::Filler
            | PointAttributeKind::ReturnNumber
            | PointAttributeKind::NumberOfReturns
            | PointAttributeKind::SourceId
            | PointAttributeKind::GpsTime => {
                debug!(attribute = attribute.name(), "skipping attribute without a renderable buffer");
                continue;
            }
        };

        attributes.push(decoded);
    }

    let mean = if num_points > 0 && !tight_bounding_box.is_empty() {
        sum / num_points as f64
    } else {
        DVec3::ZERO
    };
    if tight_bounding_box.is_empty() {
        tight_bounding_box = Aabb::default();
    }

    let volume = tight_bounding_box.volume();
    let estimated_spacing = if num_points > 0 && volume > 0.0 {
        (volume / num_points as f64).cbrt()
    } else {
        task.spacing
    };

    debug!(num_points, estimated_spacing, "decoded node");

    Ok(DecodedNode {
        attributes,
        tight_bounding_box,
        mean,
        estimated_spacing,
        buffer: task.buffer,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn position_record(x: u32, y: u32, z: u32) -> Vec<u8> {
        let mut record = vec![0; 12];
        LittleEndian::write_u32(&mut record[0..4], x);
        LittleEndian::write_u32(&mut record[4..8], y);
        LittleEndian::write_u32(&mut record[8..12], z);
        record
    }

    fn task(buffer: Vec<u8>, kinds: &[PointAttributeKind], version: Version) -> DecodeTask {
        DecodeTask {
            buffer,
            point_attributes: Arc::new(PointAttributes::new(kinds.iter().copied()).unwrap()),
            version,
            min: DVec3::new(10.0, 20.0, 30.0),
            offset: DVec3::new(100.0, 100.0, 100.0),
            scale: DVec3::splat(0.5),
            spacing: 3.0,
            has_children: true,
            name: "r0".to_string(),
        }
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let result = decode(task(
            vec![0; 13],
            &[PointAttributeKind::PositionCartesian],
            Version::new(1, 7),
        ));
        assert_eq!(
            result.unwrap_err(),
            DecodeError::Misaligned {
                byte_len: 13,
                byte_size: 12
            }
        );
    }

    #[test]
    fn quantized_positions_with_color_and_intensity() {
        let mut buffer = Vec::new();
        for (position, rgba, intensity) in [
            ((2, 4, 6), [255, 0, 0, 255], 7u16),
            ((10, 8, 18), [0, 255, 0, 128], 300u16),
        ] {
            buffer.extend(position_record(position.0, position.1, position.2));
            buffer.extend(rgba);
            buffer.extend(intensity.to_le_bytes());
        }

        let decoded = decode(task(
            buffer,
            &[
                PointAttributeKind::PositionCartesian,
                PointAttributeKind::ColorPacked,
                PointAttributeKind::Intensity,
            ],
            Version::new(1, 7),
        ))
        .unwrap();

        assert_eq!(
            decoded.attributes,
            vec![
                DecodedAttribute::Position(vec![1.0, 2.0, 3.0, 5.0, 4.0, 9.0]),
                DecodedAttribute::Color(vec![255, 0, 0, 255, 0, 255, 0, 128]),
                DecodedAttribute::Intensity(vec![7.0, 300.0]),
            ]
        );
        assert_eq!(decoded.tight_bounding_box.min, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(decoded.tight_bounding_box.max, DVec3::new(5.0, 4.0, 9.0));
        assert_eq!(decoded.mean, DVec3::new(3.0, 3.0, 6.0));
        // 4 * 2 * 6 = 48 cubic units over two points
        assert!((decoded.estimated_spacing - 24f64.cbrt()).abs() < 1e-9);
    }

    #[test]
    fn legacy_positions_are_made_node_local() {
        let mut buffer = Vec::new();
        for value in [111.0f32, 122.0, 133.0] {
            buffer.extend(value.to_le_bytes());
        }

        let decoded = decode(task(
            buffer,
            &[PointAttributeKind::PositionCartesian],
            Version::new(1, 3),
        ))
        .unwrap();

        assert_eq!(
            decoded.attributes,
            vec![DecodedAttribute::Position(vec![1.0, 2.0, 3.0])]
        );
        // a single point has no volume
        assert_eq!(decoded.estimated_spacing, 3.0);
    }

    #[test]
    fn layout_only_attributes_are_skipped() {
        let mut buffer = position_record(0, 0, 0);
        buffer.extend(1234.5f64.to_le_bytes());
        buffer.push(6);

        let decoded = decode(task(
            buffer,
            &[
                PointAttributeKind::PositionCartesian,
                PointAttributeKind::GpsTime,
                PointAttributeKind::Classification,
            ],
            Version::new(1, 7),
        ))
        .unwrap();

        assert_eq!(decoded.attributes.len(), 2);
        assert_eq!(decoded.attributes[1], DecodedAttribute::Classification(vec![6]));
    }

    #[test]
    fn empty_node_decodes_to_zero_bounds() {
        let decoded = decode(task(
            Vec::new(),
            &[PointAttributeKind::PositionCartesian],
            Version::new(1, 7),
        ))
        .unwrap();

        assert_eq!(decoded.tight_bounding_box, Aabb::default());
        assert_eq!(decoded.mean, DVec3::ZERO);
        assert_eq!(decoded.estimated_spacing, 3.0);
    }

    #[test]
    fn normals_decode_to_unit_vectors() {
        let up = decode_oct16(128, 128);
        assert!((up[2] - 1.0).abs() < 0.01);

        let sphere = decode_spheremapped(128, 128);
        assert!(sphere[2] > 0.99);

        for (bx, by) in [(0, 0), (255, 30), (17, 240), (255, 255)] {
            let n = decode_oct16(bx, by);
            let length = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((length - 1.0).abs() < 1e-5);
        }
    }
}
