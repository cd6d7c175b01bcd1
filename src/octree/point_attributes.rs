use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointAttributeType {
    pub ordinal: usize,
    pub name: &'static str,
    pub size: u16,
}

macro_rules! create_data_type {
    ($const_name:ident, $ord:expr, $name:expr, $size:expr) => {
        pub static $const_name: PointAttributeType = PointAttributeType {
            ordinal: $ord,
            name: $name,
            size: $size,
        };
    };
}

create_data_type!(DATA_TYPE_DOUBLE, 0, "double", 8);
create_data_type!(DATA_TYPE_FLOAT, 1, "float", 4);
create_data_type!(DATA_TYPE_INT8, 2, "int8", 1);
create_data_type!(DATA_TYPE_UINT8, 3, "uint8", 1);
create_data_type!(DATA_TYPE_INT16, 4, "int16", 2);
create_data_type!(DATA_TYPE_UINT16, 5, "uint16", 2);
create_data_type!(DATA_TYPE_INT32, 6, "int32", 4);
create_data_type!(DATA_TYPE_UINT32, 7, "uint32", 4);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown point attribute: {0}")]
    UnknownAttribute(String),

    #[error("Point attribute schema is empty")]
    Empty,
}

/// Every attribute a point record may carry.
///
/// Only some kinds produce a renderable buffer; the others are part of the
/// record layout and are skipped by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointAttributeKind {
    PositionCartesian,
    ColorPacked,
    Intensity,
    Classification,
    NormalSpheremapped,
    NormalOct16,
    Normal,
    Indices,
    Spacing,
    NormalFloats,
    ColorFloats1,
    ColorFloats255,
    Filler,
    ReturnNumber,
    NumberOfReturns,
    SourceId,
    GpsTime,
}

impl PointAttributeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        use PointAttributeKind::*;

        let kind = match name {
            "POSITION_CARTESIAN" => PositionCartesian,
            "COLOR_PACKED" | "RGBA_PACKED" => ColorPacked,
            "INTENSITY" => Intensity,
            "CLASSIFICATION" => Classification,
            "NORMAL_SPHEREMAPPED" => NormalSpheremapped,
            "NORMAL_OCT16" => NormalOct16,
            "NORMAL" => Normal,
            "INDICES" => Indices,
            "SPACING" => Spacing,
            "NORMAL_FLOATS" => NormalFloats,
            "COLOR_FLOATS_1" => ColorFloats1,
            "COLOR_FLOATS_255" => ColorFloats255,
            "FILLER" | "FILLER_1B" => Filler,
            "RETURN_NUMBER" => ReturnNumber,
            "NUMBER_OF_RETURNS" => NumberOfReturns,
            "SOURCE_ID" => SourceId,
            "GPS_TIME" => GpsTime,
            _ => return None,
        };

        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        use PointAttributeKind::*;

        match self {
            PositionCartesian => "POSITION_CARTESIAN",
            ColorPacked => "COLOR_PACKED",
            Intensity => "INTENSITY",
            Classification => "CLASSIFICATION",
            NormalSpheremapped => "NORMAL_SPHEREMAPPED",
            NormalOct16 => "NORMAL_OCT16",
            Normal => "NORMAL",
            Indices => "INDICES",
            Spacing => "SPACING",
            NormalFloats => "NORMAL_FLOATS",
            ColorFloats1 => "COLOR_FLOATS_1",
            ColorFloats255 => "COLOR_FLOATS_255",
            Filler => "FILLER",
            ReturnNumber => "RETURN_NUMBER",
            NumberOfReturns => "NUMBER_OF_RETURNS",
            SourceId => "SOURCE_ID",
            GpsTime => "GPS_TIME",
        }
    }

    /// Element type and component count of the stored record field.
    pub fn layout(&self) -> (&'static PointAttributeType, u16) {
        use PointAttributeKind::*;

        match self {
            PositionCartesian => (&DATA_TYPE_UINT32, 3),
            ColorPacked => (&DATA_TYPE_UINT8, 4),
            Intensity => (&DATA_TYPE_UINT16, 1),
            Classification => (&DATA_TYPE_UINT8, 1),
            NormalSpheremapped => (&DATA_TYPE_UINT8, 2),
            NormalOct16 => (&DATA_TYPE_UINT8, 2),
            Normal => (&DATA_TYPE_FLOAT, 3),
            Indices => (&DATA_TYPE_UINT32, 1),
            Spacing => (&DATA_TYPE_FLOAT, 1),
            NormalFloats => (&DATA_TYPE_FLOAT, 3),
            ColorFloats1 => (&DATA_TYPE_FLOAT, 3),
            ColorFloats255 => (&DATA_TYPE_FLOAT, 3),
            Filler => (&DATA_TYPE_UINT8, 1),
            ReturnNumber => (&DATA_TYPE_UINT8, 1),
            NumberOfReturns => (&DATA_TYPE_UINT8, 1),
            SourceId => (&DATA_TYPE_UINT16, 1),
            GpsTime => (&DATA_TYPE_DOUBLE, 1),
        }
    }

    pub fn normalized(&self) -> bool {
        matches!(self, PointAttributeKind::ColorPacked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointAttribute {
    pub kind: PointAttributeKind,
    pub r#type: &'static PointAttributeType,
    pub num_elements: u16,
    pub byte_size: u16,
    pub normalized: bool,
}

impl PointAttribute {
    pub fn new(kind: PointAttributeKind) -> Self {
        let (r#type, num_elements) = kind.layout();
        Self {
            kind,
            r#type,
            num_elements,
            byte_size: r#type.size * num_elements,
            normalized: kind.normalized(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Layout of one point record: attributes in storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointAttributes {
    pub attributes: Vec<PointAttribute>,
    pub byte_size: u16,
}

impl PointAttributes {
    pub fn new(kinds: impl IntoIterator<Item = PointAttributeKind>) -> Result<Self, SchemaError> {
        let attributes: Vec<PointAttribute> = kinds.into_iter().map(PointAttribute::new).collect();
        if attributes.is_empty() {
            return Err(SchemaError::Empty);
        }
        let byte_size = attributes.iter().map(|a| a.byte_size).sum();

        Ok(Self {
            attributes,
            byte_size,
        })
    }

    /// Build the schema from the attribute names listed in `cloud.js`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, SchemaError> {
        let kinds = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                PointAttributeKind::from_name(name)
                    .ok_or_else(|| SchemaError::UnknownAttribute(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(kinds)
    }

    pub fn contains(&self, kind: PointAttributeKind) -> bool {
        self.attributes.iter().any(|a| a.kind == kind)
    }

    /// Number of whole records in `byte_len` bytes, or `None` when the length
    /// is not a multiple of the record size.
    pub fn num_points(&self, byte_len: usize) -> Option<usize> {
        let record = self.byte_size as usize;
        if record == 0 || byte_len % record != 0 {
            return None;
        }
        Some(byte_len / record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_is_sum_of_fields() {
        let schema =
            PointAttributes::from_names(&["POSITION_CARTESIAN", "COLOR_PACKED", "INTENSITY"])
                .unwrap();
        assert_eq!(schema.byte_size, 12 + 4 + 2);
        assert!(schema.contains(PointAttributeKind::ColorPacked));
        assert!(schema.attributes[1].normalized);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = PointAttributes::from_names(&["POSITION_CARTESIAN", "WAVEFORM"]).unwrap_err();
        assert_eq!(err, SchemaError::UnknownAttribute("WAVEFORM".into()));
        assert_eq!(
            PointAttributes::from_names::<&str>(&[]).unwrap_err(),
            SchemaError::Empty
        );
    }

    #[test]
    fn num_points_requires_whole_records() {
        let schema = PointAttributes::new([PointAttributeKind::PositionCartesian]).unwrap();
        assert_eq!(schema.num_points(120), Some(10));
        assert_eq!(schema.num_points(0), Some(0));
        assert_eq!(schema.num_points(121), None);
    }
}
