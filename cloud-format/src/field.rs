use serde::{Deserialize, Serialize};

/// Element type of a point field, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointFieldDatatype {
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float32 = 7,
    Float64 = 8,
}

impl PointFieldDatatype {
    pub fn from_code(code: u32) -> Option<Self> {
        use PointFieldDatatype as D;

        let datatype = match code {
            1 => D::Int8,
            2 => D::Uint8,
            3 => D::Int16,
            4 => D::Uint16,
            5 => D::Int32,
            6 => D::Uint32,
            7 => D::Float32,
            8 => D::Float64,
            _ => return None,
        };
        Some(datatype)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        use PointFieldDatatype as D;

        match self {
            D::Int8 | D::Uint8 => 1,
            D::Int16 | D::Uint16 => 2,
            D::Int32 | D::Uint32 | D::Float32 => 4,
            D::Float64 => 8,
        }
    }
}

/// One named element of a point record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointField {
    pub name: String,
    /// Byte offset within a point record.
    pub offset: u32,
    pub datatype: PointFieldDatatype,
    pub count: u32,
}

impl PointField {
    pub fn new(
        name: impl Into<String>,
        offset: u32,
        datatype: PointFieldDatatype,
        count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            offset,
            datatype,
            count,
        }
    }

    /// Byte offset one past the last byte of this field.
    pub fn end(&self) -> usize {
        self.offset as usize + self.count as usize * self.datatype.size()
    }
}

/// Name lookup over the fields of one message.
///
/// Lookup is linear and case sensitive. Duplicate names resolve to the
/// first occurrence.
#[derive(Debug, Clone, Copy)]
pub struct FieldTable<'a> {
    fields: &'a [PointField],
}

impl<'a> FieldTable<'a> {
    pub fn new(fields: &'a [PointField]) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&'a PointField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.get(name).map(|field| field.offset)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a PointField> {
        self.fields.iter()
    }
}
