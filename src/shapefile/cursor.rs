// Byte cursor and record buffer
// Typed reads and writes over a byte region with a switchable byte order

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::ShapefileError;

/// Byte order for the next reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

fn f64_bytes(n: usize) -> Result<usize, ShapefileError> {
    n.checked_mul(8).ok_or_else(|| {
        ShapefileError::CorruptRecord(format!("array of {} doubles is too large", n))
    })
}

/// Read cursor over one bounded byte region (a header or a single record).
/// Reads never go past the end of the region.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ByteCursor<'a> {
    /// Start at offset 0 in big-endian mode, the order the shapefile opens with
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            endian: Endian::Big,
        }
    }

    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<(), ShapefileError> {
        if pos > self.data.len() {
            return Err(ShapefileError::CorruptRecord(format!(
                "position {} beyond record length {}",
                pos,
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail unless `n` more bytes are available
    pub fn require(&self, n: usize) -> Result<(), ShapefileError> {
        if n > self.remaining() {
            return Err(ShapefileError::CorruptRecord(format!(
                "read of {} bytes at offset {} overruns record of {} bytes",
                n,
                self.pos,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ShapefileError> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn read_i32(&mut self) -> Result<i32, ShapefileError> {
        self.require(4)?;
        let bytes = &self.data[self.pos..self.pos + 4];
        let value = match self.endian {
            Endian::Big => BigEndian::read_i32(bytes),
            Endian::Little => LittleEndian::read_i32(bytes),
        };
        self.pos += 4;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64, ShapefileError> {
        self.require(8)?;
        let bytes = &self.data[self.pos..self.pos + 8];
        let value = match self.endian {
            Endian::Big => BigEndian::read_f64(bytes),
            Endian::Little => LittleEndian::read_f64(bytes),
        };
        self.pos += 8;
        Ok(value)
    }

    /// Bounds are checked before anything is allocated
    pub fn read_f64_array(&mut self, n: usize) -> Result<Vec<f64>, ShapefileError> {
        self.require(f64_bytes(n)?)?;
        let mut values = vec![0.0; n];
        self.read_f64_into(&mut values)?;
        Ok(values)
    }

    /// Fill `out` with consecutive doubles
    pub fn read_f64_into(&mut self, out: &mut [f64]) -> Result<(), ShapefileError> {
        let byte_len = f64_bytes(out.len())?;
        self.require(byte_len)?;
        let bytes = &self.data[self.pos..self.pos + byte_len];
        match self.endian {
            Endian::Big => BigEndian::read_f64_into(bytes, out),
            Endian::Little => LittleEndian::read_f64_into(bytes, out),
        }
        self.pos += byte_len;
        Ok(())
    }
}

/// Growable write buffer for one record or header
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    data: Vec<u8>,
    endian: Endian,
}

impl RecordBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            endian: Endian::Big,
        }
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.endian = Endian::Big;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Make room for at least `total` bytes. Returns true if the buffer had to grow.
    pub fn ensure_capacity(&mut self, total: usize) -> bool {
        if total <= self.data.capacity() {
            return false;
        }
        self.data.reserve(total - self.data.len());
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        match self.endian {
            Endian::Big => BigEndian::write_i32(&mut bytes, value),
            Endian::Little => LittleEndian::write_i32(&mut bytes, value),
        }
        self.data.extend_from_slice(&bytes);
    }

    pub fn write_f64(&mut self, value: f64) {
        let mut bytes = [0u8; 8];
        match self.endian {
            Endian::Big => BigEndian::write_f64(&mut bytes, value),
            Endian::Little => LittleEndian::write_f64(&mut bytes, value),
        }
        self.data.extend_from_slice(&bytes);
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.data.resize(self.data.len() + n, 0);
    }
}
