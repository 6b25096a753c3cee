/// The bytes behind a packet view.
///
/// Offsets are trusted: every view checks its buffer length on construction
/// and only reads at offsets inside its fixed header.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl Buffer<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Immutable(bytes) => bytes,
            Buffer::Mutable(bytes) => bytes,
        }
    }

    /// # Panics
    ///
    /// If the buffer is read-only.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write to a read-only packet buffer"),
            Buffer::Mutable(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes(self.read_array(offset))
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0_u8; N];
        out.copy_from_slice(&self.as_slice()[offset..offset + N]);
        out
    }

    /// The bytes from `offset` to the end, empty if `offset` is past the end.
    pub fn tail(&self, offset: usize) -> &[u8] {
        self.as_slice().get(offset..).unwrap_or_default()
    }

    pub fn write_u8(&mut self, offset: usize, val: u8) {
        self.as_slice_mut()[offset] = val;
    }

    pub fn write_u16(&mut self, offset: usize, val: u16) {
        self.write_array(offset, val.to_be_bytes());
    }

    pub fn write_array<const N: usize>(&mut self, offset: usize, val: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&val);
    }

    /// Write the bits of `val` selected by `mask`, keeping the others.
    pub fn write_masked(&mut self, offset: usize, mask: u8, val: u8) {
        let current = self.read_u8(offset);
        self.write_u8(offset, (current & !mask) | (val & mask));
    }
}
