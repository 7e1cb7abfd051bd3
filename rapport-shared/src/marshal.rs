use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Size in bytes a wire type occupies once marshaled.
pub trait MarshalSize {
    fn marshal_size(&self) -> usize;
}

/// Serialize into a caller-provided buffer.
pub trait Marshal: MarshalSize {
    /// Writes `self` into the front of `buf`, returning the number of bytes
    /// written. `buf` must be at least `marshal_size()` long.
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize>;

    fn marshal(&self) -> Result<Bytes> {
        let l = self.marshal_size();
        let mut buf = BytesMut::with_capacity(l);
        buf.resize(l, 0);
        let n = self.marshal_to(&mut buf)?;
        if n != l {
            Err(Error::Other(format!(
                "marshal_to output size {n}, but expect {l}"
            )))
        } else {
            Ok(buf.freeze())
        }
    }
}

/// Deserialize from a [`Buf`], advancing it past the consumed bytes.
pub trait Unmarshal: MarshalSize {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf;
}

/// `Buf::remaining()` based length guard shared by the codecs.
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        Err(Error::ErrBufferShort)
    } else {
        Ok(())
    }
}
