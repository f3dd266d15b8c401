//! Tensor value codec seam.
//!
//! Tensor payloads are opaque to the document codec: it hands the
//! length-delimited sub-buffer to a [`TensorCodec`] and insists the codec
//! consumes all of it.

use bytes::{BufMut, BytesMut};

use crate::serialization::reader::ByteReader;
use crate::types::tensor::Tensor;

/// Encodes and decodes tensor payloads
pub trait TensorCodec: Send + Sync {
    /// Decode one tensor of type `spec` from `input`
    fn decode(&self, spec: &str, input: &mut ByteReader) -> Result<Tensor, String>;

    /// Append the encoding of `tensor` to `out`
    fn encode(&self, tensor: &Tensor, out: &mut BytesMut) -> Result<(), String>;
}

/// Dense cells: `u32` cell count followed by that many `f64`s
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseTensorCodec;

/// Shared instance used when no codec is configured
pub static DENSE_TENSOR_CODEC: DenseTensorCodec = DenseTensorCodec;

impl TensorCodec for DenseTensorCodec {
    fn decode(&self, spec: &str, input: &mut ByteReader) -> Result<Tensor, String> {
        let count = input.read_u32().map_err(|e| e.to_string())? as usize;
        if count.saturating_mul(8) > input.remaining() {
            return Err(format!("{} cells declared but only {} bytes left", count, input.remaining()));
        }
        let cells = (0..count)
            .map(|_| input.read_f64())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        Ok(Tensor::new(spec, cells))
    }

    fn encode(&self, tensor: &Tensor, out: &mut BytesMut) -> Result<(), String> {
        let count = u32::try_from(tensor.cells.len()).map_err(|_| "too many tensor cells".to_string())?;
        out.put_u32(count);
        tensor.cells.iter().for_each(|cell| out.put_f64(*cell));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_cells_round_trip() {
        let tensor = Tensor::new("tensor(x[3])", vec![1.0, -2.5, 3.25]);
        let mut out = BytesMut::new();
        DENSE_TENSOR_CODEC.encode(&tensor, &mut out).unwrap();
        assert_eq!(out.len(), 4 + 3 * 8);
        let mut r = ByteReader::new(out.freeze());
        assert_eq!(DENSE_TENSOR_CODEC.decode("tensor(x[3])", &mut r).unwrap(), tensor);
    }

    #[test]
    fn oversized_cell_count_is_rejected_before_reading() {
        let mut r = ByteReader::new(vec![0xff, 0xff, 0xff, 0xff, 0, 0]);
        assert!(DENSE_TENSOR_CODEC.decode("tensor(x[2])", &mut r).is_err());
    }
}
