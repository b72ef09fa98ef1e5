//! Binary program images.
//!
//! An image is a flat sequence of 8-byte signed words in native byte order,
//! one word per [`Cell`]. There is no header, magic number or length prefix.
//! This module is the only place that touches files on behalf of the VM;
//! [`VM::load`](crate::virtual_machine::vm::VM::load) only ever sees cells.

use crate::virtual_machine::Cell;
use crate::virtual_machine::errors::{LoadFailure, VMError};
use std::fs;
use std::path::Path;

/// Bytes per cell in a binary image.
pub const CELL_SIZE: usize = size_of::<Cell>();

/// Converts raw image bytes into cells.
///
/// Rejects an empty buffer and any length that is not a whole number of cells.
pub fn decode_image(bytes: &[u8]) -> Result<Vec<Cell>, VMError> {
    if bytes.is_empty() {
        return Err(VMError::LoadError(LoadFailure::Empty));
    }
    if bytes.len() % CELL_SIZE != 0 {
        return Err(VMError::LoadError(LoadFailure::Misaligned {
            len: bytes.len(),
            cell_size: CELL_SIZE,
        }));
    }

    let mut cells = Vec::with_capacity(bytes.len() / CELL_SIZE);
    for chunk in bytes.chunks_exact(CELL_SIZE) {
        let mut word = [0u8; CELL_SIZE];
        word.copy_from_slice(chunk);
        cells.push(Cell::from_ne_bytes(word));
    }
    Ok(cells)
}

/// Serializes cells into image bytes.
pub fn encode_image(cells: &[Cell]) -> Vec<u8> {
    cells.iter().flat_map(|cell| cell.to_ne_bytes()).collect()
}

/// Reads and decodes an image file.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Vec<Cell>, VMError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    decode_image(&bytes)
}

/// Encodes `cells` and writes them to `path`, replacing any existing file.
pub fn write_image<P: AsRef<Path>>(path: P, cells: &[Cell]) -> Result<(), VMError> {
    let path = path.as_ref();
    fs::write(path, encode_image(cells)).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, err: std::io::Error) -> VMError {
    VMError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::vm::{VM, VmConfig};

    #[test]
    fn decode_native_words() {
        let mut bytes = Vec::new();
        for v in [0x01i64, -5, 0xFF] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        assert_eq!(decode_image(&bytes).unwrap(), vec![0x01, -5, 0xFF]);
    }

    #[test]
    fn decode_rejects_empty() {
        assert_eq!(
            decode_image(&[]),
            Err(VMError::LoadError(LoadFailure::Empty))
        );
    }

    #[test]
    fn decode_rejects_partial_words() {
        for len in [1, 6, 7, 9, 15] {
            let bytes = vec![0u8; len];
            assert_eq!(
                decode_image(&bytes),
                Err(VMError::LoadError(LoadFailure::Misaligned {
                    len,
                    cell_size: CELL_SIZE
                }))
            );
        }
    }

    #[test]
    fn misaligned_image_never_reaches_program_memory() {
        let mut vm = VM::new(VmConfig::default().with_mem_size(4));
        vm.load(&[0x01, 0x07, 0xFF]).unwrap();

        let bytes = [0x01u8, 0x05, 0x01, 0x03, 0x10, 0xFF];
        let result = decode_image(&bytes).and_then(|cells| vm.load(&cells));

        assert!(matches!(
            result,
            Err(VMError::LoadError(LoadFailure::Misaligned { len: 6, .. }))
        ));
        assert_eq!(vm.program_memory().as_slice(), &[0x01, 0x07, 0xFF, 0]);
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let cells = [0x01, i64::MIN, i64::MAX, 0, -1];
        let bytes = encode_image(&cells);
        assert_eq!(bytes.len(), cells.len() * CELL_SIZE);
        assert_eq!(decode_image(&bytes).unwrap(), cells);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.bin");
        write_image(&path, &[0x01, 0x05, 0xFF]).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 24);
        assert_eq!(read_image(&path).unwrap(), vec![0x01, 0x05, 0xFF]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        match read_image(&path) {
            Err(VMError::Io { path: p, .. }) => assert!(p.ends_with("missing.bin")),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
