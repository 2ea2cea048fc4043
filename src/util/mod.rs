//! Module implement common utility functions and types.

use cbordata::{Cbor, FromCbor, IntoCbor};

use std::{convert::TryFrom, ffi, fs, io::Write, path};

use crate::Result;

pub mod binary;

/// Encode `val` as a CBOR byte-string, used for metadata blobs like
/// the persisted resource configuration.
pub fn to_cbor_bytes<T>(val: T) -> Result<Vec<u8>>
where
    T: IntoCbor,
{
    let mut out = vec![];
    let cbor = err_at!(FailCbor, val.into_cbor())?;
    err_at!(FailCbor, cbor.encode(&mut out))?;
    Ok(out)
}

/// Decode a `T` from CBOR bytes; returns the value and the bytes
/// consumed.
pub fn cbor_from_bytes<T>(mut data: &[u8]) -> Result<(T, usize)>
where
    T: FromCbor,
{
    let (cbor, n) = err_at!(FailCbor, Cbor::decode(&mut data))?;
    let val = err_at!(FailCbor, T::from_cbor(cbor))?;
    Ok((val, n))
}

/// Write the whole buffer or fail; a short write is a fatal condition
/// for page-granular files.
pub fn write_buffer(fd: &mut fs::File, data: &[u8], what: &str) -> Result<()> {
    let n = err_at!(IOError, fd.write(data), "{}", what)?;
    if n == data.len() {
        Ok(())
    } else {
        err_at!(Fatal, msg: "{}: short write {}/{}", what, n, data.len())
    }
}

/// Write `data` and force it to durable storage.
pub fn sync_write(fd: &mut fs::File, data: &[u8]) -> Result<usize> {
    write_buffer(fd, data, "sync_write")?;
    err_at!(IOError, fd.sync_all())?;
    Ok(data.len())
}

/// Start `loc` fresh in append mode, wiping any prior file and
/// creating missing parent directories.
pub fn create_file_a(loc: &ffi::OsStr) -> Result<fs::File> {
    let path = path::Path::new(loc);
    if let Some(parent) = path.parent() {
        err_at!(IOError, fs::create_dir_all(parent))?;
    }
    fs::remove_file(path).ok(); // NOTE: ignore remove errors.

    let mut opts = fs::OpenOptions::new();
    err_at!(
        IOError,
        opts.append(true).create_new(true).open(path),
        "creating {:?}",
        loc
    )
}

/// Open an existing file in append mode.
pub fn open_file_a(loc: &ffi::OsStr) -> Result<fs::File> {
    let mut opts = fs::OpenOptions::new();
    err_at!(
        IOError,
        opts.append(true).open(path::Path::new(loc)),
        "appending {:?}",
        loc
    )
}

/// Open an existing file for reading.
pub fn open_file_r(loc: &ffi::OsStr) -> Result<fs::File> {
    err_at!(
        IOError,
        fs::File::open(path::Path::new(loc)),
        "reading {:?}",
        loc
    )
}

/// Open `loc` read-write without truncating, creating it on demand;
/// suits files written at fixed offsets like the revision sidecar.
pub fn open_file_w(loc: &ffi::OsStr) -> Result<fs::File> {
    let mut opts = fs::OpenOptions::new();
    err_at!(
        IOError,
        opts.read(true)
            .write(true)
            .create(true)
            .open(path::Path::new(loc)),
        "read-write {:?}",
        loc
    )
}

/// Round `off` up to the next multiple of `align`. `align` must be a
/// power of two.
#[inline]
pub fn align_up(off: u64, align: u64) -> u64 {
    (off + align - 1) & !(align - 1)
}

/// Fold a 128-bit city-hash digest into u64.
#[inline]
pub fn fold_digest(digest: u128) -> u64 {
    ((digest >> 64) as u64) ^ ((digest & 0xFFFFFFFFFFFFFFFF) as u64)
}

pub fn to_u32(val: usize) -> Result<u32> {
    err_at!(FailConvert, u32::try_from(val))
}

pub fn to_usize(val: u64) -> Result<usize> {
    err_at!(FailConvert, usize::try_from(val))
}
