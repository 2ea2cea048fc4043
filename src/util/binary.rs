//! Big-endian primitives for the hand-rolled page and node codecs.
//!
//! Readers take a `&mut &[u8]` cursor and advance it; writers append
//! to a `Vec<u8>`. All multi-byte integers are big-endian on the wire.

use crate::Result;

// truncated input is corruption, every caller decodes page payloads.
fn want(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.len() < n {
        err_at!(Corrupt, msg: "short input {}/{} decoding {}", buf.len(), n, what)
    } else {
        Ok(())
    }
}

#[inline]
pub fn put_u8(buf: &mut Vec<u8>, val: u8) {
    buf.push(val);
}

#[inline]
pub fn put_u16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_be_bytes());
}

#[inline]
pub fn put_u32(buf: &mut Vec<u8>, val: u32) {
    buf.extend_from_slice(&val.to_be_bytes());
}

#[inline]
pub fn put_u64(buf: &mut Vec<u8>, val: u64) {
    buf.extend_from_slice(&val.to_be_bytes());
}

#[inline]
pub fn put_i64(buf: &mut Vec<u8>, val: i64) {
    buf.extend_from_slice(&val.to_be_bytes());
}

#[inline]
pub fn put_i32(buf: &mut Vec<u8>, val: i32) {
    buf.extend_from_slice(&val.to_be_bytes());
}

#[inline]
pub fn put_f64(buf: &mut Vec<u8>, val: f64) {
    buf.extend_from_slice(&val.to_be_bytes());
}

pub fn put_bytes(buf: &mut Vec<u8>, val: &[u8]) {
    put_u32(buf, val.len() as u32);
    buf.extend_from_slice(val);
}

macro_rules! take_int {
    ($name:ident, $type:ty, $n:expr) => {
        pub fn $name(buf: &mut &[u8]) -> Result<$type> {
            want(buf, $n, stringify!($name))?;
            let mut scratch = [0_u8; $n];
            scratch.copy_from_slice(&buf[..$n]);
            *buf = &buf[$n..];
            Ok(<$type>::from_be_bytes(scratch))
        }
    };
}

take_int!(take_u16, u16, 2);
take_int!(take_u32, u32, 4);
take_int!(take_u64, u64, 8);
take_int!(take_i64, i64, 8);
take_int!(take_i32, i32, 4);
take_int!(take_f64, f64, 8);

pub fn take_u8(buf: &mut &[u8]) -> Result<u8> {
    want(buf, 1, "take_u8")?;
    let val = buf[0];
    *buf = &buf[1..];
    Ok(val)
}

pub fn take_bytes(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let n = take_u32(buf)? as usize;
    want(buf, n, "take_bytes")?;
    let val = buf[..n].to_vec();
    *buf = &buf[n..];
    Ok(val)
}

pub fn take_slice<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    want(buf, n, "take_slice")?;
    let val = &buf[..n];
    *buf = &buf[n..];
    Ok(val)
}

#[cfg(test)]
#[path = "binary_test.rs"]
mod binary_test;
