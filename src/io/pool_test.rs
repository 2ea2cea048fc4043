use super::*;

use std::{sync::Arc, thread};

#[test]
fn test_with_buffer() {
    let pool = BufferPool::with_stripes(4);
    assert_eq!(pool.stripes(), 4);

    let out = pool
        .with_buffer(0, |buf| {
            buf.extend_from_slice(b"abc");
            Ok(buf.len())
        })
        .unwrap();
    assert_eq!(out, 3);

    // the buffer is handed out cleared.
    pool.with_buffer(0, |buf| {
        assert!(buf.is_empty());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_pool_is_bounded_under_concurrency() {
    let pool = BufferPool::with_stripes(2);

    let mut handles = vec![];
    for t in 0..16_u64 {
        let pool = Arc::clone(&pool);
        handles.push(thread::spawn(move || {
            for i in 0..200_u64 {
                pool.with_buffer(t * 31 + i, |buf| {
                    buf.resize(1024, t as u8);
                    assert!(buf.iter().all(|b| *b == t as u8));
                    Ok(())
                })
                .unwrap();
            }
        }));
    }
    for handle in handles.into_iter() {
        handle.join().unwrap();
    }
}

#[test]
fn test_default_sizing() {
    let pool = BufferPool::new();
    assert_eq!(pool.stripes(), 2 * num_cpus::get());
}
