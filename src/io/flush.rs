//! Module `flush` implement the single appender thread for the data
//! file.
//!
//! All page writes of a resource funnel through one [Appender]. Each
//! append is acknowledged with the file position after the block, so
//! offset assignment stays strictly sequential even though the actual
//! `write(2)` calls run off the committing thread. The thread holds a
//! shared lock on the file for its whole lifetime and syncs once more
//! on shutdown.

use fs2::FileExt;

use std::{ffi, fs, sync::mpsc, thread};

use crate::{util, Result};

// commands the appender thread executes; every command is
// acknowledged with the file position once it took effect.
enum Cmd {
    Append(Vec<u8>, mpsc::Sender<u64>),
    Sync(mpsc::Sender<u64>),
}

/// Handle to the appender thread of one data file.
pub struct Appender {
    loc: ffi::OsString,
    // shadow of the thread's file position, updated on every ack.
    fpos: u64,
    cmd_tx: Option<mpsc::SyncSender<Cmd>>,
    handle: Option<thread::JoinHandle<Result<u64>>>,
}

impl Appender {
    /// Spin up the appender over the existing file at `loc`; `queue`
    /// bounds how many commands may be in flight.
    pub fn open(loc: &ffi::OsStr, queue: usize) -> Result<Appender> {
        let fpos = err_at!(IOError, fs::metadata(loc))?.len();
        let fd = util::open_file_a(loc)?;
        err_at!(IOError, fd.lock_shared(), "appender lock {:?}", loc)?;

        let (cmd_tx, cmd_rx) = mpsc::sync_channel(queue);
        let handle = {
            let loc = loc.to_os_string();
            thread::spawn(move || append_loop(loc, fd, cmd_rx, fpos))
        };

        Ok(Appender {
            loc: loc.to_os_string(),
            fpos,
            cmd_tx: Some(cmd_tx),
            handle: Some(handle),
        })
    }

    /// Offset of the next append.
    pub fn fpos(&self) -> u64 {
        self.fpos
    }

    fn roundtrip(&self, cmd: impl FnOnce(mpsc::Sender<u64>) -> Cmd) -> Result<u64> {
        let (ack_tx, ack_rx) = mpsc::channel();
        let sent = match &self.cmd_tx {
            Some(cmd_tx) => cmd_tx.send(cmd(ack_tx)).is_ok(),
            None => false,
        };
        if !sent {
            return err_at!(Fatal, msg: "appender for {:?} is gone", self.loc);
        }
        match ack_rx.recv() {
            Ok(fpos) => Ok(fpos),
            // the thread bailed out with an I/O error; close() has it.
            Err(_) => err_at!(Fatal, msg: "appender for {:?} died", self.loc),
        }
    }

    /// Append `block`; returns the file position after it.
    pub fn append(&mut self, block: Vec<u8>) -> Result<u64> {
        self.fpos = self.roundtrip(|ack| Cmd::Append(block, ack))?;
        Ok(self.fpos)
    }

    /// Force everything appended so far to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.roundtrip(Cmd::Sync)?;
        Ok(())
    }

    /// Shut the thread down after a final sync; returns the file size.
    pub fn close(&mut self) -> Result<u64> {
        self.cmd_tx.take();
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(res) => res,
                Err(err) => err_at!(Fatal, msg: "appender panicked {:?}", err),
            },
            None => Ok(self.fpos),
        }
    }
}

impl Drop for Appender {
    fn drop(&mut self) {
        self.cmd_tx.take();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn append_loop(
    loc: ffi::OsString,
    mut fd: fs::File,
    cmd_rx: mpsc::Receiver<Cmd>,
    mut fpos: u64,
) -> Result<u64> {
    // runs until every sender is gone, then settles the file.
    for cmd in cmd_rx {
        match cmd {
            Cmd::Append(block, ack) => {
                util::write_buffer(&mut fd, &block, "appending data file")?;
                fpos += block.len() as u64;
                ack.send(fpos).ok();
            }
            Cmd::Sync(ack) => {
                err_at!(IOError, fd.sync_all(), "syncing {:?}", loc)?;
                ack.send(fpos).ok();
            }
        }
    }

    err_at!(IOError, fd.sync_all(), "final sync {:?}", loc)?;
    err_at!(IOError, fd.unlock(), "unlocking {:?}", loc)?;
    Ok(fpos)
}

#[cfg(test)]
#[path = "flush_test.rs"]
mod flush_test;
