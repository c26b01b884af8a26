//! Raw pseudo-terminal process wrapper.
//!
//! Wraps one `portable-pty` child. A background reader thread drains the
//! PTY master into a channel so the event loop can pick output up without
//! ever blocking; the master handle is kept alive for the lifetime of the
//! process to prevent the PTY from closing.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// A live PTY-backed child process.
pub struct PtyProcess {
    #[allow(dead_code)]
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output_rx: Receiver<Vec<u8>>,
    exited: bool,
}

impl PtyProcess {
    /// Open a PTY and spawn `cmd` attached to it.
    ///
    /// The reader thread starts immediately and runs until the child side
    /// of the PTY is closed.
    pub fn spawn(cmd: CommandBuilder, rows: u16, cols: u16) -> Result<Self, String> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| format!("failed to open PTY: {}", e))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| format!("failed to spawn process: {}", e))?;

        // Drop slave - we only need the master side
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| format!("failed to clone reader: {}", e))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| format!("failed to take writer: {}", e))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = reader;
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            master: pair.master,
            child,
            writer,
            output_rx: rx,
            exited: false,
        })
    }

    /// Write raw bytes to the PTY master.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Drain whatever output the reader thread has buffered. Never blocks.
    pub fn read_nonblocking(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match self.output_rx.try_recv() {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(_)) => {
                self.exited = true;
                false
            }
            Ok(None) => true,
            Err(_) => {
                self.exited = true;
                false
            }
        }
    }

    /// Force-stop and reap the child. Safe to call more than once.
    pub fn kill(&mut self) {
        if !self.exited {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.exited = true;
        }
    }

    /// OS process id, while the platform exposes one.
    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
