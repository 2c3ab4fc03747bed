// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::ptrace;
use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::unistd::Pid;
use std::io::IoSliceMut;

/// Copy up to `len` bytes from `addr` in the address space of the stopped
/// task `tid`.
///
/// A vectored cross-process read is attempted first; when the kernel
/// refuses (old kernel, yama restrictions) the read falls back to
/// word-granular peeks, with the length rounded down to the word size.
/// Partial reads are not an error: the returned buffer holds exactly what
/// was obtained, and an empty buffer means the page is unmapped or the
/// task died.
pub fn read_mem(tid: Pid, addr: u64, len: usize) -> Vec<u8> {
    if len == 0 {
        return Vec::new();
    }

    let mut buf = vec![0u8; len];
    let mut local = [IoSliceMut::new(&mut buf)];
    let remote = [RemoteIoVec {
        base: addr as usize,
        len,
    }];
    match process_vm_readv(tid, &mut local, &remote) {
        Ok(transferred) if transferred > 0 => {
            buf.truncate(transferred);
            return buf;
        }
        Ok(_) => return Vec::new(),
        Err(e) => {
            log::debug!("process_vm_readv({tid}, {addr:#x}, {len}) failed: {e}, trying peeks");
        }
    }

    read_mem_by_words(tid, addr, len)
}

fn read_mem_by_words(tid: Pid, addr: u64, len: usize) -> Vec<u8> {
    const WORD: usize = std::mem::size_of::<libc::c_long>();
    let mut out = Vec::with_capacity(len - len % WORD);
    let mut offset = 0usize;
    while offset + WORD <= len {
        match ptrace::read(tid, (addr as usize + offset) as ptrace::AddressType) {
            Ok(word) => out.extend_from_slice(&word.to_ne_bytes()),
            Err(_) => break,
        }
        offset += WORD;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_own_memory() {
        let payload: Vec<u8> = (0..64u8).collect();
        let got = read_mem(Pid::this(), payload.as_ptr() as u64, payload.len());
        assert_eq!(got, payload);
    }

    #[test]
    fn test_read_unmapped_returns_empty() {
        // The first page is never mapped.
        let got = read_mem(Pid::this(), 0x10, 32);
        assert!(got.is_empty());
    }

    #[test]
    fn test_read_zero_len() {
        assert!(read_mem(Pid::this(), 0x1000, 0).is_empty());
    }
}
