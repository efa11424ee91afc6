// Copyright (c) 2023 Yan Ka, Chiu.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions, and the following disclaimer,
//    without modification, immediately at the beginning of the file.
// 2. The name of the author may not be used to endorse or promote products
//    derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE AUTHOR AND CONTRIBUTORS ``AS IS'' AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
// ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
// OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
// HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
// OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF
// SUCH DAMAGE.

use sha2::{Digest, Sha256};
use std::io::{Read, Write};

pub fn hex(bytes: impl AsRef<[u8]>) -> String {
    let slice = bytes.as_ref();
    let mut buf = String::with_capacity(slice.len() * 2);
    for byte in slice {
        const TBL: [char; 16] = [
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        buf.push(TBL[(*byte >> 4) as usize]);
        buf.push(TBL[(*byte & 0x0f) as usize]);
    }
    buf
}

pub struct DigestReader<R: Read> {
    source: R,
    digest: Sha256,
}

impl<T: Read> DigestReader<T> {
    pub fn new(source: T) -> DigestReader<T> {
        DigestReader {
            source,
            digest: Sha256::new(),
        }
    }

    pub fn consume(&self) -> [u8; 32] {
        self.digest.clone().finalize().into()
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let count = self.source.read(buf)?;
        if count != 0 {
            self.digest.update(&buf[..count]);
        }
        Ok(count)
    }
}

pub struct DigestWriter<W: Write> {
    sink: W,
    digest: Sha256,
}

impl<T: Write> DigestWriter<T> {
    pub fn new(sink: T) -> DigestWriter<T> {
        DigestWriter {
            sink,
            digest: Sha256::new(),
        }
    }

    pub fn consume(self) -> [u8; 32] {
        self.digest.finalize().into()
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.sink.write(buf)?;
        self.digest.update(&buf[..size]);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encodes_bytes() {
        assert_eq!(hex([0x00, 0xab, 0xff]), "00abff");
    }

    #[test]
    fn digest_reader_accumulates_sha256() {
        let mut reader = DigestReader::new(b"hello world".as_slice());
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(
            hex(reader.consume()),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
