use std::io::{self, BufRead, BufReader, Read};

/// A reader that holds back the first lines of its source for inspection
/// and then yields the whole stream, those lines included, exactly once.
///
/// The source is never rewound, so pipes and sockets work the same as files.
#[derive(Debug)]
pub struct SampledReader<R> {
    sample: Vec<u8>,
    position: usize,
    inner: BufReader<R>,
}

impl<R: Read> SampledReader<R> {
    /// Buffer up to `lines` lines of `inner`. A line ends at `\n`, `\r\n` or a
    /// lone `\r`, and the line endings are kept as they were.
    pub fn new(inner: R, lines: usize) -> io::Result<SampledReader<R>> {
        let mut inner = BufReader::new(inner);
        let mut sample = Vec::new();

        for _ in 0..lines {
            if read_line(&mut inner, &mut sample)? == 0 {
                break;
            }
        }

        Ok(SampledReader {
            sample,
            position: 0,
            inner,
        })
    }

    /// The buffered lines, unaffected by how much has been read since.
    pub fn sample(&self) -> &[u8] {
        &self.sample
    }
}

fn read_line<R: Read>(inner: &mut BufReader<R>, sample: &mut Vec<u8>) -> io::Result<usize> {
    let start = sample.len();

    loop {
        let available = inner.fill_buf()?;
        if available.is_empty() {
            break;
        }

        let Some(index) = available.iter().position(|byte| matches!(byte, b'\n' | b'\r')) else {
            let len = available.len();
            sample.extend_from_slice(available);
            inner.consume(len);
            continue;
        };

        let terminator = available[index];
        sample.extend_from_slice(&available[..=index]);
        inner.consume(index + 1);

        if terminator == b'\r' && inner.fill_buf()?.first() == Some(&b'\n') {
            sample.push(b'\n');
            inner.consume(1);
        }
        break;
    }

    Ok(sample.len() - start)
}

impl<R: Read> Read for SampledReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.sample[self.position..];
        if remaining.is_empty() {
            return self.inner.read(buf);
        }

        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.position += len;
        Ok(len)
    }
}
