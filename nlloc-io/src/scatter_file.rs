//! Binary scatter file: `Nscat: i32`, `probmax:
//! f32`, two `f32` padding words, then `Nscat` quadruples of
//! `(x, y, z, log_likelihood): f32`. Byte order is little-endian unless
//! `LOCFILES`'s swap-bytes flag selects big-endian.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::IoError;

/// One scatter sample: position plus the log-likelihood NLLoc calls
/// "pdf value" at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub log_likelihood: f32,
}

pub fn write_scatter_file<W: Write>(
    out: &mut W,
    probmax: f32,
    samples: &[ScatterSample],
    swap_bytes: bool,
) -> Result<(), IoError> {
    if swap_bytes {
        write_scatter_file_with::<BigEndian, W>(out, probmax, samples)
    } else {
        write_scatter_file_with::<LittleEndian, W>(out, probmax, samples)
    }
}

fn write_scatter_file_with<B: ByteOrder, W: Write>(
    out: &mut W,
    probmax: f32,
    samples: &[ScatterSample],
) -> Result<(), IoError> {
    out.write_i32::<B>(samples.len() as i32)?;
    out.write_f32::<B>(probmax)?;
    out.write_f32::<B>(0.0)?;
    out.write_f32::<B>(0.0)?;
    for sample in samples {
        out.write_f32::<B>(sample.x)?;
        out.write_f32::<B>(sample.y)?;
        out.write_f32::<B>(sample.z)?;
        out.write_f32::<B>(sample.log_likelihood)?;
    }
    Ok(())
}

pub fn read_scatter_file<R: Read>(input: &mut R, swap_bytes: bool) -> Result<(f32, Vec<ScatterSample>), IoError> {
    if swap_bytes {
        read_scatter_file_with::<BigEndian, R>(input)
    } else {
        read_scatter_file_with::<LittleEndian, R>(input)
    }
}

fn read_scatter_file_with<B: ByteOrder, R: Read>(input: &mut R) -> Result<(f32, Vec<ScatterSample>), IoError> {
    let nscat = input.read_i32::<B>()?;
    if nscat < 0 {
        return Err(IoError::BadScatterFile(format!("negative sample count {nscat}")));
    }
    let probmax = input.read_f32::<B>()?;
    let _pad0 = input.read_f32::<B>()?;
    let _pad1 = input.read_f32::<B>()?;
    let mut samples = Vec::with_capacity(nscat as usize);
    for _ in 0..nscat {
        let x = input.read_f32::<B>()?;
        let y = input.read_f32::<B>()?;
        let z = input.read_f32::<B>()?;
        let log_likelihood = input.read_f32::<B>()?;
        samples.push(ScatterSample { x, y, z, log_likelihood });
    }
    Ok((probmax, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> Vec<ScatterSample> {
        vec![
            ScatterSample { x: 1.0, y: 2.0, z: 3.0, log_likelihood: -4.5 },
            ScatterSample { x: -1.0, y: 0.5, z: 9.25, log_likelihood: -1.25 },
        ]
    }

    #[test]
    fn round_trips_little_endian() {
        let mut buf = Vec::new();
        write_scatter_file(&mut buf, 0.125, &sample_set(), false).unwrap();
        let (probmax, samples) = read_scatter_file(&mut buf.as_slice(), false).unwrap();
        assert_eq!(probmax, 0.125);
        assert_eq!(samples, sample_set());
    }

    #[test]
    fn round_trips_byte_swapped() {
        let mut buf = Vec::new();
        write_scatter_file(&mut buf, 0.5, &sample_set(), true).unwrap();
        let (probmax, samples) = read_scatter_file(&mut buf.as_slice(), true).unwrap();
        assert_eq!(probmax, 0.5);
        assert_eq!(samples, sample_set());
    }

    #[test]
    fn wrong_byte_order_does_not_silently_match() {
        let mut buf = Vec::new();
        write_scatter_file(&mut buf, 0.5, &sample_set(), true).unwrap();
        let (probmax, _) = read_scatter_file(&mut buf.as_slice(), false).unwrap();
        assert_ne!(probmax, 0.5);
    }

    #[test]
    fn negative_sample_count_is_rejected() {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(-1).unwrap();
        buf.write_f32::<LittleEndian>(0.0).unwrap();
        buf.write_f32::<LittleEndian>(0.0).unwrap();
        buf.write_f32::<LittleEndian>(0.0).unwrap();
        let err = read_scatter_file(&mut buf.as_slice(), false).unwrap_err();
        assert!(matches!(err, IoError::BadScatterFile(_)));
    }
}
