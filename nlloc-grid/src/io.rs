//! Textual header sidecar and binary buffer I/O for travel-time grids.
//!
//! Mirrors the split `rinex` makes between `ionex::header` (text sidecar
//! parsing/formatting) and `ionex::parsing`/`formatting` (the record
//! bytes themselves), generalized from IONEX's TEC maps to this engine's
//! travel-time/velocity/PDF grids.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::cascading::{Buffer, CascadingGrid};
use crate::desc::{ElementType, GridDesc, GridType};
use crate::linspace::Linspace;
use crate::GridError;

impl GridType {
    fn header_token(&self) -> &'static str {
        match self {
            Self::Time3D => "TIME",
            Self::Time2D => "TIME2D",
            Self::Velocity => "VELOCITY",
            Self::SlownessSquared => "SLOW2",
            Self::SlownessLength => "SLOW_LEN",
            Self::ProbDensity => "PROB_DENSITY",
            Self::Misfit => "MISFIT",
            Self::Likelihood => "LIKELIHOOD",
            Self::Length => "LENGTH",
            Self::Angles => "ANGLE",
        }
    }

    fn from_header_token(tok: &str) -> Result<Self, GridError> {
        match tok {
            "TIME" => Ok(Self::Time3D),
            "TIME2D" => Ok(Self::Time2D),
            "VELOCITY" => Ok(Self::Velocity),
            "SLOW2" => Ok(Self::SlownessSquared),
            "SLOW_LEN" => Ok(Self::SlownessLength),
            "PROB_DENSITY" => Ok(Self::ProbDensity),
            "MISFIT" => Ok(Self::Misfit),
            "LIKELIHOOD" => Ok(Self::Likelihood),
            "LENGTH" => Ok(Self::Length),
            "ANGLE" => Ok(Self::Angles),
            other => Err(GridError::BadHeader(format!("unknown chr_type '{other}'"))),
        }
    }
}

/// Parses the fixed-order whitespace-separated header sidecar described
/// in: `Nx Ny Nz x0 y0 z0 dx dy dz chr_type element_type`,
/// followed for 2-D grids by a station location line.
pub fn parse_header(text: &str, title: &str) -> Result<GridDesc, GridError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let first = lines
    .next()
    .ok_or_else(|| GridError::BadHeader("empty header".to_string()))?;
    let tokens: Vec<&str> = first.split_whitespace().collect();
    if tokens.len() < 11 {
        return Err(GridError::BadHeader(format!(
                    "expected 11 tokens on the header line, got {}",
                    tokens.len()
        )));
    }
    let parse_f = |s: &str| -> Result<f64, GridError> {
        s.parse::<f64>()
        .map_err(|_| GridError::BadHeader(format!("bad numeric token '{s}'")))
    };
    let parse_u = |s: &str| -> Result<usize, GridError> {
        s.parse::<usize>()
        .map_err(|_| GridError::BadHeader(format!("bad integer token '{s}'")))
    };

    let nx = parse_u(tokens[0])?;
    let ny = parse_u(tokens[1])?;
    let nz = parse_u(tokens[2])?;
    let x0 = parse_f(tokens[3])?;
    let y0 = parse_f(tokens[4])?;
    let z0 = parse_f(tokens[5])?;
    let dx = parse_f(tokens[6])?;
    let dy = parse_f(tokens[7])?;
    let dz = parse_f(tokens[8])?;
    let grid_type = GridType::from_header_token(tokens[9])?;
    let element = match tokens[10] {
        "FLOAT" => ElementType::Float32,
        "DOUBLE" => ElementType::FloatOrDouble { high_precision: true },
        "ANGLE" => ElementType::TakeOffAngles,
        other => return Err(GridError::BadHeader(format!("unknown element_type '{other}'"))),
    };

    let station_xyz = if grid_type == GridType::Time2D {
        let station_line = lines
        .next()
        .ok_or_else(|| GridError::BadHeader("missing 2-D station line".to_string()))?;
        let st: Vec<&str> = station_line.split_whitespace().collect();
        // station_label lat long depth x y z elev
        if st.len() < 7 {
            return Err(GridError::BadHeader("malformed 2-D station line".to_string()));
        }
        Some((parse_f(st[4])?, parse_f(st[5])?, parse_f(st[6])?))
    } else {
        None
    };

    Ok(GridDesc {
            title: title.to_string(),
            x: Linspace::new(x0, dx, nx)?,
            y: Linspace::new(y0, dy, ny.max(1))?,
            z: Linspace::new(z0, dz, nz)?,
            grid_type,
            element,
            cascade_levels: Vec::new(),
            big_endian: false,
            station_xyz,
    })
}

/// Formats the header sidecar back out, the inverse of [`parse_header`].
pub fn format_header(desc: &GridDesc) -> String {
    let element_token = match desc.element {
        ElementType::Float32 => "FLOAT",
        ElementType::FloatOrDouble { high_precision: true } => "DOUBLE",
        ElementType::FloatOrDouble { high_precision: false } => "FLOAT",
        ElementType::TakeOffAngles => "ANGLE",
    };
    let mut out = format!(
        "{} {} {} {} {} {} {} {} {} {} {}\n",
        desc.x.count(),
        desc.y.count(),
        desc.z.count(),
        desc.x.origin,
        desc.y.origin,
        desc.z.origin,
        desc.x.step,
        desc.y.step,
        desc.z.step,
        desc.grid_type.header_token(),
        element_token,
    );
    if let Some((x, y, z)) = desc.station_xyz {
        out.push_str(&format!("STA 0.0 0.0 0.0 {x} {y} {z} 0.0\n"));
    }
    out
}

/// Reads the binary buffer for `desc` from `reader`, honoring
/// `desc.big_endian`: a header flag declares the source byte order,
/// and a reader may request byte swapping on load.
pub fn read_buffer<R: Read>(desc: &GridDesc, mut reader: R) -> Result<CascadingGrid, GridError> {
    let n = desc.element_count();
    let buffer = match desc.element {
        ElementType::Float32 | ElementType::FloatOrDouble { high_precision: false } => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                let value = if desc.big_endian {
                    reader.read_f32::<BigEndian>()
                } else {
                    reader.read_f32::<LittleEndian>()
                }
                .map_err(|e| GridError::Io(e.to_string()))?;
                v.push(value);
            }
            Buffer::F32(v)
        },
        ElementType::FloatOrDouble { high_precision: true } => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                let value = if desc.big_endian {
                    reader.read_f64::<BigEndian>()
                } else {
                    reader.read_f64::<LittleEndian>()
                }
                .map_err(|e| GridError::Io(e.to_string()))?;
                v.push(value);
            }
            Buffer::F64(v)
        },
        ElementType::TakeOffAngles => {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                let (azimuth, dip, quality) = if desc.big_endian {
                    (
                        reader.read_u16::<BigEndian>(),
                        reader.read_u16::<BigEndian>(),
                        reader.read_u16::<BigEndian>(),
                    )
                } else {
                    (
                        reader.read_u16::<LittleEndian>(),
                        reader.read_u16::<LittleEndian>(),
                        reader.read_u16::<LittleEndian>(),
                    )
                };
                let azimuth = azimuth.map_err(|e| GridError::Io(e.to_string()))?;
                let dip = dip.map_err(|e| GridError::Io(e.to_string()))?;
                let quality = quality.map_err(|e| GridError::Io(e.to_string()))?;
                v.push((
                        azimuth as f32 / 100.0,
                        (dip as f32 / 100.0) - 180.0,
                        quality.min(255) as u8,
                ));
            }
            Buffer::Angles(v)
        },
    };
    CascadingGrid::from_buffer(desc.clone(), buffer)
}

/// Writes `grid`'s buffer out, honoring `grid.desc.big_endian`.
pub fn write_buffer<W: Write>(grid: &CascadingGrid, mut writer: W) -> Result<(), GridError> {
    let big_endian = grid.desc.big_endian;
    match grid.buffer() {
        Buffer::F32(v) => {
            for value in v {
                if big_endian {
                    writer.write_f32::<BigEndian>(*value)
                } else {
                    writer.write_f32::<LittleEndian>(*value)
                }
                .map_err(|e| GridError::Io(e.to_string()))?;
            }
        },
        Buffer::F64(v) => {
            for value in v {
                if big_endian {
                    writer.write_f64::<BigEndian>(*value)
                } else {
                    writer.write_f64::<LittleEndian>(*value)
                }
                .map_err(|e| GridError::Io(e.to_string()))?;
            }
        },
        Buffer::Angles(v) => {
            for (az, dip, q) in v {
                let azimuth = (*az * 100.0) as u16;
                let dip = ((*dip + 180.0) * 100.0) as u16;
                let quality = *q as u16;
                let result = if big_endian {
                    writer
                    .write_u16::<BigEndian>(azimuth)
                    .and_then(|_| writer.write_u16::<BigEndian>(dip))
                    .and_then(|_| writer.write_u16::<BigEndian>(quality))
                } else {
                    writer
                    .write_u16::<LittleEndian>(azimuth)
                    .and_then(|_| writer.write_u16::<LittleEndian>(dip))
                    .and_then(|_| writer.write_u16::<LittleEndian>(quality))
                };
                result.map_err(|e| GridError::Io(e.to_string()))?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_desc(big_endian: bool) -> GridDesc {
        GridDesc {
            title: "STA.P.TIME".to_string(),
            x: Linspace::new(0.0, 1.0, 4).unwrap(),
            y: Linspace::new(0.0, 1.0, 4).unwrap(),
            z: Linspace::new(0.0, 1.0, 4).unwrap(),
            grid_type: GridType::Time3D,
            element: ElementType::Float32,
            cascade_levels: vec![],
            big_endian,
            station_xyz: None,
        }
    }

    #[test]
    fn header_round_trip() {
        let desc = sample_desc(false);
        let text = format_header(&desc);
        let parsed = parse_header(&text, &desc.title).unwrap();
        assert_eq!(parsed.x, desc.x);
        assert_eq!(parsed.y, desc.y);
        assert_eq!(parsed.z, desc.z);
        assert_eq!(parsed.grid_type, desc.grid_type);
    }

    #[test]
    fn buffer_round_trip_little_endian() {
        let desc = sample_desc(false);
        let mut grid = CascadingGrid::allocate(desc.clone()).unwrap();
        for i in 0..desc.element_count() {
            grid.write((i % 4) as i64, 0, 0, i as f64 * 0.5).ok();
        }
        let mut bytes = Vec::new();
        write_buffer(&grid, &mut bytes).unwrap();
        let round = read_buffer(&desc, Cursor::new(bytes)).unwrap();
        assert_eq!(round.buffer(), grid.buffer());
    }

    #[test]
    fn buffer_round_trip_big_endian() {
        let desc = sample_desc(true);
        let grid = CascadingGrid::allocate(desc.clone()).unwrap();
        let mut bytes = Vec::new();
        write_buffer(&grid, &mut bytes).unwrap();
        let round = read_buffer(&desc, Cursor::new(bytes)).unwrap();
        assert_eq!(round.buffer(), grid.buffer());
    }
}
