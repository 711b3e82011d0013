//! A small PMT implementation, enough to carry stream tag values and PDUs.
//! The binary format is compatible with the one used by GNU Radio as of version 3.10.9.2,
//! though only the types listed in `Pmt` are supported.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex;
use std::{
    collections::BTreeMap,
    io::{Read, Write},
};
use thiserror::Error;

type StringToPmt = BTreeMap<String, Pmt>;

const TYPE_TRUE: u8 = 0x0;
const TYPE_FALSE: u8 = 0x1;
const TYPE_SYMBOL: u8 = 0x2;
const TYPE_INT32: u8 = 0x3;
const TYPE_DOUBLE: u8 = 0x4;
const TYPE_COMPLEX: u8 = 0x5;
const TYPE_NULL: u8 = 0x6;
const TYPE_PAIR: u8 = 0x7;
const TYPE_DICT: u8 = 0x9;
const TYPE_UNIFORM_VECTOR: u8 = 0xa;
const TYPE_UINT64: u8 = 0xb;
const TYPE_TUPLE: u8 = 0xc;
const TYPE_INT64: u8 = 0xd;

const UNIFORM_U8: u8 = 0x0;

/// Containers nested deeper than this are rejected while parsing
pub const MAX_DEPTH: usize = 64;
/// Items reserved up front for tuples and vectors, whatever their declared length
const PREALLOC_LIMIT: u32 = 1024;

#[derive(PartialEq, Debug, Clone)]
pub enum Pmt {
    Bool(bool),
    Symbol(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Complex(Complex<f64>),
    Null(),
    Pair(Box<Pmt>, Box<Pmt>),
    Dict(StringToPmt),
    UInt64(u64),
    Tuple(Vec<Pmt>),
    U8Vector(Vec<u8>),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Unexpected EOF while parsing")]
    UnexpectedEOF(),
    #[error("Dict entry didn't follow dict(pair(name_a, a), ...) structure")]
    MalformedDict(),
    #[error("Unknown or unsupported PMT type byte {0:#x}")]
    UnknownType(u8),
    #[error("Unsupported uniform vector item type {0:#x}")]
    UnknownVectorType(u8),
    #[error("Symbol is {0} bytes long, at most 65535 can be serialized")]
    SymbolTooLong(usize),
    #[error("Container holds {0} items, at most 2^32 - 1 can be serialized")]
    TooManyItems(usize),
    #[error("PMT nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("Reader I/O error while parsing")]
    IoError(#[from] std::io::Error),
    #[error("Symbol was not UTF-8 encoded, likely corrupt data")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

impl Pmt {
    pub fn symbol(name: &str) -> Pmt {
        Pmt::Symbol(name.to_string())
    }

    pub fn pair(a: Pmt, b: Pmt) -> Pmt {
        Pmt::Pair(Box::new(a), Box::new(b))
    }

    pub fn get_bool(&self) -> Option<bool> {
        match self {
            Pmt::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_symbol(&self) -> Option<&str> {
        match self {
            Pmt::Symbol(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_i32(&self) -> Option<i32> {
        match self {
            Pmt::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer which fits, like pmt::to_long
    pub fn get_i64(&self) -> Option<i64> {
        match self {
            Pmt::Int32(v) => Some(*v as i64),
            Pmt::Int64(v) => Some(*v),
            Pmt::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Any non-negative integer
    pub fn get_u64(&self) -> Option<u64> {
        match self {
            Pmt::Int32(v) => u64::try_from(*v).ok(),
            Pmt::Int64(v) => u64::try_from(*v).ok(),
            Pmt::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self) -> Option<f64> {
        match self {
            Pmt::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_u8vector(&self) -> Option<&[u8]> {
        match self {
            Pmt::U8Vector(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

fn parse_symbol<T: Read>(reader: &mut T) -> Result<Pmt, ParseError> {
    let len = reader.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(Pmt::Symbol(String::from_utf8(bytes)?))
}

fn parse_pair_inner<T: Read>(reader: &mut T, depth: usize) -> Result<(Pmt, Pmt), ParseError> {
    let first = parse_nested(reader, depth)?;
    let second = parse_nested(reader, depth)?;
    Ok((first, second))
}

fn parse_pair<T: Read>(reader: &mut T, depth: usize) -> Result<Pmt, ParseError> {
    let ab = parse_pair_inner(reader, depth)?;
    Ok(Pmt::pair(ab.0, ab.1))
}

fn expect_byte<T: Read>(reader: &mut T) -> Result<u8, ParseError> {
    let mut byte_buf: [u8; 1] = Default::default();
    let num_read = reader.read(&mut byte_buf)?;
    if num_read != 1 {
        // EOF or similar
        return Err(ParseError::UnexpectedEOF());
    }

    Ok(byte_buf[0])
}

fn parse_dict<T: Read>(reader: &mut T, depth: usize) -> Result<Pmt, ParseError> {
    // A dict is formed as dict(pair(name_a, a), dict(pair(name_b, b), ...))
    let mut dict = BTreeMap::new();
    loop {
        // The "pair" byte
        if expect_byte(reader)? != TYPE_PAIR {
            return Err(ParseError::MalformedDict());
        }

        let pair = parse_pair_inner(reader, depth)?;

        if let Pmt::Symbol(name) = pair.0 {
            dict.insert(name, pair.1);
        } else {
            return Err(ParseError::MalformedDict());
        }

        match expect_byte(reader)? {
            TYPE_NULL => return Ok(Pmt::Dict(dict)), // dict is over
            TYPE_DICT => continue,
            _ => return Err(ParseError::MalformedDict()),
        }
    }
}

fn parse_tuple<T: Read>(reader: &mut T, depth: usize) -> Result<Pmt, ParseError> {
    let num = reader.read_u32::<BigEndian>()?;
    // The count comes from the input, it only bounds the loop and not the allocation
    let mut vec = Vec::with_capacity(num.min(PREALLOC_LIMIT) as usize);
    for _ in 0..num {
        vec.push(parse_nested(reader, depth)?)
    }
    Ok(Pmt::Tuple(vec))
}

fn parse_uniform_vector<T: Read>(reader: &mut T) -> Result<Pmt, ParseError> {
    let item_type = expect_byte(reader)?;
    if item_type != UNIFORM_U8 {
        return Err(ParseError::UnknownVectorType(item_type));
    }
    let num = reader.read_u32::<BigEndian>()?;
    let npad = expect_byte(reader)?;
    for _ in 0..npad {
        expect_byte(reader)?;
    }
    let mut items = Vec::with_capacity(num.min(PREALLOC_LIMIT) as usize);
    reader.by_ref().take(num as u64).read_to_end(&mut items)?;
    if items.len() != num as usize {
        return Err(ParseError::UnexpectedEOF());
    }
    Ok(Pmt::U8Vector(items))
}

fn parse_pmt<T: Read>(reader: &mut T, kind: u8, depth: usize) -> Result<Pmt, ParseError> {
    match kind {
        TYPE_TRUE => Ok(Pmt::Bool(true)),
        TYPE_FALSE => Ok(Pmt::Bool(false)),
        TYPE_SYMBOL => parse_symbol(reader),
        TYPE_INT32 => Ok(Pmt::Int32(reader.read_i32::<BigEndian>()?)),
        TYPE_DOUBLE => Ok(Pmt::Double(reader.read_f64::<BigEndian>()?)),
        TYPE_COMPLEX => {
            let re = reader.read_f64::<BigEndian>()?;
            let im = reader.read_f64::<BigEndian>()?;
            Ok(Pmt::Complex(Complex::new(re, im)))
        }
        TYPE_NULL => Ok(Pmt::Null()),
        TYPE_PAIR => parse_pair(reader, depth),
        TYPE_DICT => parse_dict(reader, depth),
        TYPE_UNIFORM_VECTOR => parse_uniform_vector(reader),
        TYPE_UINT64 => Ok(Pmt::UInt64(reader.read_u64::<BigEndian>()?)),
        TYPE_TUPLE => parse_tuple(reader, depth),
        TYPE_INT64 => Ok(Pmt::Int64(reader.read_i64::<BigEndian>()?)),
        x => Err(ParseError::UnknownType(x)),
    }
}

/// Parses a PMT contained in a container at the given depth
fn parse_nested<T: Read>(reader: &mut T, depth: usize) -> Result<Pmt, ParseError> {
    if depth >= MAX_DEPTH {
        return Err(ParseError::TooDeep(MAX_DEPTH));
    }
    let byte = expect_byte(reader)?;
    parse_pmt(reader, byte, depth + 1)
}

/// The reader must be positioned at the start of a PMT
pub fn parse<T: Read>(reader: &mut T) -> Result<Pmt, ParseError> {
    let byte = expect_byte(reader)?;
    parse_pmt(reader, byte, 0)
}

/// Tries to read a PMT, but if EOF is found on the first read, None is returned
/// instead of an error.
/// The reader must be positioned at the start of a PMT
pub fn parse_maybe_eof<T: Read>(reader: &mut T) -> Result<Option<Pmt>, ParseError> {
    let byte = match expect_byte(reader) {
        Err(ParseError::UnexpectedEOF()) => return Ok(None),
        Err(e) => return Err(e),
        Ok(v) => v,
    };
    parse_pmt(reader, byte, 0).map(Some)
}

fn serialize_symbol<T: Write>(writer: &mut T, name: &str) -> Result<(), ParseError> {
    let len = u16::try_from(name.len()).map_err(|_| ParseError::SymbolTooLong(name.len()))?;
    writer.write_u8(TYPE_SYMBOL)?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(name.as_bytes())?;
    Ok(())
}

fn item_count(len: usize) -> Result<u32, ParseError> {
    u32::try_from(len).map_err(|_| ParseError::TooManyItems(len))
}

/// Writes the PMT in the binary format accepted by `parse`.
/// Empty dicts are written as null, like GNU Radio does.
pub fn serialize<T: Write>(writer: &mut T, pmt: &Pmt) -> Result<(), ParseError> {
    match pmt {
        Pmt::Bool(true) => writer.write_u8(TYPE_TRUE)?,
        Pmt::Bool(false) => writer.write_u8(TYPE_FALSE)?,
        Pmt::Symbol(name) => serialize_symbol(writer, name)?,
        Pmt::Int32(v) => {
            writer.write_u8(TYPE_INT32)?;
            writer.write_i32::<BigEndian>(*v)?;
        }
        Pmt::Int64(v) => {
            writer.write_u8(TYPE_INT64)?;
            writer.write_i64::<BigEndian>(*v)?;
        }
        Pmt::Double(v) => {
            writer.write_u8(TYPE_DOUBLE)?;
            writer.write_f64::<BigEndian>(*v)?;
        }
        Pmt::Complex(v) => {
            writer.write_u8(TYPE_COMPLEX)?;
            writer.write_f64::<BigEndian>(v.re)?;
            writer.write_f64::<BigEndian>(v.im)?;
        }
        Pmt::Null() => writer.write_u8(TYPE_NULL)?,
        Pmt::Pair(a, b) => {
            writer.write_u8(TYPE_PAIR)?;
            serialize(writer, a)?;
            serialize(writer, b)?;
        }
        Pmt::Dict(dict) => {
            for (name, value) in dict {
                writer.write_u8(TYPE_DICT)?;
                writer.write_u8(TYPE_PAIR)?;
                serialize_symbol(writer, name)?;
                serialize(writer, value)?;
            }
            writer.write_u8(TYPE_NULL)?;
        }
        Pmt::UInt64(v) => {
            writer.write_u8(TYPE_UINT64)?;
            writer.write_u64::<BigEndian>(*v)?;
        }
        Pmt::Tuple(items) => {
            writer.write_u8(TYPE_TUPLE)?;
            writer.write_u32::<BigEndian>(item_count(items.len())?)?;
            for item in items {
                serialize(writer, item)?;
            }
        }
        Pmt::U8Vector(items) => {
            writer.write_u8(TYPE_UNIFORM_VECTOR)?;
            writer.write_u8(UNIFORM_U8)?;
            writer.write_u32::<BigEndian>(item_count(items.len())?)?;
            // One byte of padding
            writer.write_u8(1)?;
            writer.write_u8(0)?;
            writer.write_all(items)?;
        }
    }
    Ok(())
}
