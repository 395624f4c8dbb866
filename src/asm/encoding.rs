//! Formatters which can read and write object files into disk.
//!
//! The [`ObjFileFormat`] trait describes an implementation of reading/writing object files into disk.
//! This module provides an implementation of the trait:
//! - [`BinaryFormat`]: The program image loaded by the Tho runner
//! - [`TextFormat`]: A readable listing of the instruction words
//!
//! Neither format stores debug symbols.

use std::fmt::Write;

use super::ObjectFile;

/// A trait defining object file formats.
pub trait ObjFileFormat {
    /// Representation of the serialized format.
    ///
    /// For binary formats, `[u8]` should be used.
    /// For text-based formats,`str` should be used.
    type Stream: ToOwned + ?Sized;
    /// Serializes into the stream format.
    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned;
    /// Deserializes from the stream format, returning `None`
    /// if an error occurred during deserialization.
    fn deserialize(i: &Self::Stream) -> Option<ObjectFile>;
}

// BINARY!
/// The binary program format.
///
/// A program is its instruction words in order, each written as 2 bytes, high byte first.
/// There is no header.
///
/// ```
/// use tho::asm::assemble_src;
/// use tho::asm::encoding::{BinaryFormat, ObjFileFormat};
///
/// let obj = assemble_src("STO 0 5\nHLT").unwrap();
/// let bytes = BinaryFormat::serialize(&obj);
/// assert_eq!(bytes, [0x30, 0x50, 0xC0, 0x00]);
///
/// let loaded = BinaryFormat::deserialize(&bytes).unwrap();
/// assert_eq!(loaded.words(), obj.words());
///
/// // half of a word:
/// assert!(BinaryFormat::deserialize(&bytes[..3]).is_none());
/// ```
pub struct BinaryFormat;

impl ObjFileFormat for BinaryFormat {
    type Stream = [u8];

    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned {
        o.words().iter()
            .flat_map(|w| w.to_be_bytes())
            .collect()
    }

    fn deserialize(bytes: &Self::Stream) -> Option<ObjectFile> {
        if bytes.len() % 2 != 0 { return None; }

        let words = bytes.chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        Some(ObjectFile::from_words(words))
    }
}

// TEXT!
/// A text-based listing of object file data.
///
/// ```text
/// THO OBJ FILE
///
/// 0011 0000 0101 0000 // 0: STO 0 5
/// 1100 0000 0000 0000 // 1: HLT
/// ```
///
/// Each line holds one word in binary, grouped by nibble.
/// Comments and blank lines are ignored when reading.
pub struct TextFormat;

const TFMT_MAGIC: &str = "THO OBJ FILE";
const TFMT_ILLEGAL: &str = "???";

impl ObjFileFormat for TextFormat {
    type Stream = str;

    fn serialize(o: &ObjectFile) -> <Self::Stream as ToOwned>::Owned {
        fn _ser(o: &ObjectFile) -> Result<String, std::fmt::Error> {
            let mut buf = String::new();

            writeln!(buf, "{TFMT_MAGIC}")?;
            writeln!(buf)?;

            for (i, m_instr) in o.instr_iter() {
                let word = o.words()[i];
                write!(buf, "{:04b} {:04b} {:04b} {:04b} // {i}: ", word >> 12, (word >> 8) & 0xF, (word >> 4) & 0xF, word & 0xF)?;
                match m_instr {
                    Ok(instr) => writeln!(buf, "{instr}")?,
                    Err(_) => writeln!(buf, "{TFMT_ILLEGAL}")?,
                }
            }

            Ok(buf)
        }

        // Writing into a String does not fail.
        _ser(o).unwrap_or_default()
    }

    fn deserialize(string: &Self::Stream) -> Option<ObjectFile> {
        // Read all of the non-empty lines:
        let mut lines = string.lines()
            .map(|l| {
                l.split_once("//").map_or(l, |(left, _)| left).trim() // remove comments
            })
            .filter(|l| !l.is_empty());
        if lines.next() != Some(TFMT_MAGIC) { return None };

        let words = lines.map(bin2u16).collect::<Option<_>>()?;
        Some(ObjectFile::from_words(words))
    }
}

fn bin2u16(line: &str) -> Option<u16> {
    let digits: String = line.split_whitespace().collect();
    match digits.len() == 16 {
        true => u16::from_str_radix(&digits, 2).ok(),
        false => None
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble_src, ObjectFile};

    use super::{BinaryFormat, ObjFileFormat, TextFormat};

    #[test]
    fn test_binary_layout() {
        let obj = assemble_src("STO 0xA 0xF\nJMP 3\nOUT").unwrap();
        assert_eq!(BinaryFormat::serialize(&obj), [0x3A, 0xF0, 0x63, 0x00, 0xB0, 0x00]);
        assert_eq!(BinaryFormat::serialize(&ObjectFile::empty()), Vec::<u8>::new());

        let loaded = BinaryFormat::deserialize(&[]).unwrap();
        assert!(loaded.is_empty());
        // debug symbols are not kept
        assert!(loaded.debug_symbols().is_none());
    }

    #[test]
    fn test_text_listing() {
        let obj = ObjectFile::from_words(vec![0x3050, 0x1000, 0xD000, 0xC000]);
        let text = TextFormat::serialize(&obj);

        let expected = [
            "THO OBJ FILE",
            "",
            "0011 0000 0101 0000 // 0: STO 0 5",
            "0001 0000 0000 0000 // 1: LDA 0",
            "1101 0000 0000 0000 // 2: ???",
            "1100 0000 0000 0000 // 3: HLT",
            "",
        ].join("\n");
        assert_eq!(text, expected);

        let loaded = TextFormat::deserialize(&text).unwrap();
        assert_eq!(loaded.words(), obj.words());
    }

    #[test]
    fn test_text_deserialize() {
        let src = "
            THO OBJ FILE
            // a comment

            0011000001010000
            1100 0000 0000 0000 // HLT
        ";
        let obj = TextFormat::deserialize(src).unwrap();
        assert_eq!(obj.words(), [0x3050, 0xC000]);

        assert!(TextFormat::deserialize("0011 0000 0101 0000").is_none(), "missing header");
        assert!(TextFormat::deserialize("THO OBJ FILE\n0011 0000 0101").is_none(), "short word");
        assert!(TextFormat::deserialize("THO OBJ FILE\n0011 0000 0101 0002").is_none(), "not binary");
    }
}
