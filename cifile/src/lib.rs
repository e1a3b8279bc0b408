use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::fs::File;
use std::io::prelude::*;
use std::io::{self, BufReader, BufWriter};
use std::mem;
use std::path::Path;
use util::{bytes_to_words, words_to_bytes, Endian};

/// A compiled program: text segment words, data segment bytes and the word
/// offset of `main` within the text segment.
///
/// The serialized layout is `main_offset`, `text_size`, `data_size` (all
/// 32-bit little-endian ints, sizes in bytes), followed by the raw text and
/// data bytes.
#[derive(Debug, PartialEq)]
pub struct Image {
    main_offset: i32,
    text: Vec<i32>,
    data: Vec<u8>,
}

impl Image {
    pub fn from(main_offset: i32, text: Vec<i32>, data: Vec<u8>) -> Image {
        Image {
            main_offset,
            text,
            data,
        }
    }

    pub fn main_offset(&self) -> i32 {
        self.main_offset
    }

    pub fn text(&self) -> &[i32] {
        &self.text[..]
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn required_size(&self) -> usize {
        mem::size_of::<i32>() * 3 + self.text.len() * 4 + self.data.len()
    }
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

pub fn read<R: Read>(reader: &mut R) -> io::Result<Image> {
    let main_offset = reader.read_i32::<Endian>()?;
    let text_size = reader.read_i32::<Endian>()?;
    let data_size = reader.read_i32::<Endian>()?;

    let text_size =
        usize::try_from(text_size).map_err(|_| invalid_data("negative text size"))?;
    let data_size =
        usize::try_from(data_size).map_err(|_| invalid_data("negative data size"))?;

    let mut text_bytes = vec![0; text_size];
    let mut data = vec![0; data_size];

    reader.read_exact(&mut text_bytes)?;
    reader.read_exact(&mut data)?;

    let text =
        bytes_to_words(&text_bytes).ok_or_else(|| invalid_data("ragged text segment"))?;

    Ok(Image::from(main_offset, text, data))
}

pub fn write<W: Write>(writer: &mut W, image: &Image) -> io::Result<()> {
    writer.write_i32::<Endian>(image.main_offset)?;
    writer.write_i32::<Endian>(image.text.len() as i32 * 4)?;
    writer.write_i32::<Endian>(image.data.len() as i32)?;
    writer.write_all(&words_to_bytes(&image.text))?;
    writer.write_all(&image.data[..])?;
    Ok(())
}

pub trait ReadImageExt: Read + Sized {
    fn read_image(&mut self) -> io::Result<Image> {
        read(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub trait WriteImageExt: Write + Sized {
    fn write_image(&mut self, image: &Image) -> io::Result<()> {
        write(self, image)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Image> {
    BufReader::new(File::open(path)?).read_image()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> io::Result<()> {
    BufWriter::new(File::create(path)?).write_image(image)
}

#[cfg(test)]
mod test;
