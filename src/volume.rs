//! multi-page tiff reading and writing for probability and label volumes

use std::{
    fs::{self, File},
    io::{BufReader, Cursor},
    path::Path,
};

use image::{GrayImage, Luma};
use ndarray::{Array3, Array4, ArrayViewD};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{TiffEncoder, colortype},
};

use crate::{
    error::{Error, Result},
    mask::BACKGROUND,
};

/// preview value of background pixels
pub const MASK_MIN: u8 = 0;
/// preview value of object pixels
pub const MASK_MAX: u8 = u8::MAX;

/// one decoded tiff page, samples interleaved per pixel
struct Page<T> {
    width: usize,
    height: usize,
    samples_per_pixel: usize,
    data: Vec<T>,
}

fn samples_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|s| s as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|s| s as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|s| s as f32).collect(),
        DecodingResult::F16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|s| s as f32).collect(),
    }
}

fn samples_to_u16(result: DecodingResult) -> Option<Vec<u16>> {
    match result {
        DecodingResult::U8(buf) => Some(buf.into_iter().map(u16::from).collect()),
        DecodingResult::U16(buf) => Some(buf),
        _ => None,
    }
}

/// decodes every page of a tiff file, converting samples with `convert`.
fn read_pages<T>(
    path: &Path,
    mut convert: impl FnMut(DecodingResult) -> Option<Vec<T>>,
) -> Result<Vec<Page<T>>> {
    let file = BufReader::new(File::open(path)?);
    // probability maps of whole stacks easily exceed the default buffer limits
    let mut decoder = Decoder::new(file)?.with_limits(Limits::unlimited());

    let mut pages = Vec::new();
    loop {
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let data = convert(decoder.read_image()?)
            .ok_or_else(|| Error::UnsupportedSampleFormat(path.to_path_buf()))?;

        let pixels = width * height;
        if pixels == 0 || data.len() % pixels != 0 {
            return Err(Error::InvalidShape(format!(
                "page {} of {:?} holds {} samples for {}x{} pixels",
                pages.len(),
                path,
                data.len(),
                width,
                height
            )));
        }

        pages.push(Page {
            width,
            height,
            samples_per_pixel: data.len() / pixels,
            data,
        });

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let first = &pages[0];
    let (width, height, samples) = (first.width, first.height, first.samples_per_pixel);
    if let Some(index) = pages.iter().position(|page| {
        (page.width, page.height, page.samples_per_pixel) != (width, height, samples)
    }) {
        return Err(Error::InvalidShape(format!(
            "page {} of {:?} does not match the {}x{}x{} layout of the first page",
            index, path, width, height, samples
        )));
    }

    log::trace!(
        "decoded {} pages of {}x{} with {} samples from {:?}",
        pages.len(),
        width,
        height,
        samples,
        path
    );

    Ok(pages)
}

/// reads a classifier probability map as a `[plane, channel, y, x]` volume.
///
/// pages with several samples per pixel carry all channels of one plane. single-sample pages are
/// grouped `channels` at a time, each group forming one plane.
pub fn read_probability_volume(path: &Path, channels: usize) -> Result<Array4<f32>> {
    log::debug!("Loading probabilities from {:?}", path);

    let pages = read_pages(path, |result| Some(samples_to_f32(result)))?;
    let (width, height, samples) = (
        pages[0].width,
        pages[0].height,
        pages[0].samples_per_pixel,
    );
    let page_count = pages.len();
    let data: Vec<f32> = pages.into_iter().flat_map(|page| page.data).collect();

    if samples > 1 {
        let volume = Array4::from_shape_vec((page_count, height, width, samples), data)?;
        return Ok(volume.permuted_axes([0, 3, 1, 2]));
    }

    if channels == 0 || page_count % channels != 0 {
        return Err(Error::InvalidShape(format!(
            "{} single-channel pages in {:?} cannot be grouped into {} channels",
            page_count, path, channels
        )));
    }

    Ok(Array4::from_shape_vec(
        (page_count / channels, channels, height, width),
        data,
    )?)
}

/// reads a label or ground truth mask as a `[page, y, x]` volume.
pub fn read_label_volume(path: &Path) -> Result<Array3<u16>> {
    let pages = read_pages(path, samples_to_u16)?;
    let (width, height, samples) = (
        pages[0].width,
        pages[0].height,
        pages[0].samples_per_pixel,
    );
    if samples != 1 {
        return Err(Error::InvalidShape(format!(
            "expected single-channel mask pages in {:?}, got {} samples per pixel",
            path, samples
        )));
    }

    let page_count = pages.len();
    let data: Vec<u16> = pages.into_iter().flat_map(|page| page.data).collect();
    Ok(Array3::from_shape_vec((page_count, height, width), data)?)
}

/// the (height, width) of one page when a volume is flattened into `[page, y, x]`.
fn plane_dimensions(shape: &[usize]) -> Result<(usize, usize)> {
    let (height, width) = match shape {
        [] => (1, 1),
        [x] => (1, *x),
        [.., y, x] => (*y, *x),
    };

    if height == 0 || width == 0 || shape.contains(&0) {
        return Err(Error::EmptyVolume {
            shape: shape.to_vec(),
        });
    }

    Ok((height, width))
}

fn page_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::InvalidShape(format!("page side {} exceeds u32", len)))
}

/// writes a label volume as 16-bit grayscale pages. the last two axes are the page, leading axes
/// are flattened into the page sequence.
pub fn write_label_volume(path: &Path, labels: &ArrayViewD<'_, u16>) -> Result<()> {
    let (height, width) = plane_dimensions(labels.shape())?;
    let samples: Vec<u16> = labels.iter().copied().collect();

    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut buffer)?;
    for page in samples.chunks(height * width) {
        encoder.write_image::<colortype::Gray16>(page_size(width)?, page_size(height)?, page)?;
    }
    drop(encoder);

    fs::write(path, buffer.into_inner())?;
    log::debug!(
        "Saved {} label pages of {}x{} to {:?}",
        samples.len() / (height * width),
        width,
        height,
        path
    );

    Ok(())
}

/// saves a png where every pixel covered by an object on any page is set, which is a quick way
/// to eyeball a volumetric mask.
pub fn save_preview(path: &Path, labels: &ArrayViewD<'_, u16>) -> Result<()> {
    let (height, width) = plane_dimensions(labels.shape())?;
    let samples: Vec<u16> = labels.iter().copied().collect();

    let mut covered = vec![false; height * width];
    for page in samples.chunks(height * width) {
        covered
            .iter_mut()
            .zip(page)
            .for_each(|(covered, &label)| *covered |= label != BACKGROUND);
    }

    let preview = GrayImage::from_fn(page_size(width)?, page_size(height)?, |x, y| {
        let value = if covered[y as usize * width + x as usize] {
            MASK_MAX
        } else {
            MASK_MIN
        };
        Luma([value])
    });

    preview.save(path)?;
    log::debug!("Saved preview to {:?}", path);

    Ok(())
}
