//! Where training and query images come from.

use crate::entry::{class_of, dense_labels, ImageEntry};
use crate::error::{FaceRecError, Result};
use facerec_core::PixelBuffer;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 5] = ["pgm", "ppm", "png", "jpg", "jpeg"];

/// Enumerates and decodes images.
pub trait ImageSource {
    /// Names of every image under `path`, in a stable order.
    fn list(&self, path: &Path) -> Result<Vec<String>>;

    /// Decodes the image `name` as returned by [`ImageSource::list`].
    fn read(&self, name: &str) -> Result<PixelBuffer<u8>>;
}

/// Lists `path` and tags each image with the class in its file name.
///
/// Returns the entries and the number of distinct classes.
pub fn enumerate(source: &dyn ImageSource, path: &Path) -> Result<(Vec<ImageEntry>, usize)> {
    let entries = source
        .list(path)?
        .into_iter()
        .map(|name| match class_of(&name) {
            Some(class_id) => Ok(ImageEntry { name, class_id }),
            None => Err(FaceRecError::InvalidImageName(name)),
        })
        .collect::<Result<Vec<_>>>()?;
    let (_, num_classes) = dense_labels(&entries);
    Ok((entries, num_classes))
}

/// Images on disk, decoded with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

impl FsImageSource {
    pub fn new() -> Self {
        Self
    }

    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        let mut children = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        children.sort();
        for child in children {
            if child.is_dir() {
                Self::walk(&child, out)?;
            } else if is_image(&child) {
                out.push(child);
            }
        }
        Ok(())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Grayscale images (any depth, alpha dropped) keep one 8-bit channel,
/// everything else becomes RGB.
pub fn to_pixel_buffer(img: DynamicImage) -> PixelBuffer<u8> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    match img {
        DynamicImage::ImageLuma8(gray) => PixelBuffer {
            channels: 1,
            height,
            width,
            samples: gray.into_raw(),
        },
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => PixelBuffer {
            channels: 1,
            height,
            width,
            samples: img.to_luma8().into_raw(),
        },
        other => PixelBuffer {
            channels: 3,
            height,
            width,
            samples: other.to_rgb8().into_raw(),
        },
    }
}

impl ImageSource for FsImageSource {
    /// Walks `path` recursively; entries are sorted per directory.
    fn list(&self, path: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        Self::walk(path, &mut files)?;
        log::debug!("Found {} images under {}", files.len(), path.display());
        Ok(files
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    fn read(&self, name: &str) -> Result<PixelBuffer<u8>> {
        Ok(to_pixel_buffer(image::open(name)?))
    }
}

/// Decoded images held in memory, keyed by `directory/file` names.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: BTreeMap<String, PixelBuffer<u8>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, image: PixelBuffer<u8>) {
        self.images.insert(name.into(), image);
    }

    pub fn with_image(mut self, name: impl Into<String>, image: PixelBuffer<u8>) -> Self {
        self.insert(name, image);
        self
    }
}

impl ImageSource for MemoryImageSource {
    /// Names below `path`, sorted.
    fn list(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self
            .images
            .keys()
            .filter(|name| Path::new(name).starts_with(path))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> Result<PixelBuffer<u8>> {
        self.images.get(name).cloned().ok_or_else(|| {
            FaceRecError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no image named '{}'", name),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, LumaA, Rgb, RgbImage};

    fn gray(value: u8) -> PixelBuffer<u8> {
        PixelBuffer::from_samples(1, 2, 2, vec![value; 4]).unwrap()
    }

    #[test]
    fn test_memory_source_lists_by_prefix() {
        let source = MemoryImageSource::new()
            .with_image("train/2_1.pgm", gray(1))
            .with_image("train/1_1.pgm", gray(2))
            .with_image("test/1_2.pgm", gray(3));
        let names = source.list(Path::new("train")).unwrap();
        assert_eq!(names, vec!["train/1_1.pgm", "train/2_1.pgm"]);
        assert_eq!(source.read("test/1_2.pgm").unwrap(), gray(3));
        assert!(source.read("test/9_9.pgm").is_err());
    }

    #[test]
    fn test_enumerate_counts_classes() {
        let source = MemoryImageSource::new()
            .with_image("train/1_1.pgm", gray(1))
            .with_image("train/1_2.pgm", gray(2))
            .with_image("train/5_1.pgm", gray(3));
        let (entries, num_classes) = enumerate(&source, Path::new("train")).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2], ImageEntry::new("train/5_1.pgm", 5));
        assert_eq!(num_classes, 2);

        let bad = MemoryImageSource::new().with_image("train/face.pgm", gray(0));
        assert!(matches!(
            enumerate(&bad, Path::new("train")),
            Err(FaceRecError::InvalidImageName(_))
        ));
    }

    #[test]
    fn test_fs_source_walks_sorted_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("b");
        fs::create_dir(&nested).unwrap();
        GrayImage::from_pixel(3, 2, Luma([9u8]))
            .save(dir.path().join("2_1.pgm"))
            .unwrap();
        RgbImage::from_pixel(1, 1, Rgb([1u8, 2, 3]))
            .save(nested.join("1_1.png"))
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let source = FsImageSource::new();
        let names = source.list(dir.path()).unwrap();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("2_1.pgm"));
        assert!(names[1].ends_with("1_1.png"));

        let g = source.read(&names[0]).unwrap();
        assert_eq!((g.channels, g.height, g.width), (1, 2, 3));
        assert_eq!(g.samples, vec![9; 6]);

        let c = source.read(&names[1]).unwrap();
        assert_eq!(c.channels, 3);
        assert_eq!(c.samples, vec![1, 2, 3]);
    }

    #[test]
    fn test_deep_and_alpha_grayscale_keep_one_channel() {
        let deep: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(2, 3, Luma([u16::MAX]));
        let g = to_pixel_buffer(DynamicImage::ImageLuma16(deep));
        assert_eq!((g.channels, g.height, g.width), (1, 3, 2));
        assert_eq!(g.samples, vec![255; 6]);

        let alpha: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, LumaA([40, 128]));
        let g = to_pixel_buffer(DynamicImage::ImageLumaA8(alpha));
        assert_eq!(g.channels, 1);
        assert_eq!(g.samples, vec![40; 4]);
    }

    #[test]
    fn test_fs_source_reads_16_bit_png_as_gray() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_1.png");
        let deep: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(4, 4, Luma([0u16]));
        deep.save(&path).unwrap();

        let g = FsImageSource::new().read(&path.to_string_lossy()).unwrap();
        assert_eq!(g.channels, 1);
        assert_eq!(g.len(), 16);
    }
}
