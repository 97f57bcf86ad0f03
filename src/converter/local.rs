//! In-process AVIF encoding on the `image` crate

use super::LocalConverter;
use crate::error::ConvertError;
use std::path::{Path, PathBuf};

/// Local encoder: decode with `image`, encode with its AVIF (ravif) backend
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAvifConverter;

impl ImageAvifConverter {
    pub fn new() -> Self {
        Self
    }
}

impl LocalConverter for ImageAvifConverter {
    fn is_available(&self) -> bool {
        cfg!(feature = "local-avif")
    }

    fn convert(
        &self,
        source: &Path,
        destination: &Path,
        quality: u8,
        speed: u8,
    ) -> Result<(), ConvertError> {
        #[cfg(feature = "local-avif")]
        {
            encode_avif(source, destination, quality, speed)
        }

        #[cfg(not(feature = "local-avif"))]
        {
            let _ = (source, destination, quality, speed);
            Err(ConvertError::Unsupported)
        }
    }
}

/// Sibling path the encoder writes to before the final rename
pub(super) fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!("{}.part", name))
}

#[cfg(feature = "local-avif")]
fn encode_avif(
    source: &Path,
    destination: &Path,
    quality: u8,
    speed: u8,
) -> Result<(), ConvertError> {
    use image::codecs::avif::AvifEncoder;
    use image::DynamicImage;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};

    let img = image::open(source).map_err(|e| ConvertError::Decode {
        path: source.to_path_buf(),
        source: e,
    })?;

    // The AVIF encoder only takes 8-bit RGB(A)
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    // Write next to the destination and rename, so an interrupted encode never
    // leaves a file that a rescan would count as converted
    let partial = partial_path(destination);
    let io_err = |path: &Path, e: std::io::Error| ConvertError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(&partial).map_err(|e| io_err(&partial, e))?;
    let mut writer = BufWriter::new(file);

    // ravif speeds run 1 (slowest) to 10; 0 means "slowest" here
    let encoder = AvifEncoder::new_with_speed_quality(
        &mut writer,
        speed.clamp(1, 10),
        quality.min(100),
    );

    if let Err(e) = img.write_with_encoder(encoder) {
        drop(writer);
        let _ = fs::remove_file(&partial);
        return Err(ConvertError::Encode {
            path: source.to_path_buf(),
            source: e,
        });
    }

    writer.flush().map_err(|e| io_err(&partial, e))?;
    drop(writer);

    fs::rename(&partial, destination).map_err(|e| {
        let _ = fs::remove_file(&partial);
        io_err(destination, e)
    })?;

    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        quality,
        speed,
        "[LocalConverter] Encoded AVIF"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/theme/a/logo.avif")),
            PathBuf::from("/theme/a/logo.avif.part")
        );
    }

    #[test]
    fn test_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let converter = ImageAvifConverter::new();

        let result = converter.convert(
            &dir.path().join("missing.png"),
            &dir.path().join("missing.avif"),
            80,
            6,
        );

        assert!(result.is_err());
        assert!(!dir.path().join("missing.avif").exists());
    }

    #[cfg(feature = "local-avif")]
    #[test]
    fn test_encode_small_png() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("dot.png");
        let destination = dir.path().join("dot.avif");

        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40]));
        img.save(&source).unwrap();

        let converter = ImageAvifConverter::new();
        assert!(converter.is_available());
        converter.convert(&source, &destination, 60, 10).unwrap();

        let bytes = std::fs::read(&destination).unwrap();
        assert!(!bytes.is_empty());
        // ISO-BMFF `ftyp` box with an AVIF brand
        assert_eq!(&bytes[4..8], b"ftyp");
        assert!(!partial_path(&destination).exists());
    }

    #[cfg(feature = "local-avif")]
    #[test]
    fn test_undecodable_source_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.png");
        let destination = dir.path().join("broken.avif");
        std::fs::write(&source, b"not a png").unwrap();

        let result = ImageAvifConverter::new().convert(&source, &destination, 80, 6);

        assert!(matches!(result, Err(ConvertError::Decode { .. })));
        assert!(!destination.exists());
    }
}
